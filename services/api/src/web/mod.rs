//! services/api/src/web/mod.rs
//!
//! Web layer wiring. Each resource gets its own handler module; this module
//! assembles them into the versioned router and the OpenAPI document.
//!
//! Every collection and detail path carries a trailing slash, and only that
//! form is registered. Requests without the slash fall through to 404.

pub mod auth;
pub mod categories;
pub mod comments;
pub mod genres;
pub mod middleware;
pub mod reviews;
pub mod state;
pub mod titles;
pub mod users;

pub use middleware::{authorize, require_user, AuthContext};
pub use state::AppState;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

use critique_core::domain::ValidationError;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::token_handler,
        categories::list_categories_handler,
        categories::create_category_handler,
        categories::get_category_handler,
        categories::delete_category_handler,
        genres::list_genres_handler,
        genres::create_genre_handler,
        genres::get_genre_handler,
        genres::delete_genre_handler,
        titles::list_titles_handler,
        titles::create_title_handler,
        titles::get_title_handler,
        titles::patch_title_handler,
        titles::delete_title_handler,
        reviews::list_reviews_handler,
        reviews::create_review_handler,
        reviews::get_review_handler,
        reviews::patch_review_handler,
        reviews::delete_review_handler,
        comments::list_comments_handler,
        comments::create_comment_handler,
        comments::get_comment_handler,
        comments::patch_comment_handler,
        comments::delete_comment_handler,
        users::list_users_handler,
        users::create_user_handler,
        users::me_handler,
        users::patch_me_handler,
        users::get_user_handler,
        users::patch_user_handler,
        users::delete_user_handler,
    ),
    components(schemas(
        auth::SignupRequest,
        auth::SignupResponse,
        auth::TokenRequest,
        auth::TokenResponse,
        categories::CategoryDto,
        categories::CreateCategoryRequest,
        genres::GenreDto,
        genres::CreateGenreRequest,
        titles::TitleDto,
        titles::CreateTitleRequest,
        titles::PatchTitleRequest,
        reviews::ReviewDto,
        reviews::CreateReviewRequest,
        reviews::PatchReviewRequest,
        comments::CommentDto,
        comments::CreateCommentRequest,
        comments::PatchCommentRequest,
        users::UserDto,
        users::CreateUserRequest,
        users::PatchUserRequest,
    )),
    tags(
        (name = "Critique API", description = "Reviews and ratings for a catalog of books, films and music.")
    )
)]
pub struct ApiDoc;

/// Unwraps a request field the endpoint cannot do without.
pub(crate) fn required<T>(field: Option<T>, name: &'static str) -> Result<T, ValidationError> {
    field.ok_or(ValidationError::Required(name))
}

/// Builds the full /v1 router with the auth context middleware applied.
///
/// The two /users/me/ routes are static and therefore win over the
/// /users/{username}/ capture, so "me" never reaches the admin handlers.
pub fn api_router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        // Signup and token exchange.
        .route("/auth/signup/", post(auth::signup_handler))
        .route("/auth/token/", post(auth::token_handler))
        // Catalog taxonomy.
        .route(
            "/categories/",
            get(categories::list_categories_handler).post(categories::create_category_handler),
        )
        .route(
            "/categories/{slug}/",
            get(categories::get_category_handler).delete(categories::delete_category_handler),
        )
        .route(
            "/genres/",
            get(genres::list_genres_handler).post(genres::create_genre_handler),
        )
        .route(
            "/genres/{slug}/",
            get(genres::get_genre_handler).delete(genres::delete_genre_handler),
        )
        // Titles.
        .route(
            "/titles/",
            get(titles::list_titles_handler).post(titles::create_title_handler),
        )
        .route(
            "/titles/{title_id}/",
            get(titles::get_title_handler)
                .patch(titles::patch_title_handler)
                .delete(titles::delete_title_handler),
        )
        // Reviews, nested under their title.
        .route(
            "/titles/{title_id}/reviews/",
            get(reviews::list_reviews_handler).post(reviews::create_review_handler),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/",
            get(reviews::get_review_handler)
                .patch(reviews::patch_review_handler)
                .delete(reviews::delete_review_handler),
        )
        // Comments, nested under their review.
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/",
            get(comments::list_comments_handler).post(comments::create_comment_handler),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
            get(comments::get_comment_handler)
                .patch(comments::patch_comment_handler)
                .delete(comments::delete_comment_handler),
        )
        // Accounts.
        .route(
            "/users/",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            "/users/me/",
            get(users::me_handler).patch(users::patch_me_handler),
        )
        .route(
            "/users/{username}/",
            get(users::get_user_handler)
                .patch(users::patch_user_handler)
                .delete(users::delete_user_handler),
        );

    Router::new()
        .nest("/v1", v1)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_context,
        ))
        .with_state(state)
}
