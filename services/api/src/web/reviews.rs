//! services/api/src/web/reviews.rs
//!
//! Handlers for reviews, nested under their title. Anyone can read; any
//! authenticated user can write one review per title; editing is restricted
//! to the author, moderators and admins.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::{authorize, require_user, AuthContext};
use crate::web::required;
use crate::web::state::AppState;
use critique_core::domain::{validate_score, validate_text};
use critique_core::policy::{Action, Resource};
use critique_core::Review;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A review as serialized in responses. The title appears by name and the
/// author by username.
#[derive(Serialize, ToSchema)]
pub struct ReviewDto {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub text: String,
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

impl From<Review> for ReviewDto {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            title: review.title_name,
            author: review.author_username,
            text: review.text,
            score: review.score,
            pub_date: review.pub_date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub text: Option<String>,
    pub score: Option<i16>,
}

#[derive(Deserialize, ToSchema)]
pub struct PatchReviewRequest {
    pub text: Option<String>,
    pub score: Option<i16>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /v1/titles/{title_id}/reviews/ - List the reviews of a title.
#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/",
    params(("title_id" = Uuid, Path, description = "Id of the title")),
    responses(
        (status = 200, description = "Reviews of the title", body = [ReviewDto]),
        (status = 404, description = "No title with this id")
    )
)]
pub async fn list_reviews_handler(
    State(state): State<Arc<AppState>>,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // The title must exist even when it has no reviews yet.
    state.db.get_title_by_id(title_id).await?;
    let reviews = state.db.list_reviews_for_title(title_id).await?;
    let payload: Vec<ReviewDto> = reviews.into_iter().map(ReviewDto::from).collect();
    Ok(Json(payload))
}

/// POST /v1/titles/{title_id}/reviews/ - Review a title.
///
/// The author is taken from the access token, never from the body, and each
/// author gets at most one review per title.
#[utoipa::path(
    post,
    path = "/v1/titles/{title_id}/reviews/",
    params(("title_id" = Uuid, Path, description = "Id of the title")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewDto),
        (status = 400, description = "Validation failure or second review for this title"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No title with this id")
    )
)]
pub async fn create_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(title_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Creation requires authentication; the policy admits any signed-in
    //    user as the author of their own review.
    let user = require_user(&auth)?;
    authorize(&auth, Action::Create, Resource::Authored { author_id: user.id })?;

    // 2. The reviewed title must exist.
    state.db.get_title_by_id(title_id).await?;

    // 3. Validate the payload.
    let text = required(req.text, "text")?;
    let score = required(req.score, "score")?;
    validate_text(&text)?;
    validate_score(score)?;

    // 4. Persist. A second review by the same author races safely into 400.
    let review = state
        .db
        .create_review(title_id, user.id, &text, score)
        .await?;
    Ok((StatusCode::CREATED, Json(ReviewDto::from(review))))
}

/// GET /v1/titles/{title_id}/reviews/{review_id}/ - Retrieve one review.
#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review")
    ),
    responses(
        (status = 200, description = "The review", body = ReviewDto),
        (status = 404, description = "No such review under this title")
    )
)]
pub async fn get_review_handler(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state.db.get_review(title_id, review_id).await?;
    Ok(Json(ReviewDto::from(review)))
}

/// PATCH /v1/titles/{title_id}/reviews/{review_id}/ - Edit a review.
#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review")
    ),
    request_body = PatchReviewRequest,
    responses(
        (status = 200, description = "Updated review", body = ReviewDto),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Neither author, moderator nor admin"),
        (status = 404, description = "No such review under this title")
    )
)]
pub async fn patch_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<PatchReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Writes require authentication before anything else.
    require_user(&auth)?;

    // 2. Resolve the review under its title.
    let review = state.db.get_review(title_id, review_id).await?;

    // 3. Only the author, a moderator or an admin may edit it.
    authorize(
        &auth,
        Action::Update,
        Resource::Authored {
            author_id: review.author_id,
        },
    )?;

    // 4. Validate whatever fields are present.
    if let Some(text) = &req.text {
        validate_text(text)?;
    }
    if let Some(score) = req.score {
        validate_score(score)?;
    }

    // 5. Apply the patch.
    let updated = state
        .db
        .update_review(review.id, req.text.as_deref(), req.score)
        .await?;
    Ok(Json(ReviewDto::from(updated)))
}

/// DELETE /v1/titles/{title_id}/reviews/{review_id}/ - Delete a review and
/// its comments.
#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}/reviews/{review_id}/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review")
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Neither author, moderator nor admin"),
        (status = 404, description = "No such review under this title")
    )
)]
pub async fn delete_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(&auth)?;
    let review = state.db.get_review(title_id, review_id).await?;
    authorize(
        &auth,
        Action::Delete,
        Resource::Authored {
            author_id: review.author_id,
        },
    )?;
    state.db.delete_review(review.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
