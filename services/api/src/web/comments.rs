//! services/api/src/web/comments.rs
//!
//! Handlers for comments, nested under a review. Access rules mirror
//! reviews: public reads, authenticated creation, author/moderator/admin
//! edits. The review is resolved by its id alone; the title segment of the
//! path is not cross-checked.

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
use critique_core::domain::validate_text;
use critique_core::policy::{Action, Resource};
use critique_core::Comment;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A comment as serialized in responses. The parent review appears by its
/// text and the author by username.
#[derive(Serialize, ToSchema)]
pub struct CommentDto {
    pub id: Uuid,
    pub review: String,
    pub author: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            review: comment.review_text,
            author: comment.author_username,
            text: comment.text,
            pub_date: comment.pub_date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub text: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PatchCommentRequest {
    pub text: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /v1/titles/{title_id}/reviews/{review_id}/comments/ - List the
/// comments on a review.
#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review")
    ),
    responses(
        (status = 200, description = "Comments on the review", body = [CommentDto]),
        (status = 404, description = "No review with this id")
    )
)]
pub async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Path((_title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    // The review must exist even when nobody commented yet.
    state.db.get_review_by_id(review_id).await?;
    let comments = state.db.list_comments_for_review(review_id).await?;
    let payload: Vec<CommentDto> = comments.into_iter().map(CommentDto::from).collect();
    Ok(Json(payload))
}

/// POST /v1/titles/{title_id}/reviews/{review_id}/comments/ - Comment on a
/// review. The author is taken from the access token.
#[utoipa::path(
    post,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentDto),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No review with this id")
    )
)]
pub async fn create_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((_title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Creation requires authentication.
    let user = require_user(&auth)?;
    authorize(&auth, Action::Create, Resource::Authored { author_id: user.id })?;

    // 2. The commented review must exist.
    state.db.get_review_by_id(review_id).await?;

    // 3. Validate the payload.
    let text = required(req.text, "text")?;
    validate_text(&text)?;

    // 4. Persist.
    let comment = state.db.create_comment(review_id, user.id, &text).await?;
    Ok((StatusCode::CREATED, Json(CommentDto::from(comment))))
}

/// GET .../comments/{comment_id}/ - Retrieve one comment.
#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review"),
        ("comment_id" = Uuid, Path, description = "Id of the comment")
    ),
    responses(
        (status = 200, description = "The comment", body = CommentDto),
        (status = 404, description = "No such comment under this review")
    )
)]
pub async fn get_comment_handler(
    State(state): State<Arc<AppState>>,
    Path((_title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state.db.get_comment(review_id, comment_id).await?;
    Ok(Json(CommentDto::from(comment)))
}

/// PATCH .../comments/{comment_id}/ - Edit a comment.
#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review"),
        ("comment_id" = Uuid, Path, description = "Id of the comment")
    ),
    request_body = PatchCommentRequest,
    responses(
        (status = 200, description = "Updated comment", body = CommentDto),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Neither author, moderator nor admin"),
        (status = 404, description = "No such comment under this review")
    )
)]
pub async fn patch_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((_title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<PatchCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Writes require authentication before anything else.
    require_user(&auth)?;

    // 2. Resolve the comment under its review.
    let comment = state.db.get_comment(review_id, comment_id).await?;

    // 3. Only the author, a moderator or an admin may edit it.
    authorize(
        &auth,
        Action::Update,
        Resource::Authored {
            author_id: comment.author_id,
        },
    )?;

    // 4. Validate and apply.
    if let Some(text) = &req.text {
        validate_text(text)?;
    }
    let updated = state
        .db
        .update_comment(comment.id, req.text.as_deref())
        .await?;
    Ok(Json(CommentDto::from(updated)))
}

/// DELETE .../comments/{comment_id}/ - Delete a comment.
#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/",
    params(
        ("title_id" = Uuid, Path, description = "Id of the title"),
        ("review_id" = Uuid, Path, description = "Id of the review"),
        ("comment_id" = Uuid, Path, description = "Id of the comment")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Neither author, moderator nor admin"),
        (status = 404, description = "No such comment under this review")
    )
)]
pub async fn delete_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path((_title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(&auth)?;
    let comment = state.db.get_comment(review_id, comment_id).await?;
    authorize(
        &auth,
        Action::Delete,
        Resource::Authored {
            author_id: comment.author_id,
        },
    )?;
    state.db.delete_comment(comment.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
