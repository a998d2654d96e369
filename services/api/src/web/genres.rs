//! services/api/src/web/genres.rs
//!
//! Handlers for the genre side of the catalog. Same access rules as
//! categories: public reads, admin writes.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::web::middleware::{authorize, AuthContext};
use crate::web::required;
use crate::web::state::AppState;
use critique_core::domain::{validate_name, validate_slug};
use critique_core::policy::{Action, Resource};
use critique_core::Genre;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A genre as serialized in responses.
#[derive(Serialize, ToSchema)]
pub struct GenreDto {
    pub name: String,
    pub slug: String,
}

impl From<Genre> for GenreDto {
    fn from(genre: Genre) -> Self {
        Self {
            name: genre.name,
            slug: genre.slug,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateGenreRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct GenreSearchQuery {
    /// Case-insensitive substring match on the genre name.
    pub search: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /v1/genres/ - List genres.
#[utoipa::path(
    get,
    path = "/v1/genres/",
    params(GenreSearchQuery),
    responses(
        (status = 200, description = "All matching genres", body = [GenreDto])
    )
)]
pub async fn list_genres_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GenreSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let genres = state.db.list_genres(query.search.as_deref()).await?;
    let payload: Vec<GenreDto> = genres.into_iter().map(GenreDto::from).collect();
    Ok(Json(payload))
}

/// POST /v1/genres/ - Create a genre.
#[utoipa::path(
    post,
    path = "/v1/genres/",
    request_body = CreateGenreRequest,
    responses(
        (status = 201, description = "Genre created", body = GenreDto),
        (status = 400, description = "Validation failure or duplicate slug"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_genre_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateGenreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Catalog writes are admin-only.
    authorize(&auth, Action::Create, Resource::Catalog)?;

    // 2. Validate the payload.
    let name = required(req.name, "name")?;
    let slug = required(req.slug, "slug")?;
    validate_name(&name)?;
    validate_slug(&slug)?;

    // 3. Persist. A taken slug surfaces as 400.
    let genre = state.db.create_genre(&name, &slug).await?;
    Ok((StatusCode::CREATED, Json(GenreDto::from(genre))))
}

/// GET /v1/genres/{slug}/ - Retrieve one genre.
#[utoipa::path(
    get,
    path = "/v1/genres/{slug}/",
    params(("slug" = String, Path, description = "Slug of the genre")),
    responses(
        (status = 200, description = "The genre", body = GenreDto),
        (status = 404, description = "No genre with this slug")
    )
)]
pub async fn get_genre_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let genre = state.db.get_genre_by_slug(&slug).await?;
    Ok(Json(GenreDto::from(genre)))
}

/// DELETE /v1/genres/{slug}/ - Delete a genre.
///
/// Titles keep existing; the genre is only detached from them.
#[utoipa::path(
    delete,
    path = "/v1/genres/{slug}/",
    params(("slug" = String, Path, description = "Slug of the genre")),
    responses(
        (status = 204, description = "Genre deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No genre with this slug")
    )
)]
pub async fn delete_genre_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth, Action::Delete, Resource::Catalog)?;
    state.db.delete_genre(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}
