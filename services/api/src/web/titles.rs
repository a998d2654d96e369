//! services/api/src/web/titles.rs
//!
//! Handlers for the title catalog. The read serialization nests the category
//! and genre objects and carries the computed rating; writes reference
//! category and genres by slug.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::categories::CategoryDto;
use crate::web::genres::GenreDto;
use crate::web::middleware::{authorize, AuthContext};
use crate::web::required;
use crate::web::state::AppState;
use critique_core::domain::{validate_name, NewTitle, TitleFilter, TitlePatch};
use critique_core::policy::{Action, Resource};
use critique_core::Title;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A title as serialized in responses, with its aggregate rating.
#[derive(Serialize, ToSchema)]
pub struct TitleDto {
    pub id: Uuid,
    pub name: String,
    pub year: Option<i32>,
    /// Mean review score; absent while the title has no reviews.
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub category: Option<CategoryDto>,
    pub genre: Vec<GenreDto>,
}

impl From<Title> for TitleDto {
    fn from(title: Title) -> Self {
        Self {
            id: title.id,
            name: title.name,
            year: title.year,
            rating: title.rating,
            description: title.description,
            category: title.category.map(CategoryDto::from),
            genre: title.genres.into_iter().map(GenreDto::from).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTitleRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    /// Slug of an existing category.
    pub category: Option<String>,
    /// Slugs of existing genres.
    pub genre: Option<Vec<String>>,
}

#[derive(Deserialize, ToSchema)]
pub struct PatchTitleRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Option<Vec<String>>,
}

#[derive(Deserialize, IntoParams)]
pub struct TitleListQuery {
    /// Substring match on the title name.
    pub name: Option<String>,
    /// Substring match on an attached genre slug.
    pub genre: Option<String>,
    /// Substring match on the category slug.
    pub category: Option<String>,
    /// Exact release year.
    pub year: Option<i32>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /v1/titles/ - List titles. All filters are optional and AND-composed.
#[utoipa::path(
    get,
    path = "/v1/titles/",
    params(TitleListQuery),
    responses(
        (status = 200, description = "All matching titles", body = [TitleDto])
    )
)]
pub async fn list_titles_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TitleListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = TitleFilter {
        name: query.name,
        genre: query.genre,
        category: query.category,
        year: query.year,
    };
    let titles = state.db.list_titles(&filter).await?;
    let payload: Vec<TitleDto> = titles.into_iter().map(TitleDto::from).collect();
    Ok(Json(payload))
}

/// POST /v1/titles/ - Create a title.
#[utoipa::path(
    post,
    path = "/v1/titles/",
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Title created", body = TitleDto),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "A referenced category or genre slug does not exist")
    )
)]
pub async fn create_title_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Catalog writes are admin-only.
    authorize(&auth, Action::Create, Resource::Catalog)?;

    // 2. Validate the payload.
    let name = required(req.name, "name")?;
    validate_name(&name)?;

    // 3. Persist. Category and genre slugs resolve against the store and
    //    404 when a referenced slug does not exist.
    let title = state
        .db
        .create_title(&NewTitle {
            name,
            year: req.year,
            description: req.description,
            category: req.category,
            genres: req.genre.unwrap_or_default(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(TitleDto::from(title))))
}

/// GET /v1/titles/{title_id}/ - Retrieve one title.
#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/",
    params(("title_id" = Uuid, Path, description = "Id of the title")),
    responses(
        (status = 200, description = "The title", body = TitleDto),
        (status = 404, description = "No title with this id")
    )
)]
pub async fn get_title_handler(
    State(state): State<Arc<AppState>>,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let title = state.db.get_title_by_id(title_id).await?;
    Ok(Json(TitleDto::from(title)))
}

/// PATCH /v1/titles/{title_id}/ - Partially update a title.
#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}/",
    params(("title_id" = Uuid, Path, description = "Id of the title")),
    request_body = PatchTitleRequest,
    responses(
        (status = 200, description = "Updated title", body = TitleDto),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No title with this id, or a referenced slug does not exist")
    )
)]
pub async fn patch_title_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(title_id): Path<Uuid>,
    Json(req): Json<PatchTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Catalog writes are admin-only.
    authorize(&auth, Action::Update, Resource::Catalog)?;

    // 2. Validate whatever fields are present.
    if let Some(name) = &req.name {
        validate_name(name)?;
    }

    // 3. Apply the patch.
    let title = state
        .db
        .update_title(
            title_id,
            &TitlePatch {
                name: req.name,
                year: req.year,
                description: req.description,
                category: req.category,
                genres: req.genre,
            },
        )
        .await?;
    Ok(Json(TitleDto::from(title)))
}

/// DELETE /v1/titles/{title_id}/ - Delete a title and its reviews.
#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}/",
    params(("title_id" = Uuid, Path, description = "Id of the title")),
    responses(
        (status = 204, description = "Title deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No title with this id")
    )
)]
pub async fn delete_title_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth, Action::Delete, Resource::Catalog)?;
    state.db.delete_title(title_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
