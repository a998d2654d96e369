//! services/api/src/web/categories.rs
//!
//! Handlers for the category side of the catalog. Reads are public, writes
//! are admin-only.

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
use critique_core::Category;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A category as serialized in responses.
#[derive(Serialize, ToSchema)]
pub struct CategoryDto {
    pub name: String,
    pub slug: String,
}

impl From<Category> for CategoryDto {
    fn from(category: Category) -> Self {
        Self {
            name: category.name,
            slug: category.slug,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct CategorySearchQuery {
    /// Case-insensitive substring match on the category name.
    pub search: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /v1/categories/ - List categories.
#[utoipa::path(
    get,
    path = "/v1/categories/",
    params(CategorySearchQuery),
    responses(
        (status = 200, description = "All matching categories", body = [CategoryDto])
    )
)]
pub async fn list_categories_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategorySearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.db.list_categories(query.search.as_deref()).await?;
    let payload: Vec<CategoryDto> = categories.into_iter().map(CategoryDto::from).collect();
    Ok(Json(payload))
}

/// POST /v1/categories/ - Create a category.
#[utoipa::path(
    post,
    path = "/v1/categories/",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryDto),
        (status = 400, description = "Validation failure or duplicate slug"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Catalog writes are admin-only.
    authorize(&auth, Action::Create, Resource::Catalog)?;

    // 2. Validate the payload.
    let name = required(req.name, "name")?;
    let slug = required(req.slug, "slug")?;
    validate_name(&name)?;
    validate_slug(&slug)?;

    // 3. Persist. A taken slug surfaces as 400.
    let category = state.db.create_category(&name, &slug).await?;
    Ok((StatusCode::CREATED, Json(CategoryDto::from(category))))
}

/// GET /v1/categories/{slug}/ - Retrieve one category.
#[utoipa::path(
    get,
    path = "/v1/categories/{slug}/",
    params(("slug" = String, Path, description = "Slug of the category")),
    responses(
        (status = 200, description = "The category", body = CategoryDto),
        (status = 404, description = "No category with this slug")
    )
)]
pub async fn get_category_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.db.get_category_by_slug(&slug).await?;
    Ok(Json(CategoryDto::from(category)))
}

/// DELETE /v1/categories/{slug}/ - Delete a category.
///
/// Titles filed under the category survive with their category cleared.
#[utoipa::path(
    delete,
    path = "/v1/categories/{slug}/",
    params(("slug" = String, Path, description = "Slug of the category")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No category with this slug")
    )
)]
pub async fn delete_category_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth, Action::Delete, Resource::Catalog)?;
    state.db.delete_category(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}
