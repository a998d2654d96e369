//! services/api/src/web/users.rs
//!
//! Account management handlers. The /users/ collection is admin-only; the
//! /users/me/ endpoints let any authenticated user read and edit their own
//! profile, with the role field ignored on self-edits.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::web::middleware::{authorize, require_user, AuthContext};
use crate::web::required;
use crate::web::state::AppState;
use critique_core::domain::{validate_email, validate_username, NewUser, UserPatch};
use critique_core::policy::{Action, Resource};
use critique_core::{Role, User};

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// An account as serialized in responses.
#[derive(Serialize, ToSchema)]
pub struct UserDto {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role.as_str().to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PatchUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct UserSearchQuery {
    /// Exact username match, ignoring case.
    pub search: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /v1/users/ - List accounts.
#[utoipa::path(
    get,
    path = "/v1/users/",
    params(UserSearchQuery),
    responses(
        (status = 200, description = "All matching accounts", body = [UserDto]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth, Action::List, Resource::Accounts)?;
    let users = state.db.list_users(query.search.as_deref()).await?;
    let payload: Vec<UserDto> = users.into_iter().map(UserDto::from).collect();
    Ok(Json(payload))
}

/// POST /v1/users/ - Create an account directly, without the signup flow.
#[utoipa::path(
    post,
    path = "/v1/users/",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserDto),
        (status = 400, description = "Validation failure or duplicate username/email"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Account administration is admin-only.
    authorize(&auth, Action::Create, Resource::Accounts)?;

    // 2. Validate the payload. "me" stays reserved on this path too.
    let username = required(req.username, "username")?;
    let email = required(req.email, "email")?;
    validate_username(&username)?;
    validate_email(&email)?;
    let role = match req.role.as_deref() {
        Some(role) => Role::from_str(role)?,
        None => Role::User,
    };

    // 3. Persist. Taken usernames and emails surface as 400.
    let user = state
        .db
        .create_user(&NewUser {
            username,
            email,
            first_name: req.first_name.unwrap_or_default(),
            last_name: req.last_name.unwrap_or_default(),
            bio: req.bio.unwrap_or_default(),
            role,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

/// GET /v1/users/me/ - The caller's own profile.
#[utoipa::path(
    get,
    path = "/v1/users/me/",
    responses(
        (status = 200, description = "The caller's profile", body = UserDto),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me_handler(
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&auth)?;
    authorize(&auth, Action::Retrieve, Resource::OwnProfile)?;
    Ok(Json(UserDto::from(user.clone())))
}

/// PATCH /v1/users/me/ - Edit the caller's own profile.
///
/// A role field in the body is validated but never applied; users cannot
/// promote themselves.
#[utoipa::path(
    patch,
    path = "/v1/users/me/",
    request_body = PatchUserRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserDto),
        (status = 400, description = "Validation failure or duplicate username/email"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn patch_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PatchUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Self-edits require authentication, nothing more.
    let user = require_user(&auth)?.clone();
    authorize(&auth, Action::Update, Resource::OwnProfile)?;

    // 2. Validate whatever fields are present. A role field is not an
    //    error here, it just has no effect.
    if let Some(username) = &req.username {
        validate_username(username)?;
    }
    if let Some(email) = &req.email {
        validate_email(email)?;
    }

    // 3. Apply the patch with the stored role preserved.
    let updated = state
        .db
        .update_user(
            &user.username,
            &UserPatch {
                username: req.username,
                email: req.email,
                first_name: req.first_name,
                last_name: req.last_name,
                bio: req.bio,
                role: None,
            },
        )
        .await?;
    Ok(Json(UserDto::from(updated)))
}

/// GET /v1/users/{username}/ - Retrieve one account.
#[utoipa::path(
    get,
    path = "/v1/users/{username}/",
    params(("username" = String, Path, description = "Username of the account")),
    responses(
        (status = 200, description = "The account", body = UserDto),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No account with this username")
    )
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth, Action::Retrieve, Resource::Accounts)?;
    let user = state.db.get_user_by_username(&username).await?;
    Ok(Json(UserDto::from(user)))
}

/// PATCH /v1/users/{username}/ - Edit an account, including its role.
#[utoipa::path(
    patch,
    path = "/v1/users/{username}/",
    params(("username" = String, Path, description = "Username of the account")),
    request_body = PatchUserRequest,
    responses(
        (status = 200, description = "Updated account", body = UserDto),
        (status = 400, description = "Validation failure or duplicate username/email"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No account with this username")
    )
)]
pub async fn patch_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(username): Path<String>,
    Json(req): Json<PatchUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Account administration is admin-only.
    authorize(&auth, Action::Update, Resource::Accounts)?;

    // 2. Validate whatever fields are present.
    if let Some(new_username) = &req.username {
        validate_username(new_username)?;
    }
    if let Some(email) = &req.email {
        validate_email(email)?;
    }
    let role = match req.role.as_deref() {
        Some(role) => Some(Role::from_str(role)?),
        None => None,
    };

    // 3. Apply the patch.
    let updated = state
        .db
        .update_user(
            &username,
            &UserPatch {
                username: req.username,
                email: req.email,
                first_name: req.first_name,
                last_name: req.last_name,
                bio: req.bio,
                role,
            },
        )
        .await?;
    Ok(Json(UserDto::from(updated)))
}

/// DELETE /v1/users/{username}/ - Delete an account and everything it wrote.
#[utoipa::path(
    delete,
    path = "/v1/users/{username}/",
    params(("username" = String, Path, description = "Username of the account")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "No account with this username")
    )
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth, Action::Delete, Resource::Accounts)?;
    state.db.delete_user(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}
