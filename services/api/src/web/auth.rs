//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup with a mailed confirmation code, and the
//! exchange of that code for a signed access token.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::required;
use crate::web::state::AppState;
use critique_core::domain::{validate_email, validate_username, NewUser, Role};
use critique_core::ports::PortError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /v1/auth/signup/ - Register an account and mail its confirmation code.
///
/// Repeating the request with the same (username, email) pair reuses the
/// existing account and issues a fresh code, so signup is idempotent.
#[utoipa::path(
    post,
    path = "/v1/auth/signup/",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Confirmation code issued and mailed", body = SignupResponse),
        (status = 400, description = "Validation failure or conflicting credentials")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Validate the payload. "me" is reserved and rejected here.
    let username = required(req.username, "username")?;
    let email = required(req.email, "email")?;
    validate_username(&username)?;
    validate_email(&email)?;

    // 2. Resolve the (username, email) pair. Both free: register. Both
    //    pointing at the same account: reuse it. Anything else conflicts.
    let by_username = state.db.find_user_by_username(&username).await?;
    let by_email = state.db.find_user_by_email(&email).await?;
    let user = match (by_username, by_email) {
        (Some(user), Some(same)) if user.id == same.id => user,
        (None, None) => {
            state
                .db
                .create_user(&NewUser {
                    username: username.clone(),
                    email: email.clone(),
                    first_name: String::new(),
                    last_name: String::new(),
                    bio: String::new(),
                    role: Role::User,
                })
                .await?
        }
        (Some(_), _) => return Err(PortError::DuplicateUsername(username).into()),
        (None, Some(_)) => return Err(PortError::DuplicateEmail(email).into()),
    };

    // 3. Issue a confirmation code and store it on the account.
    let code = state.tokens.issue_confirmation_code(&user).await?;
    state.db.set_confirmation_code(user.id, Some(&code)).await?;

    // 4. Mail the code. Delivery failure must not undo the registration,
    //    so it is logged and the request still succeeds.
    match timeout(
        state.config.mail_timeout,
        state.mail.send("Confirmation code", &code, &user.email),
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Confirmation mail to {} failed: {}", user.email, e),
        Err(_) => warn!("Confirmation mail to {} timed out", user.email),
    }

    // 5. Echo the registered pair back.
    Ok((
        StatusCode::OK,
        Json(SignupResponse {
            username: user.username,
            email: user.email,
        }),
    ))
}

/// POST /v1/auth/token/ - Exchange a confirmation code for an access token.
#[utoipa::path(
    post,
    path = "/v1/auth/token/",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 400, description = "Invalid confirmation code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn token_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Validate the payload.
    let username = required(req.username, "username")?;
    let code = required(req.confirmation_code, "confirmation_code")?;

    // 2. Unknown usernames are 404, per the signup contract.
    let user = state.db.get_user_by_username(&username).await?;

    // 3. The code must match the one stored at signup and still verify
    //    against the signer (untampered, unexpired).
    let stored_matches = user.confirmation_code.as_deref() == Some(code.as_str());
    let code_valid = state.tokens.check_confirmation_code(&user, &code).await?;
    if !(stored_matches && code_valid) {
        return Err(ApiError::BadRequest("Invalid confirmation code.".to_string()));
    }

    // 4. Sign the access token, bounded by the configured timeout.
    let token = timeout(
        state.config.token_timeout,
        state.tokens.issue_access_token(&user),
    )
    .await
    .map_err(|_| ApiError::Internal("Access token signing timed out".to_string()))??;

    // 5. The code is single-use: clear it so it cannot be replayed.
    state.db.set_confirmation_code(user.id, None).await?;

    Ok(Json(TokenResponse { token }))
}
