//! services/api/src/web/middleware.rs
//!
//! Authentication middleware and the policy-to-HTTP bridge.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::web::state::AppState;
use critique_core::policy::{decide, Action, Decision, Resource};
use critique_core::ports::PortError;
use critique_core::User;

/// The outcome of authentication, attached to every request. `None` means
/// the request is anonymous.
#[derive(Clone)]
pub struct AuthContext(pub Option<User>);

/// Middleware that resolves the `Authorization: Bearer <token>` header into
/// an [`AuthContext`] request extension.
///
/// Requests without bearer credentials pass through as anonymous; whether
/// that is acceptable is decided per handler. A bearer token that is present
/// but invalid fails the request with 401 immediately.
pub async fn auth_context(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the Authorization header. Absent or non-bearer credentials
    //    leave the request anonymous.
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());

    let token = match bearer {
        Some(token) => token,
        None => {
            req.extensions_mut().insert(AuthContext(None));
            return Ok(next.run(req).await);
        }
    };

    // 2. Verify the token signature and expiry.
    let claims = state
        .tokens
        .verify_access_token(&token)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token.".to_string()))?;

    // 3. Load the user the token was issued for. A token for a deleted
    //    account no longer authenticates.
    let user = match state.db.get_user_by_id(claims.user_id).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => {
            return Err(ApiError::Unauthorized(
                "User no longer exists.".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    // 4. Attach the authenticated user and continue to the handler.
    req.extensions_mut().insert(AuthContext(Some(user)));
    Ok(next.run(req).await)
}

/// Returns the authenticated user, or 401 for anonymous requests.
pub fn require_user(auth: &AuthContext) -> Result<&User, ApiError> {
    auth.0.as_ref().ok_or_else(|| {
        ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
    })
}

/// Runs the authorization policy and maps a denial onto the right status:
/// 401 when the actor is anonymous, 403 when authenticated but not allowed.
pub fn authorize(auth: &AuthContext, action: Action, resource: Resource) -> Result<(), ApiError> {
    match decide(auth.0.as_ref(), action, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny => match &auth.0 {
            Some(_) => Err(ApiError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            )),
            None => Err(ApiError::Unauthorized(
                "Authentication credentials were not provided.".to_string(),
            )),
        },
    }
}
