//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use critique_core::domain::ValidationError;
use critique_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A request field rejected by domain validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A request the handlers reject outright, e.g. a failed code exchange.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials on a route that requires them.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the policy denied the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    /// Renders the error as `{"detail": ...}` with the status the taxonomy
    /// assigns: 400 validation, 401 unauthorized, 403 forbidden, 404 missing,
    /// 500 for everything infrastructural.
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Port(port_error) => match port_error {
                PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                PortError::DuplicateSlug(_)
                | PortError::DuplicateUsername(_)
                | PortError::DuplicateEmail(_)
                | PortError::DuplicateReview => {
                    (StatusCode::BAD_REQUEST, port_error.to_string())
                }
                PortError::Unauthorized => {
                    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
                }
                PortError::Unexpected(msg) => {
                    error!("Port failure: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            ApiError::Config(e) => {
                error!("Configuration failure during request: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Database(e) => {
                error!("Database failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Io(e) => {
                error!("IO failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                error!("Internal failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
