//! Error types for invite-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use invite_lifecycle::LifecycleError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// No caller identity on the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller may not act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Transition not legal from the current state
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid-argument"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not-found"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "permission-denied"),
            ApiError::PreconditionFailed(_) => {
                (StatusCode::PRECONDITION_FAILED, "failed-precondition")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Unauthenticated(msg) => ApiError::Unauthenticated(msg),
            LifecycleError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            LifecycleError::NotFound(msg) => ApiError::NotFound(msg),
            LifecycleError::PermissionDenied(msg) => ApiError::Forbidden(msg),
            LifecycleError::FailedPrecondition(msg) => ApiError::PreconditionFailed(msg),
            LifecycleError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
