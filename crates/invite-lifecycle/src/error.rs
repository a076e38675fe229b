//! Error types for the lifecycle engine

use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Store-level errors raised by document, blob and history backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Caller-facing error taxonomy for transitions and batch jobs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// No caller identity was supplied.
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    /// A required input was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The artifact does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller does not own the artifact.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The transition is not legal from the artifact's current state.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Unexpected storage failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LifecycleError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Unauthenticated(_) => "unauthenticated",
            LifecycleError::InvalidArgument(_) => "invalid-argument",
            LifecycleError::NotFound(_) => "not-found",
            LifecycleError::PermissionDenied(_) => "permission-denied",
            LifecycleError::FailedPrecondition(_) => "failed-precondition",
            LifecycleError::Internal(_) => "internal",
        }
    }

    /// Whether the error was caused by the client rather than the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, LifecycleError::Internal(_))
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => LifecycleError::NotFound(msg),
            other => LifecycleError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            LifecycleError::PermissionDenied("x".into()).code(),
            "permission-denied"
        );
        assert_eq!(LifecycleError::Internal("x".into()).code(), "internal");
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: LifecycleError = StorageError::Backend("timeout".into()).into();
        assert!(matches!(err, LifecycleError::Internal(_)));
        assert!(!err.is_client_error());

        let err: LifecycleError = StorageError::NotFound("drafts/a1".into()).into();
        assert!(matches!(err, LifecycleError::NotFound(_)));
        assert!(err.is_client_error());
    }
}
