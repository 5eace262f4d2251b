//! Store error types

use thiserror::Error;

/// Store-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Credential acquisition failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// API error from store
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Response had the right status but the wrong shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid artifact
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Store rejected the submitted content
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Version, item or file missing on the store side
    #[error("Not found: {0}")]
    NotFound(String),

    /// Verb is not offered by the store
    #[error("{store} does not support {verb}")]
    Unsupported { store: String, verb: String },

    /// Request is missing something the verb needs
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Transport failure not raised by reqwest itself
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Archive error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

/// Coarse classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential acquisition failed
    Auth,
    /// Network or IO failure
    Transport,
    /// Unexpected status or unparsable body
    Protocol,
    /// Store rejected content
    ValidationFailed,
    /// Poll budget exhausted
    Timeout,
    /// Lookup came back empty
    NotFound,
    /// Caller cancelled
    Cancelled,
    /// Bad request, config or unsupported verb
    Usage,
}

impl StoreError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::AuthenticationFailed(_)
            | StoreError::InvalidCredentials(_)
            | StoreError::Jwt(_) => ErrorKind::Auth,
            StoreError::Transport(_) | StoreError::Io(_) | StoreError::Http(_) => {
                ErrorKind::Transport
            }
            StoreError::ApiError { .. }
            | StoreError::UnexpectedResponse(_)
            | StoreError::Json(_) => ErrorKind::Protocol,
            StoreError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            StoreError::Timeout(_) => ErrorKind::Timeout,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Cancelled => ErrorKind::Cancelled,
            StoreError::InvalidArtifact(_)
            | StoreError::Archive(_)
            | StoreError::Unsupported { .. }
            | StoreError::InvalidRequest(_)
            | StoreError::ConfigurationError(_) => ErrorKind::Usage,
        }
    }

    /// Build an [`StoreError::ApiError`] from a status and raw body
    pub(crate) fn api(status: u16, body: &[u8]) -> Self {
        StoreError::ApiError {
            status,
            message: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            StoreError::AuthenticationFailed("x".into()).kind(),
            ErrorKind::Auth
        );
        assert_eq!(StoreError::api(500, b"boom").kind(), ErrorKind::Protocol);
        assert_eq!(StoreError::Timeout("t".into()).kind(), ErrorKind::Timeout);
        assert_eq!(StoreError::NotFound("v".into()).kind(), ErrorKind::NotFound);
        assert_eq!(StoreError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            StoreError::Unsupported {
                store: "Edge".into(),
                verb: "sign".into()
            }
            .kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn test_api_error_keeps_body() {
        let err = StoreError::api(403, b"{\"error\":\"denied\"}");
        assert_eq!(
            err.to_string(),
            "API error: 403 - {\"error\":\"denied\"}"
        );
    }
}
