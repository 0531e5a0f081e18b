//! Error types for core model operations.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for payload construction and validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Payload or envelope serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Payload violates a structural invariant.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
