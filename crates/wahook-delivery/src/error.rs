//! Error types for webhook delivery operations.
//!
//! Every delivery failure (non-2xx status, transport error, timeout) is
//! transient from the worker's point of view: it is retried up to the
//! configured ceiling and then dead-lettered. Store and serialization
//! errors are surfaced separately so the worker can skip a tick or route a
//! malformed entry without losing it.

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Error taxonomy for the delivery pipeline.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// HTTP request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Seconds before the request timed out.
        timeout_seconds: u64,
    },

    /// Sink responded with a non-2xx status.
    #[error("sink returned status {status_code}")]
    Status {
        /// HTTP status code returned by the sink.
        status_code: u16,
    },

    /// Queue store operation failed.
    #[error("queue store error: {message}")]
    Store {
        /// Store error description.
        message: String,
    },

    /// Envelope could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Serialization error description.
        message: String,
    },

    /// Invalid client or worker configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Configuration error description.
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a non-2xx status error.
    pub fn status(status_code: u16) -> Self {
        Self::Status { status_code }
    }

    /// Creates a queue store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store { message: message.into() }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether this error came from a delivery attempt (as opposed to the
    /// store or local configuration) and should count against the retry
    /// ceiling.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. } | Self::Status { .. })
    }
}

impl From<redis::RedisError> for DeliveryError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store { message: err.to_string() }
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { message: err.to_string() }
    }
}
