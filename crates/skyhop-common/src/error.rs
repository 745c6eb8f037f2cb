//! Error types shared across the client core

use thiserror::Error;

/// Error returned by the remote API client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Server answered with a non-success HTTP status
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection-level failure (DNS, TLS, socket)
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// Request did not complete in time
    #[error("request timed out")]
    Timeout,
}

/// Result type for API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned by the key-value persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to serialize value for key {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to write store: {0}")]
    Write(#[from] std::io::Error),
}
