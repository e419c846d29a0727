//! API Client Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors talking to the marketplace API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Client configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(_) => true,
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
