//! Popup Flow Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PopupError>;

/// Errors within the popup payment flow
#[derive(Error, Debug)]
pub enum PopupError {
    /// The gateway redirect carried no order number. Fatal for this
    /// popup instance; there is nothing to poll.
    #[error("Missing order number in redirect URL")]
    MissingOrderNumber,

    /// The browser refused to open the popup window
    #[error("Popup window was blocked by the browser")]
    PopupBlocked,

    /// Status query failed (network error or non-2xx response)
    #[error("Status request failed: {0}")]
    StatusRequest(String),

    /// Posting to the opener window failed
    #[error("Opener message failed: {0}")]
    Opener(String),

    /// Popup window operation failed
    #[error("Popup window error: {0}")]
    Window(String),
}

impl PopupError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PopupError::StatusRequest(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PopupError::MissingOrderNumber => {
                "We could not identify your order. Please start the payment again."
            }
            PopupError::PopupBlocked => {
                "Your browser blocked the payment window. Please allow popups for this site and try again."
            }
            PopupError::StatusRequest(_) => {
                "We could not reach the server to confirm your payment. Please retry."
            }
            _ => "Something went wrong with the payment window.",
        }
    }
}
