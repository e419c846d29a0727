//! Payment Error Types

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Gateway interaction error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Notify signature verification failed
    #[error("Notify signature invalid: {0}")]
    SignatureInvalid(String),

    /// Notify payload parsing failed
    #[error("Notify parse error: {0}")]
    CallbackParse(String),

    /// Checkout request rejected before reaching the gateway
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Notify amount disagrees with the order
    #[error("Amount mismatch: order says {expected}, notify says {received}")]
    AmountMismatch { expected: Decimal, received: Decimal },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Gateway(_) | PaymentError::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Gateway(_) => "Payment processing failed. Please try again.",
            PaymentError::InvalidRequest(_) => "This purchase cannot be started.",
            PaymentError::OrderNotFound(_) => "Order not found.",
            PaymentError::Config(_) => "Payments are not configured.",
            _ => "An error occurred processing your payment.",
        }
    }
}

impl From<market_core::MarketError> for PaymentError {
    fn from(err: market_core::MarketError) -> Self {
        match err {
            market_core::MarketError::OrderNotFound(no) => PaymentError::OrderNotFound(no),
            other => PaymentError::Storage(other.to_string()),
        }
    }
}
