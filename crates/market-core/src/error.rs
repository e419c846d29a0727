//! Error Types

use thiserror::Error;

use crate::order::OrderStatus;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Domain error types
#[derive(Error, Debug)]
pub enum MarketError {
    /// Order lookup failed
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Resource lookup failed
    #[error("Resource not found: {0}")]
    ResourceNotFound(u64),

    /// Account lookup failed
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Illegal order status transition
    #[error("Invalid order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Coin balance too low for a purchase
    #[error("Insufficient coins: need {needed}, have {available}")]
    InsufficientCoins { needed: u64, available: u64 },

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl MarketError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::Storage(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            MarketError::OrderNotFound(_) => "We could not find that order.".into(),
            MarketError::ResourceNotFound(_) => "That resource is no longer available.".into(),
            MarketError::InsufficientCoins { .. } => {
                "Your coin balance is too low for this purchase.".into()
            }
            MarketError::InvalidTransition { .. } => {
                "This order has already been processed.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for MarketError {
    fn from(err: anyhow::Error) -> Self {
        MarketError::Other(err.to_string())
    }
}
