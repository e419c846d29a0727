//! # market-client
//!
//! HTTP bindings for the rust-market API: checkout initiation and
//! wallet queries for the opener page, and the order-status source
//! the popup's result poller runs against.

mod error;
mod http;

pub use error::{ApiError, Result};
pub use http::{
    ApiConfig, CheckoutReply, CheckoutRequest, MarketApi, WalletPurchase, WalletReply,
};
