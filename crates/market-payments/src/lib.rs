//! # market-payments
//!
//! Payment gateway integration and order settlement for rust-market.
//!
//! ## Flow
//!
//! The gateway is a hosted checkout page that takes a signed form POST
//! and reports the result twice: once to the buyer's popup window via
//! a browser redirect, and once to the server via an out-of-band
//! notify callback. Only the callback writes order state.
//!
//! ```text
//! ┌────────────┐  descriptor  ┌─────────────┐  form POST  ┌──────────────┐
//! │   Server   │─────────────▶│    Popup    │────────────▶│   Gateway    │
//! │ (checkout) │              │  (browser)  │             │ hosted page  │
//! └────────────┘              └─────────────┘             └──────┬───────┘
//!        ▲                                                       │
//!        │        signed notify (sole writer of order status)    │
//!        └───────────────────────────────────────────────────────┘
//! ```
//!
//! The popup only ever *reads* the order afterwards; redirect query
//! parameters are client-controlled and never trusted as a success
//! signal.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use market_payments::{CheckoutRequest, GatewayClient};
//!
//! let gateway = GatewayClient::from_env()?;
//!
//! let checkout = gateway.create_checkout(CheckoutRequest {
//!     user_id: "u1".into(),
//!     resource_id: Some(7),
//!     amount: "12.00".parse()?,
//!     subject: "Course: Practical Rust".into(),
//! })?;
//!
//! // Persist checkout.order, hand checkout.descriptor to the popup launcher.
//! ```

mod callback;
mod error;
mod gateway;

pub use callback::{CallbackHandler, CallbackOutcome, GatewayNotify};
pub use error::{PaymentError, Result};
pub use gateway::{
    Checkout, CheckoutRequest, GatewayClient, GatewayConfig, PaymentDescriptor, sign_params,
    verify_signature,
};
