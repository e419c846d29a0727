//! # market-core
//!
//! Domain vocabulary for the learning-resource marketplace: orders,
//! resources, and user accounts with a coin balance.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      market-core                             │
//! │  ┌───────────┐   ┌────────────┐   ┌───────────────────────┐  │
//! │  │   Order   │   │  Resource  │   │  UserAccount / coins  │  │
//! │  │  (status  │   │  (catalog  │   │  (wallet + purchase   │  │
//! │  │  machine) │   │   entry)   │   │      records)         │  │
//! │  └───────────┘   └────────────┘   └───────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Order status is the single source of truth for a payment: it is
//! written only by the server-side settlement path and read by
//! everything else. The store traits keep persistence swappable; the
//! in-memory implementations back development and tests.

pub mod account;
pub mod error;
pub mod order;
pub mod resource;

pub use account::{AccountStore, MemoryAccountStore, Purchase, PurchaseOutcome, UserAccount};
pub use error::{MarketError, Result};
pub use order::{MemoryOrderStore, Order, OrderNo, OrderStatus, OrderStore, Settlement};
pub use resource::{MemoryResourceStore, Resource, ResourceStore};
