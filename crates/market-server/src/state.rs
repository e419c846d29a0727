//! Application State

use std::sync::Arc;

use market_core::{MemoryAccountStore, MemoryOrderStore, MemoryResourceStore};
use market_payments::GatewayClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Order store — written only through checkout and settlement
    pub orders: Arc<MemoryOrderStore>,

    /// User accounts with coin balances and purchases
    pub accounts: Arc<MemoryAccountStore>,

    /// Catalog of learning resources
    pub resources: Arc<MemoryResourceStore>,

    /// Payment gateway client (None if not configured)
    pub gateway: Option<Arc<GatewayClient>>,
}
