//! Orders
//!
//! A merchant order correlates the checkout popup, the payment
//! gateway, and the server's settlement record. The order number is
//! generated here and travels through the gateway redirect unchanged.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Merchant-generated order number (formatted: ORD + 16 hex chars)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNo(String);

impl OrderNo {
    /// Generate a new order number
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("ORD{}", &hex[0..16]))
    }

    /// Parse from string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the order number as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle status
///
/// `paid` is the sole success signal. Anything short of it is treated
/// as still pending by readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "paid" => OrderStatus::Paid,
            "failed" => OrderStatus::Failed,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Pending,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A checkout order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    /// Merchant order number
    pub order_no: OrderNo,

    /// Buyer
    pub user_id: String,

    /// Resource to unlock on settlement (None = pure balance top-up)
    pub resource_id: Option<u64>,

    /// Charge in currency units
    pub amount: Decimal,

    /// Coins credited to the wallet when the order settles
    pub coins: u64,

    /// Lifecycle status
    pub status: OrderStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Settlement timestamp (None until paid)
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new pending order
    pub fn new(
        user_id: impl Into<String>,
        resource_id: Option<u64>,
        amount: Decimal,
        coins: u64,
    ) -> Self {
        Self {
            order_no: OrderNo::generate(),
            user_id: user_id.into(),
            resource_id,
            amount,
            coins,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    /// Transition to `paid`. Only legal from `pending` — an order
    /// never regresses once settled.
    pub fn mark_paid(&mut self, paid_at: DateTime<Utc>) -> Result<()> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Paid;
                self.paid_at = Some(paid_at);
                Ok(())
            }
            from => Err(MarketError::InvalidTransition {
                from,
                to: OrderStatus::Paid,
            }),
        }
    }

    /// Transition to `failed`. Only legal from `pending`.
    pub fn mark_failed(&mut self) -> Result<()> {
        match self.status {
            OrderStatus::Pending => {
                self.status = OrderStatus::Failed;
                Ok(())
            }
            from => Err(MarketError::InvalidTransition {
                from,
                to: OrderStatus::Failed,
            }),
        }
    }
}

/// Result of an atomic settlement attempt
#[derive(Clone, Debug)]
pub struct Settlement {
    /// The order after the attempt
    pub order: Order,

    /// Whether this call performed the pending→paid transition.
    /// A replayed settlement returns `false`.
    pub newly_paid: bool,
}

/// Order storage trait
pub trait OrderStore: Send + Sync {
    /// Save or update an order
    fn save(&self, order: &Order) -> Result<()>;

    /// Get order by number
    fn get(&self, order_no: &OrderNo) -> Result<Option<Order>>;

    /// List orders for a user, newest first
    fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>>;

    /// Settle an order (atomic check + transition).
    ///
    /// Marks a pending order paid. An already-paid order is returned
    /// unchanged with `newly_paid: false`, which is what makes a
    /// replayed gateway callback a no-op.
    fn settle(&self, order_no: &OrderNo, paid_at: DateTime<Utc>) -> Result<Settlement>;

    /// Mark a pending order failed (gateway closed the trade)
    fn fail(&self, order_no: &OrderNo) -> Result<Order>;
}

/// In-memory order store (for development)
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderNo, Order>>,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
        }
    }
}

impl OrderStore for MemoryOrderStore {
    fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().unwrap();
        orders.insert(order.order_no.clone(), order.clone());
        Ok(())
    }

    fn get(&self, order_no: &OrderNo) -> Result<Option<Order>> {
        let orders = self.orders.read().unwrap();
        Ok(orders.get(order_no).cloned())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let orders = self.orders.read().unwrap();
        let mut result: Vec<_> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    fn settle(&self, order_no: &OrderNo, paid_at: DateTime<Utc>) -> Result<Settlement> {
        let mut orders = self.orders.write().unwrap();
        let order = orders
            .get_mut(order_no)
            .ok_or_else(|| MarketError::OrderNotFound(order_no.to_string()))?;

        if order.status.is_paid() {
            return Ok(Settlement {
                order: order.clone(),
                newly_paid: false,
            });
        }

        order.mark_paid(paid_at)?;
        Ok(Settlement {
            order: order.clone(),
            newly_paid: true,
        })
    }

    fn fail(&self, order_no: &OrderNo) -> Result<Order> {
        let mut orders = self.orders.write().unwrap();
        let order = orders
            .get_mut(order_no)
            .ok_or_else(|| MarketError::OrderNotFound(order_no.to_string()))?;

        order.mark_failed()?;
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_no_format() {
        let no = OrderNo::generate();
        assert!(no.as_str().starts_with("ORD"));
        assert_eq!(no.as_str().len(), 19);
    }

    #[test]
    fn test_paid_is_final() {
        let mut order = Order::new("u1", Some(7), dec!(99.00), 990);
        assert!(!order.status.is_terminal());

        order.mark_paid(Utc::now()).unwrap();

        assert!(order.status.is_paid());
        assert!(order.status.is_terminal());
        assert!(order.mark_paid(Utc::now()).is_err());
        assert!(order.mark_failed().is_err());
    }

    #[test]
    fn test_settle_is_replay_safe() {
        let store = MemoryOrderStore::new();
        let order = Order::new("u1", None, dec!(10), 100);
        let no = order.order_no.clone();
        store.save(&order).unwrap();

        let first = store.settle(&no, Utc::now()).unwrap();
        assert!(first.newly_paid);

        let second = store.settle(&no, Utc::now()).unwrap();
        assert!(!second.newly_paid);
        assert_eq!(second.order.status, OrderStatus::Paid);
    }

    #[test]
    fn test_fail_only_from_pending() {
        let store = MemoryOrderStore::new();
        let order = Order::new("u1", None, dec!(10), 100);
        let no = order.order_no.clone();
        store.save(&order).unwrap();

        store.settle(&no, Utc::now()).unwrap();
        assert!(store.fail(&no).is_err());
    }

    #[test]
    fn test_unknown_order() {
        let store = MemoryOrderStore::new();
        let missing = OrderNo::from_string("ORDDOESNOTEXIST0");
        assert!(store.get(&missing).unwrap().is_none());
        assert!(store.settle(&missing, Utc::now()).is_err());
    }
}
