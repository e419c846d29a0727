//! User Accounts
//!
//! A user account holds the coin balance and the purchase records that
//! unlock resources. Balances change only through the store's atomic
//! operations; nothing client-side ever patches them directly.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};
use crate::order::OrderNo;

/// A settled purchase of a resource
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Purchase {
    /// Resource unlocked by this purchase
    pub resource_id: u64,

    /// Order that funded it (None for manual grants)
    pub order_no: Option<OrderNo>,

    /// Coins spent
    pub coins_spent: u64,

    /// Purchase timestamp
    pub purchased_at: DateTime<Utc>,
}

/// A user account with coin wallet and purchases
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserAccount {
    /// Owner identifier
    pub user_id: String,

    /// Coin balance
    pub coins: u64,

    /// Purchase history
    pub purchases: Vec<Purchase>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Create an empty account
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            coins: 0,
            purchases: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add coins to the wallet
    pub fn credit(&mut self, coins: u64) {
        self.coins = self.coins.saturating_add(coins);
        self.touch();
    }

    /// Remove coins from the wallet
    pub fn debit(&mut self, coins: u64) -> Result<()> {
        if self.coins < coins {
            return Err(MarketError::InsufficientCoins {
                needed: coins,
                available: self.coins,
            });
        }
        self.coins -= coins;
        self.touch();
        Ok(())
    }

    /// Record a purchase
    pub fn grant(&mut self, purchase: Purchase) {
        self.purchases.push(purchase);
        self.touch();
    }

    /// Whether the user has purchased a resource
    pub fn owns(&self, resource_id: u64) -> bool {
        self.purchases.iter().any(|p| p.resource_id == resource_id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Result of an atomic purchase attempt
#[derive(Clone, Debug)]
pub struct PurchaseOutcome {
    /// Whether this call recorded the purchase.
    /// `false` means the user already owned the resource.
    pub granted: bool,

    /// Balance after the attempt
    pub balance: u64,
}

/// Account storage trait
pub trait AccountStore: Send + Sync {
    /// Get account by user id
    fn get(&self, user_id: &str) -> Result<Option<UserAccount>>;

    /// Get account, creating an empty one if absent
    fn get_or_create(&self, user_id: &str) -> Result<UserAccount>;

    /// Credit coins (atomic). Returns the new balance.
    fn credit(&self, user_id: &str, coins: u64) -> Result<u64>;

    /// Purchase a resource (atomic check + debit + grant).
    ///
    /// A resource the user already owns is left alone — buying twice
    /// must never debit twice.
    fn purchase(
        &self,
        user_id: &str,
        resource_id: u64,
        price: u64,
        order_no: Option<OrderNo>,
    ) -> Result<PurchaseOutcome>;
}

/// In-memory account store (for development)
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, UserAccount>>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }
}

impl AccountStore for MemoryAccountStore {
    fn get(&self, user_id: &str) -> Result<Option<UserAccount>> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.get(user_id).cloned())
    }

    fn get_or_create(&self, user_id: &str) -> Result<UserAccount> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| UserAccount::new(user_id));
        Ok(account.clone())
    }

    fn credit(&self, user_id: &str, coins: u64) -> Result<u64> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| UserAccount::new(user_id));

        account.credit(coins);
        Ok(account.coins)
    }

    fn purchase(
        &self,
        user_id: &str,
        resource_id: u64,
        price: u64,
        order_no: Option<OrderNo>,
    ) -> Result<PurchaseOutcome> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| UserAccount::new(user_id));

        if account.owns(resource_id) {
            return Ok(PurchaseOutcome {
                granted: false,
                balance: account.coins,
            });
        }

        account.debit(price)?;
        account.grant(Purchase {
            resource_id,
            order_no,
            coins_spent: price,
            purchased_at: Utc::now(),
        });

        Ok(PurchaseOutcome {
            granted: true,
            balance: account.coins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_and_debit() {
        let mut account = UserAccount::new("u1");
        account.credit(100);
        assert_eq!(account.coins, 100);

        account.debit(30).unwrap();
        assert_eq!(account.coins, 70);

        let err = account.debit(100).unwrap_err();
        assert!(matches!(err, MarketError::InsufficientCoins { .. }));
        assert_eq!(account.coins, 70);
    }

    #[test]
    fn test_purchase_debits_once() {
        let store = MemoryAccountStore::new();
        store.credit("u1", 200).unwrap();

        let first = store.purchase("u1", 7, 120, None).unwrap();
        assert!(first.granted);
        assert_eq!(first.balance, 80);

        let second = store.purchase("u1", 7, 120, None).unwrap();
        assert!(!second.granted);
        assert_eq!(second.balance, 80);
    }

    #[test]
    fn test_purchase_requires_balance() {
        let store = MemoryAccountStore::new();
        store.credit("u1", 50).unwrap();

        assert!(store.purchase("u1", 7, 120, None).is_err());
        let account = store.get("u1").unwrap().unwrap();
        assert_eq!(account.coins, 50);
        assert!(!account.owns(7));
    }
}
