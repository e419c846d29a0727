//! Marketplace API Client
//!
//! Thin reqwest wrapper over the server's REST endpoints. Wire shapes
//! are declared locally; the server's JSON is the contract.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use market_core::OrderStatus;
use popup_checkout::{GatewayForm, OrderStatusSource, PopupError, ResourceSummary, StatusSnapshot};

use crate::error::{ApiError, Result};

/// API client configuration
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Server base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("MARKET_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        let timeout_secs = std::env::var("MARKET_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            base_url,
            timeout_secs,
        }
    }
}

/// Marketplace API client
pub struct MarketApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl MarketApi {
    /// Create from configuration
    pub fn from_config(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(ApiConfig::from_env())
    }

    /// Create a checkout and get the descriptor for the popup launcher
    pub async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutReply> {
        let url = format!("{}/api/checkout", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        Self::parse(response).await
    }

    /// Fetch a user's wallet (what the opener reconciler re-queries)
    pub async fn wallet(&self, user_id: &str) -> Result<WalletReply> {
        let url = format!("{}/api/users/{}/wallet", self.config.base_url, user_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        Self::parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body["error"].as_str().unwrap_or("request failed").to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl OrderStatusSource for MarketApi {
    async fn fetch(&self, order_no: &str) -> popup_checkout::Result<StatusSnapshot> {
        let url = format!("{}/api/orders/{}", self.config.base_url, order_no);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PopupError::StatusRequest(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(order_no, status = %response.status(), "Status query rejected");
            return Err(PopupError::StatusRequest(format!(
                "server returned {}",
                response.status()
            )));
        }

        let reply: OrderStatusReply = response
            .json()
            .await
            .map_err(|e| PopupError::StatusRequest(e.to_string()))?;

        Ok(reply.into_snapshot())
    }
}

/// Checkout request body
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutRequest {
    /// Buyer
    pub user_id: String,

    /// Resource to purchase (None = balance top-up)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<u64>,

    /// Top-up amount in currency units (resource orders are priced
    /// server-side)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

/// Checkout response body
#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutReply {
    /// Merchant order number
    pub order_no: String,

    /// Gateway checkout URL
    pub payment_url: String,

    /// Signed form fields, submitted byte-for-byte
    pub payment_params: BTreeMap<String, String>,
}

impl CheckoutReply {
    /// Convert into the form the popup launcher submits
    pub fn into_form(self) -> GatewayForm {
        GatewayForm::new(self.payment_url, self.payment_params)
    }
}

/// Wallet response body
#[derive(Clone, Debug, Deserialize)]
pub struct WalletReply {
    /// Coin balance
    pub coins: u64,

    /// Purchases unlocking resources
    pub purchases: Vec<WalletPurchase>,
}

impl WalletReply {
    /// Whether a resource is unlocked for this user
    pub fn owns(&self, resource_id: u64) -> bool {
        self.purchases.iter().any(|p| p.resource_id == resource_id)
    }
}

/// One purchase record in a wallet
#[derive(Clone, Debug, Deserialize)]
pub struct WalletPurchase {
    pub resource_id: u64,
}

#[derive(Debug, Deserialize)]
struct OrderStatusReply {
    order: OrderBody,
    resource: Option<ResourceBody>,
}

#[derive(Debug, Deserialize)]
struct OrderBody {
    order_no: String,
    status: OrderStatus,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct ResourceBody {
    id: u64,
    title: String,
}

impl OrderStatusReply {
    fn into_snapshot(self) -> StatusSnapshot {
        StatusSnapshot {
            order_no: self.order.order_no,
            status: self.order.status,
            amount: self.order.amount,
            resource: self.resource.map(|r| ResourceSummary {
                id: r.id,
                title: r.title,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_status_reply_conversion() {
        let json = r#"{
            "order": {"order_no": "ORD123", "status": "paid", "amount": "99.00"},
            "resource": {"id": 7, "title": "Course"}
        }"#;

        let reply: OrderStatusReply = serde_json::from_str(json).unwrap();
        let snapshot = reply.into_snapshot();

        assert_eq!(snapshot.order_no, "ORD123");
        assert!(snapshot.status.is_paid());
        assert_eq!(snapshot.amount, dec!(99.00));
        assert_eq!(snapshot.resource.unwrap().id, 7);
    }

    #[test]
    fn test_topup_status_reply_has_no_resource() {
        let json = r#"{
            "order": {"order_no": "ORD9", "status": "pending", "amount": "5.00"},
            "resource": null
        }"#;

        let reply: OrderStatusReply = serde_json::from_str(json).unwrap();
        let snapshot = reply.into_snapshot();

        assert!(!snapshot.status.is_paid());
        assert!(snapshot.resource.is_none());
    }

    #[test]
    fn test_checkout_reply_into_form() {
        let json = r#"{
            "order_no": "ORD123",
            "payment_url": "https://pay.example.com/checkout",
            "payment_params": {"out_trade_no": "ORD123", "sign": "abc"}
        }"#;

        let reply: CheckoutReply = serde_json::from_str(json).unwrap();
        let form = reply.into_form();

        assert_eq!(form.action_url, "https://pay.example.com/checkout");
        assert_eq!(form.fields.get("sign").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_wallet_owns() {
        let json = r#"{"coins": 80, "purchases": [{"resource_id": 7}]}"#;
        let wallet: WalletReply = serde_json::from_str(json).unwrap();

        assert!(wallet.owns(7));
        assert!(!wallet.owns(8));
    }
}
