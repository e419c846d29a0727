//! Gateway Checkout
//!
//! Builds the signed payment descriptor the popup launcher submits to
//! the hosted gateway page. The descriptor's parameter map is opaque
//! to the client and must reach the gateway byte-for-byte.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use market_core::Order;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Hosted checkout page the popup form POSTs to
    pub payment_url: String,

    /// Merchant identifier assigned by the gateway
    pub merchant_id: String,

    /// Shared secret for parameter signing
    pub secret: String,

    /// Result page the gateway redirects the popup to
    pub return_url: String,

    /// Server callback the gateway notifies out-of-band
    pub notify_url: String,

    /// Coins credited per currency unit paid
    pub coins_per_unit: u64,
}

impl GatewayConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let require = |name: &str| {
            std::env::var(name).map_err(|_| PaymentError::Config(format!("{name} not set")))
        };

        // A zero rate would divide resource prices by zero at checkout.
        let coins_per_unit = match std::env::var("GATEWAY_COINS_PER_UNIT") {
            Ok(v) => v.parse().ok().filter(|rate| *rate > 0).ok_or_else(|| {
                PaymentError::Config(format!(
                    "GATEWAY_COINS_PER_UNIT must be a positive integer, got {v:?}"
                ))
            })?,
            Err(_) => 10,
        };

        Ok(Self {
            payment_url: require("GATEWAY_PAYMENT_URL")?,
            merchant_id: require("GATEWAY_MERCHANT_ID")?,
            secret: require("GATEWAY_SECRET")?,
            return_url: require("GATEWAY_RETURN_URL")?,
            notify_url: require("GATEWAY_NOTIFY_URL")?,
            coins_per_unit,
        })
    }
}

/// Gateway client
pub struct GatewayClient {
    config: GatewayConfig,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(GatewayConfig::from_env()?))
    }

    /// Get the signing secret
    pub fn secret(&self) -> &str {
        &self.config.secret
    }

    /// Get the coin conversion rate
    pub fn coins_per_unit(&self) -> u64 {
        self.config.coins_per_unit
    }

    /// Create a checkout: a pending order plus the signed descriptor
    /// the popup submits to the gateway.
    pub fn create_checkout(&self, request: CheckoutRequest) -> Result<Checkout> {
        if request.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidRequest(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        let coins = coins_for(request.amount, self.config.coins_per_unit);
        let order = Order::new(
            request.user_id,
            request.resource_id,
            request.amount,
            coins,
        );

        let mut params = BTreeMap::new();
        params.insert("merchant_id".into(), self.config.merchant_id.clone());
        params.insert("out_trade_no".into(), order.order_no.as_str().to_string());
        params.insert("total_amount".into(), order.amount.to_string());
        params.insert("subject".into(), request.subject);
        params.insert("return_url".into(), self.config.return_url.clone());
        params.insert("notify_url".into(), self.config.notify_url.clone());

        let sign = sign_params(&params, &self.config.secret)?;
        params.insert("sign".into(), sign);

        tracing::info!(
            order_no = %order.order_no,
            amount = %order.amount,
            coins,
            "Created checkout"
        );

        Ok(Checkout {
            order,
            descriptor: PaymentDescriptor {
                payment_url: self.config.payment_url.clone(),
                payment_params: params,
            },
        })
    }
}

/// Coins granted for a paid amount, rounded down
fn coins_for(amount: Decimal, coins_per_unit: u64) -> u64 {
    (amount * Decimal::from(coins_per_unit))
        .trunc()
        .to_u64()
        .unwrap_or(0)
}

/// Canonical signing payload: non-empty params except `sign`, sorted
/// by key, joined as `k=v&k=v`.
fn canonical_payload(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, v)| k.as_str() != "sign" && !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign a parameter map with HMAC-SHA256, hex-encoded
pub fn sign_params(params: &BTreeMap<String, String>, secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Config("invalid gateway secret".into()))?;
    mac.update(canonical_payload(params).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the `sign` field of an inbound parameter map (constant-time)
pub fn verify_signature(params: &BTreeMap<String, String>, secret: &str) -> Result<()> {
    let provided = params
        .get("sign")
        .ok_or_else(|| PaymentError::SignatureInvalid("missing sign field".into()))?;
    let raw = hex::decode(provided)
        .map_err(|_| PaymentError::SignatureInvalid("sign is not hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Config("invalid gateway secret".into()))?;
    mac.update(canonical_payload(params).as_bytes());
    mac.verify_slice(&raw)
        .map_err(|_| PaymentError::SignatureInvalid("signature mismatch".into()))
}

/// Request to create a checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Buyer
    pub user_id: String,

    /// Resource to unlock on settlement (None = balance top-up)
    #[serde(default)]
    pub resource_id: Option<u64>,

    /// Charge in currency units
    pub amount: Decimal,

    /// Human-readable line shown on the gateway page
    pub subject: String,
}

/// Payment descriptor submitted verbatim by the popup launcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentDescriptor {
    /// Gateway checkout URL
    pub payment_url: String,

    /// Form fields, including the signature
    pub payment_params: BTreeMap<String, String>,
}

/// Result of creating a checkout
#[derive(Clone, Debug)]
pub struct Checkout {
    /// The pending order to persist
    pub order: Order,

    /// Descriptor for the popup launcher
    pub descriptor: PaymentDescriptor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_client() -> GatewayClient {
        GatewayClient::new(GatewayConfig {
            payment_url: "https://pay.example.com/checkout".into(),
            merchant_id: "M100".into(),
            secret: "top-secret".into(),
            return_url: "https://market.example.com/pay/result".into(),
            notify_url: "https://market.example.com/notify/gateway".into(),
            coins_per_unit: 10,
        })
    }

    #[test]
    fn test_sign_roundtrip() {
        let mut params = BTreeMap::new();
        params.insert("out_trade_no".into(), "ORD1".into());
        params.insert("total_amount".into(), "99.00".into());

        let sign = sign_params(&params, "secret").unwrap();
        params.insert("sign".into(), sign);

        assert!(verify_signature(&params, "secret").is_ok());
        assert!(verify_signature(&params, "other-secret").is_err());
    }

    #[test]
    fn test_tampered_param_rejected() {
        let mut params = BTreeMap::new();
        params.insert("total_amount".into(), "99.00".into());
        let sign = sign_params(&params, "secret").unwrap();
        params.insert("sign".into(), sign);

        params.insert("total_amount".into(), "0.01".into());
        assert!(verify_signature(&params, "secret").is_err());
    }

    #[test]
    fn test_empty_values_excluded_from_payload() {
        let mut params = BTreeMap::new();
        params.insert("b".into(), "2".into());
        params.insert("a".into(), "1".into());
        params.insert("empty".into(), String::new());

        assert_eq!(canonical_payload(&params), "a=1&b=2");
    }

    #[test]
    fn test_create_checkout() {
        let checkout = test_client()
            .create_checkout(CheckoutRequest {
                user_id: "u1".into(),
                resource_id: Some(7),
                amount: dec!(99.00),
                subject: "Course".into(),
            })
            .unwrap();

        assert_eq!(checkout.order.coins, 990);
        assert_eq!(checkout.order.amount, dec!(99.00));

        let params = &checkout.descriptor.payment_params;
        assert_eq!(
            params.get("out_trade_no").map(String::as_str),
            Some(checkout.order.order_no.as_str())
        );
        assert_eq!(params.get("total_amount").map(String::as_str), Some("99.00"));
        assert!(verify_signature(params, "top-secret").is_ok());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let result = test_client().create_checkout(CheckoutRequest {
            user_id: "u1".into(),
            resource_id: None,
            amount: dec!(0),
            subject: "Top-up".into(),
        });

        assert!(matches!(result, Err(PaymentError::InvalidRequest(_))));
    }
}
