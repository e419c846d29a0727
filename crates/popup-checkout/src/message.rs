//! Cross-Window Message Contract

use serde::{Deserialize, Serialize};

/// Messages a popup may post to its opener window.
///
/// The discriminator travels as a `type` field. Listeners parse
/// incoming payloads against this enum and drop anything that does
/// not match — message origin and shape are never assumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMessage {
    /// The popup observed the order as paid
    #[serde(rename_all = "camelCase")]
    PaymentSuccess {
        /// Merchant order number
        order_no: String,
    },
}

impl PaymentMessage {
    /// Success message for an order
    pub fn success(order_no: impl Into<String>) -> Self {
        Self::PaymentSuccess {
            order_no: order_no.into(),
        }
    }

    /// Parse a raw message payload; unknown shapes yield `None`
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Serialize for posting across windows
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let json = PaymentMessage::success("ORD123").to_json();
        assert!(json.contains(r#""type":"payment_success""#));
        assert!(json.contains(r#""orderNo":"ORD123""#));
    }

    #[test]
    fn test_roundtrip() {
        let message = PaymentMessage::success("ORD123");
        assert_eq!(PaymentMessage::parse(&message.to_json()), Some(message));
    }

    #[test]
    fn test_unknown_shapes_ignored() {
        assert_eq!(PaymentMessage::parse("not json"), None);
        assert_eq!(PaymentMessage::parse(r#"{"type":"other"}"#), None);
        assert_eq!(PaymentMessage::parse(r#"{"orderNo":"ORD123"}"#), None);
    }
}
