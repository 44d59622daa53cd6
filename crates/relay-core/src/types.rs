//! Downstream message types.
//!
//! These types are serialized as JSON and pushed to every connected
//! subscriber.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A decoded price, ready for subscribers.
///
/// `price` and `confidence` are decimal strings with exactly two fractional
/// digits. `feed_id` echoes the upstream id as it was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPriceUpdate {
    pub feed_id: String,
    pub price: String,
    pub confidence: String,
    pub symbol: String,
}

/// Connection state notice.
///
/// `connected` is omitted for notices that say nothing about the upstream
/// session (the gateway's welcome message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
}

impl StatusEvent {
    pub fn new(message: impl Into<String>, connected: bool) -> Self {
        Self {
            message: message.into(),
            connected: Some(connected),
        }
    }

    /// Notice without a connection flag.
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connected: None,
        }
    }

    /// First message every subscriber receives.
    pub fn welcome() -> Self {
        Self::notice("Connected to server")
    }

    /// Second message every subscriber receives.
    pub fn connecting_upstream() -> Self {
        Self::new("Connecting to Pyth Network...", true)
    }

    pub fn upstream_connected() -> Self {
        Self::new("Connected to Pyth Hermes WebSocket", true)
    }

    pub fn upstream_disconnected() -> Self {
        Self::new("Disconnected from Pyth Hermes WebSocket", false)
    }

    pub fn upstream_error(detail: &str) -> Self {
        Self::new(format!("WebSocket error: {detail}"), false)
    }

    pub fn retries_exhausted(max_retries: u32) -> Self {
        Self::new(
            format!("Upstream reconnection stopped after {max_retries} attempts"),
            false,
        )
    }
}

/// Tagged downstream message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    Status(StatusEvent),
    PriceUpdate(NormalizedPriceUpdate),
}

impl RelayMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<StatusEvent> for RelayMessage {
    fn from(event: StatusEvent) -> Self {
        Self::Status(event)
    }
}

impl From<NormalizedPriceUpdate> for RelayMessage {
    fn from(update: NormalizedPriceUpdate) -> Self {
        Self::PriceUpdate(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_update() -> NormalizedPriceUpdate {
        NormalizedPriceUpdate {
            feed_id: "e62df6c8".to_string(),
            price: "123.45".to_string(),
            confidence: "0.67".to_string(),
            symbol: "BTC/USD".to_string(),
        }
    }

    #[test]
    fn test_price_update_wire_shape() {
        let json = RelayMessage::from(sample_update()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "price_update",
                "feedId": "e62df6c8",
                "price": "123.45",
                "confidence": "0.67",
                "symbol": "BTC/USD"
            })
        );
    }

    #[test]
    fn test_price_update_roundtrip_preserves_fields() {
        let original = RelayMessage::from(sample_update());
        let parsed: RelayMessage = serde_json::from_str(&original.to_json().unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_status_wire_shape() {
        let json = RelayMessage::from(StatusEvent::connecting_upstream())
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"type":"status","message":"Connecting to Pyth Network...","connected":true}"#
        );
    }

    #[test]
    fn test_welcome_omits_connected() {
        let json = RelayMessage::from(StatusEvent::welcome()).to_json().unwrap();
        assert_eq!(json, r#"{"type":"status","message":"Connected to server"}"#);
    }

    #[test]
    fn test_upstream_error_is_disconnected() {
        let event = StatusEvent::upstream_error("reset by peer");
        assert_eq!(event.message, "WebSocket error: reset by peer");
        assert_eq!(event.connected, Some(false));
    }
}
