//! Upstream message types.

use crate::error::{WsError, WsResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Subscribe Request (Outgoing)
// ============================================================================

/// Subscribe request sent once per successful connect.
///
/// Format: `{"type":"subscribe","ids":["0x...", ...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub request_type: &'static str,
    pub ids: Vec<String>,
}

impl SubscribeRequest {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            request_type: "subscribe",
            ids,
        }
    }
}

// ============================================================================
// Inbound payloads
// ============================================================================

/// `{"type":"price_update","price_feed":{...}}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceUpdateMessage {
    #[serde(default)]
    pub price_feed: Option<RawPriceFeed>,
}

/// Price feed body of a price update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPriceFeed {
    pub id: String,
    #[serde(default)]
    pub price: Option<RawPrice>,
}

/// Exponent-scaled price fields.
///
/// Kept as raw JSON values: Hermes sends `price`/`conf` as strings and `expo`
/// as a number, and validation of those shapes belongs to the decoder.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPrice {
    #[serde(default)]
    pub price: Value,
    #[serde(default)]
    pub conf: Value,
    #[serde(default)]
    pub expo: Value,
}

/// `{"type":"subscribe_response","success":bool,"reason":...}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscribeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `{"type":"error",...}` or any payload with `"status":"error"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorMessage {
    /// First non-empty of `message` and `error`, then a generic fallback.
    pub fn detail(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.error.as_deref().filter(|e| !e.is_empty()))
            .unwrap_or("Unknown error")
    }
}

/// `{"type":"response","status":...,"error":...}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResponseMessage {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }
}

/// Classified upstream message.
///
/// The discriminant is inspected once; each variant carries its typed body.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamMessage {
    PriceUpdate(PriceUpdateMessage),
    SubscribeResponse(SubscribeResponse),
    Error(ErrorMessage),
    Response(ResponseMessage),
    /// Anything else; carries the `type` field if there was one.
    Unrecognized(Option<String>),
}

impl UpstreamMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> WsResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::classify(value)
    }

    /// Classify a parsed payload.
    ///
    /// Precedence: `price_update`, `subscribe_response`, then error (either
    /// `type` or `status` equal to `"error"`), then `response`.
    pub fn classify(value: Value) -> WsResult<Self> {
        if !value.is_object() {
            return Err(WsError::ParseError(format!(
                "expected JSON object, got {}",
                json_kind(&value)
            )));
        }

        let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);
        let status_is_error = value.get("status").and_then(Value::as_str) == Some("error");

        let message = match kind.as_deref() {
            Some("price_update") => Self::PriceUpdate(serde_json::from_value(value)?),
            Some("subscribe_response") => Self::SubscribeResponse(serde_json::from_value(value)?),
            Some("error") => Self::Error(serde_json::from_value(value)?),
            _ if status_is_error => Self::Error(serde_json::from_value(value)?),
            Some("response") => Self::Response(serde_json::from_value(value)?),
            _ => Self::Unrecognized(kind.clone()),
        };

        Ok(message)
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PriceUpdate(_) => "price_update",
            Self::SubscribeResponse(_) => "subscribe_response",
            Self::Error(_) => "error",
            Self::Response(_) => "response",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
