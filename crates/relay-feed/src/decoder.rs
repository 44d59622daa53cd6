//! Upstream message decoder.
//!
//! Price mantissas arrive as integers with a base-10 exponent. The exponent's
//! sign is ignored: the value is always `mantissa / 10^|expo|`, rendered with
//! exactly two fractional digits (half away from zero). Scaling is done in
//! integer hundredths, so any integer mantissa and exponent render.

use crate::error::{FeedError, FeedResult};
use relay_core::{FeedRegistry, NormalizedPriceUpdate, StatusEvent};
use relay_ws::{PriceUpdateMessage, ResponseMessage, SubscribeResponse, UpstreamMessage};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Result of decoding one upstream message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Broadcast as `price_update`.
    Price(NormalizedPriceUpdate),
    /// Broadcast as `status`.
    Status(StatusEvent),
    /// Malformed payload. Logged by the caller, never broadcast.
    Diagnostic(String),
    /// Nothing to forward.
    Ignored,
}

/// Decoder for classified upstream messages.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    registry: Arc<FeedRegistry>,
}

impl MessageDecoder {
    pub fn new(registry: Arc<FeedRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    /// Decode a message. Never fails; bad payloads become `Decoded::Diagnostic`.
    pub fn decode(&self, message: &UpstreamMessage) -> Decoded {
        match message {
            UpstreamMessage::PriceUpdate(update) => match self.decode_price(update) {
                Ok(price) => Decoded::Price(price),
                Err(e) => Decoded::Diagnostic(format!(
                    "Invalid price_update for {}: {e}",
                    update
                        .price_feed
                        .as_ref()
                        .map(|feed| feed.id.as_str())
                        .unwrap_or("<no feed>")
                )),
            },
            UpstreamMessage::SubscribeResponse(response) => {
                Decoded::Status(subscription_status(response))
            }
            UpstreamMessage::Error(error) => {
                Decoded::Status(StatusEvent::new(format!("Pyth Error: {}", error.detail()), true))
            }
            UpstreamMessage::Response(response) if response.is_success() => {
                debug!("Upstream acknowledged request");
                Decoded::Ignored
            }
            UpstreamMessage::Response(response) => Decoded::Status(api_error_status(response)),
            UpstreamMessage::Unrecognized(kind) => {
                debug!(?kind, "Ignoring unrecognized upstream message");
                Decoded::Ignored
            }
        }
    }

    fn decode_price(&self, update: &PriceUpdateMessage) -> FeedResult<NormalizedPriceUpdate> {
        let feed = update
            .price_feed
            .as_ref()
            .ok_or(FeedError::MissingField("price_feed"))?;
        let raw = feed
            .price
            .as_ref()
            .ok_or(FeedError::MissingField("price_feed.price"))?;

        let expo = parse_expo(&raw.expo)?;
        let price = parse_mantissa("price", &raw.price)?;
        let confidence = parse_mantissa("conf", &raw.conf)?;

        Ok(NormalizedPriceUpdate {
            feed_id: feed.id.clone(),
            price: format_scaled(price, expo),
            confidence: format_scaled(confidence, expo),
            symbol: self.registry.resolve(&feed.id).to_string(),
        })
    }
}

fn subscription_status(response: &SubscribeResponse) -> StatusEvent {
    if response.success {
        StatusEvent::new("Successfully subscribed to price updates", true)
    } else {
        StatusEvent::new(
            format!(
                "Subscription failed: {}",
                response
                    .reason
                    .as_deref()
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or("Unknown reason")
            ),
            true,
        )
    }
}

fn api_error_status(response: &ResponseMessage) -> StatusEvent {
    StatusEvent::new(
        format!(
            "Pyth API Error: {}",
            response
                .error
                .as_deref()
                .filter(|error| !error.is_empty())
                .unwrap_or("Unknown error")
        ),
        true,
    )
}

/// `mantissa / 10^|expo|` with exactly two fractional digits, rounding half
/// away from zero. Never prints `-0.00`.
pub fn format_scaled(mantissa: i128, expo: i64) -> String {
    let scale = expo.unsigned_abs();
    let magnitude = mantissa.unsigned_abs();

    let hundredths = if scale <= 2 {
        let mut digits = magnitude.to_string();
        digits.extend(std::iter::repeat('0').take((2 - scale) as usize));
        digits
    } else {
        round_half_away(magnitude, scale - 2).to_string()
    };

    render_hundredths(mantissa < 0, &hundredths)
}

/// `value / 10^shift`, rounded half away from zero.
fn round_half_away(value: u128, shift: u64) -> u128 {
    let Some(divisor) = u32::try_from(shift)
        .ok()
        .and_then(|shift| 10u128.checked_pow(shift))
    else {
        // 10^shift is beyond u128, so the quotient is below one half.
        return 0;
    };

    let quotient = value / divisor;
    let remainder = value % divisor;
    if remainder >= divisor - remainder {
        quotient + 1
    } else {
        quotient
    }
}

/// Place the decimal point two digits from the right of `digits`.
fn render_hundredths(negative: bool, digits: &str) -> String {
    let padded = format!("{digits:0>3}");
    let (whole, fraction) = padded.split_at(padded.len() - 2);
    let sign = if negative && padded.bytes().any(|b| b != b'0') {
        "-"
    } else {
        ""
    };
    format!("{sign}{whole}.{fraction}")
}

/// Integer mantissa from a JSON string (Hermes) or JSON integer.
fn parse_mantissa(field: &'static str, value: &Value) -> FeedResult<i128> {
    let invalid = || FeedError::InvalidNumber {
        field,
        value: value.to_string(),
    };

    match value {
        Value::String(s) => s.trim().parse::<i128>().map_err(|_| invalid()),
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .ok_or_else(invalid),
        Value::Null => Err(FeedError::MissingField(field)),
        _ => Err(invalid()),
    }
}

/// Exponent must be a JSON number with no fractional part.
fn parse_expo(value: &Value) -> FeedResult<i64> {
    let invalid = || FeedError::InvalidNumber {
        field: "expo",
        value: value.to_string(),
    };

    match value {
        Value::Number(n) => match n.as_i64() {
            Some(expo) => Ok(expo),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                .map(|f| f as i64)
                .ok_or_else(invalid),
        },
        Value::Null => Err(FeedError::MissingField("expo")),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_ws::{ErrorMessage, RawPrice, RawPriceFeed};
    use serde_json::json;

    const BTC_ID: &str = "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43";

    fn decoder() -> MessageDecoder {
        MessageDecoder::new(Arc::new(FeedRegistry::with_defaults().unwrap()))
    }

    fn price_message(id: &str, price: Value, conf: Value, expo: Value) -> UpstreamMessage {
        UpstreamMessage::PriceUpdate(PriceUpdateMessage {
            price_feed: Some(RawPriceFeed {
                id: id.to_string(),
                price: Some(RawPrice {
                    price,
                    conf,
                    expo,
                }),
            }),
        })
    }

    #[test]
    fn test_format_scaled() {
        assert_eq!(format_scaled(12345, -2), "123.45");
        assert_eq!(format_scaled(67, -2), "0.67");
        assert_eq!(format_scaled(5, 0), "5.00");
        assert_eq!(format_scaled(0, -8), "0.00");
        // Sign of the exponent is ignored.
        assert_eq!(format_scaled(12345, 2), "123.45");
    }

    #[test]
    fn test_format_scaled_rounding() {
        assert_eq!(format_scaled(125, -3), "0.13");
        assert_eq!(format_scaled(-125, -3), "-0.13");
        assert_eq!(format_scaled(124, -3), "0.12");
        assert_eq!(format_scaled(6512345678901, -8), "65123.46");
        assert_eq!(format_scaled(-1, -3), "0.00");
        assert_eq!(format_scaled(-5, -3), "-0.01");
    }

    #[test]
    fn test_format_scaled_extreme_values() {
        assert_eq!(format_scaled(10i128.pow(30), -30), "1.00");
        assert_eq!(format_scaled(12345, -29), "0.00");
        assert_eq!(format_scaled(i128::MAX, -60), "0.00");
        assert_eq!(format_scaled(-i128::MAX, -400), "0.00");
        assert_eq!(format_scaled(i128::MAX, 0), format!("{}.00", i128::MAX));
        assert_eq!(
            format_scaled(i128::MIN, -2),
            "-1701411834604692317316873037158841057.28"
        );
    }

    #[test]
    fn test_decode_price_update() {
        let message = price_message(BTC_ID, json!("12345"), json!("67"), json!(-2));
        let decoded = decoder().decode(&message);
        assert_eq!(
            decoded,
            Decoded::Price(NormalizedPriceUpdate {
                feed_id: BTC_ID.to_string(),
                price: "123.45".to_string(),
                confidence: "0.67".to_string(),
                symbol: "BTC/USD".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_realistic_hermes_price() {
        let id = BTC_ID.trim_start_matches("0x");
        let message = price_message(id, json!("6512345678901"), json!("3456789"), json!(-8));
        let Decoded::Price(update) = decoder().decode(&message) else {
            panic!("expected price");
        };
        assert_eq!(update.price, "65123.46");
        assert_eq!(update.confidence, "0.03");
        assert_eq!(update.symbol, "BTC/USD");
        // Id is echoed as received, not canonicalized.
        assert_eq!(update.feed_id, id);
    }

    #[test]
    fn test_decode_integer_mantissas() {
        let message = price_message("0x01", json!(12345), json!(67), json!(-2));
        let Decoded::Price(update) = decoder().decode(&message) else {
            panic!("expected price");
        };
        assert_eq!(update.price, "123.45");
        assert_eq!(update.symbol, "Unknown");
    }

    #[test]
    fn test_decode_very_large_exponents() {
        let d = decoder();
        let big = price_message(
            "0x01",
            json!("1000000000000000000000000000000"),
            json!("5"),
            json!(-30),
        );
        let Decoded::Price(update) = d.decode(&big) else {
            panic!("expected price");
        };
        assert_eq!(update.price, "1.00");
        assert_eq!(update.confidence, "0.00");

        let tiny = price_message("0x01", json!("12345"), json!("1"), json!(-29));
        let Decoded::Price(update) = d.decode(&tiny) else {
            panic!("expected price");
        };
        assert_eq!(update.price, "0.00");
    }

    #[test]
    fn test_missing_expo_is_diagnostic() {
        let message = price_message(BTC_ID, json!("12345"), json!("67"), Value::Null);
        let Decoded::Diagnostic(detail) = decoder().decode(&message) else {
            panic!("expected diagnostic");
        };
        assert!(detail.contains("expo"));
        assert!(detail.contains(BTC_ID));
    }

    #[test]
    fn test_non_numeric_fields_are_diagnostics() {
        let d = decoder();
        let string_expo = price_message(BTC_ID, json!("1"), json!("1"), json!("-2"));
        assert!(matches!(d.decode(&string_expo), Decoded::Diagnostic(_)));

        let bad_price = price_message(BTC_ID, json!("12.5"), json!("1"), json!(-2));
        assert!(matches!(d.decode(&bad_price), Decoded::Diagnostic(_)));

        let bad_conf = price_message(BTC_ID, json!("1"), json!(true), json!(-2));
        assert!(matches!(d.decode(&bad_conf), Decoded::Diagnostic(_)));

        let no_feed = UpstreamMessage::PriceUpdate(PriceUpdateMessage { price_feed: None });
        assert!(matches!(d.decode(&no_feed), Decoded::Diagnostic(_)));
    }

    #[test]
    fn test_subscription_statuses() {
        let d = decoder();
        let ok = UpstreamMessage::SubscribeResponse(SubscribeResponse {
            success: true,
            reason: None,
        });
        assert_eq!(
            d.decode(&ok),
            Decoded::Status(StatusEvent::new("Successfully subscribed to price updates", true))
        );

        let failed = UpstreamMessage::SubscribeResponse(SubscribeResponse {
            success: false,
            reason: None,
        });
        assert_eq!(
            d.decode(&failed),
            Decoded::Status(StatusEvent::new("Subscription failed: Unknown reason", true))
        );

        let empty_reason = UpstreamMessage::SubscribeResponse(SubscribeResponse {
            success: false,
            reason: Some(String::new()),
        });
        assert_eq!(
            d.decode(&empty_reason),
            Decoded::Status(StatusEvent::new("Subscription failed: Unknown reason", true))
        );
    }

    #[test]
    fn test_error_statuses() {
        let d = decoder();
        let error = UpstreamMessage::Error(ErrorMessage {
            message: None,
            error: Some("rate limited".to_string()),
        });
        assert_eq!(
            d.decode(&error),
            Decoded::Status(StatusEvent::new("Pyth Error: rate limited", true))
        );

        let api_error = UpstreamMessage::Response(ResponseMessage {
            status: Some("failure".to_string()),
            error: Some("unknown id".to_string()),
        });
        assert_eq!(
            d.decode(&api_error),
            Decoded::Status(StatusEvent::new("Pyth API Error: unknown id", true))
        );
    }

    #[test]
    fn test_ignored_messages() {
        let d = decoder();
        let ack = UpstreamMessage::Response(ResponseMessage {
            status: Some("success".to_string()),
            error: None,
        });
        assert_eq!(d.decode(&ack), Decoded::Ignored);
        assert_eq!(
            d.decode(&UpstreamMessage::Unrecognized(Some("heartbeat".to_string()))),
            Decoded::Ignored
        );
    }
}
