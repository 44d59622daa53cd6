//! Upstream event handling.
//!
//! Maps connector events and decoded messages onto hub broadcasts, in the
//! order the connector produced them.

use relay_core::{RelayMessage, StatusEvent};
use relay_feed::{Decoded, MessageDecoder};
use relay_hub::BroadcastHub;
use relay_telemetry::Metrics;
use relay_ws::{ConnectionState, UpstreamEvent, UpstreamMessage};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Relay {
    decoder: MessageDecoder,
    hub: Arc<BroadcastHub>,
}

impl Relay {
    pub fn new(decoder: MessageDecoder, hub: Arc<BroadcastHub>) -> Self {
        Self { decoder, hub }
    }

    /// Handle one connector event. Returns the number of subscribers
    /// that received a resulting message (0 when nothing is broadcast).
    pub fn handle(&self, event: UpstreamEvent) -> usize {
        match event {
            UpstreamEvent::Connected => {
                Metrics::upstream_connected();
                Metrics::upstream_state_set(ConnectionState::Connected.as_str());
                self.publish(StatusEvent::upstream_connected())
            }
            UpstreamEvent::Message(message) => self.handle_message(&message),
            UpstreamEvent::Error(detail) => self.publish(StatusEvent::upstream_error(&detail)),
            UpstreamEvent::Closed { code, reason } => {
                Metrics::upstream_disconnected();
                Metrics::upstream_state_set(ConnectionState::Disconnected.as_str());
                debug!(code, %reason, "Upstream session ended");
                self.publish(StatusEvent::upstream_disconnected())
            }
            UpstreamEvent::ReconnectScheduled {
                attempt,
                max_retries,
                delay,
            } => {
                Metrics::upstream_reconnect();
                Metrics::upstream_state_set(ConnectionState::Connecting.as_str());
                info!(
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream reconnect scheduled"
                );
                0
            }
            UpstreamEvent::Stopped { attempts } => {
                Metrics::upstream_state_set(ConnectionState::Stopped.as_str());
                self.publish(StatusEvent::retries_exhausted(attempts))
            }
        }
    }

    fn handle_message(&self, message: &UpstreamMessage) -> usize {
        Metrics::upstream_message(message.kind());

        match self.decoder.decode(message) {
            Decoded::Price(update) => {
                Metrics::price_update(&update.symbol);
                debug!(
                    feed_id = %update.feed_id,
                    symbol = %update.symbol,
                    price = %update.price,
                    "Price update"
                );
                self.hub.broadcast_message(&RelayMessage::PriceUpdate(update))
            }
            Decoded::Status(status) => {
                info!(message = %status.message, "Upstream status");
                self.publish(status)
            }
            Decoded::Diagnostic(detail) => {
                Metrics::decode_diagnostic();
                warn!(%detail, "Dropping malformed upstream payload");
                0
            }
            Decoded::Ignored => 0,
        }
    }

    fn publish(&self, status: StatusEvent) -> usize {
        self.hub.broadcast_message(&RelayMessage::Status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::FeedRegistry;
    use relay_hub::Subscription;
    use relay_telemetry::metrics::DECODE_DIAGNOSTICS_TOTAL;
    use std::time::Duration;

    fn relay() -> (Relay, Arc<BroadcastHub>) {
        let hub = Arc::new(BroadcastHub::new(16));
        let decoder = MessageDecoder::new(Arc::new(FeedRegistry::with_defaults().unwrap()));
        (Relay::new(decoder, hub.clone()), hub)
    }

    /// Messages after the two initial notices.
    fn drain_after_notices(subscription: &mut Subscription) -> Vec<RelayMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = subscription.receiver.try_recv() {
            out.push(serde_json::from_str(&msg).unwrap());
        }
        out.split_off(2)
    }

    fn upstream(text: &str) -> UpstreamEvent {
        UpstreamEvent::Message(UpstreamMessage::parse(text).unwrap())
    }

    #[test]
    fn test_connected_broadcasts_status() {
        let (relay, hub) = relay();
        let mut sub = hub.register();

        assert_eq!(relay.handle(UpstreamEvent::Connected), 1);
        assert_eq!(
            drain_after_notices(&mut sub),
            vec![RelayMessage::Status(StatusEvent::upstream_connected())]
        );
    }

    #[test]
    fn test_error_then_close_order() {
        let (relay, hub) = relay();
        let mut sub = hub.register();

        relay.handle(UpstreamEvent::Error("connection refused".to_string()));
        relay.handle(UpstreamEvent::Closed {
            code: 1006,
            reason: String::new(),
        });
        relay.handle(UpstreamEvent::ReconnectScheduled {
            attempt: 1,
            max_retries: 5,
            delay: Duration::from_millis(2000),
        });

        assert_eq!(
            drain_after_notices(&mut sub),
            vec![
                RelayMessage::Status(StatusEvent::new(
                    "WebSocket error: connection refused",
                    false
                )),
                RelayMessage::Status(StatusEvent::upstream_disconnected()),
            ]
        );
        assert_eq!(hub.last_status(), Some(StatusEvent::upstream_disconnected()));
    }

    #[test]
    fn test_price_update_fans_out() {
        let (relay, hub) = relay();
        let mut a = hub.register();
        let mut b = hub.register();

        let delivered = relay.handle(upstream(
            r#"{"type":"price_update","price_feed":{"id":"e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43","price":{"price":"12345","conf":"67","expo":-2}}}"#,
        ));
        assert_eq!(delivered, 2);

        for sub in [&mut a, &mut b] {
            let messages = drain_after_notices(sub);
            let [RelayMessage::PriceUpdate(update)] = messages.as_slice() else {
                panic!("expected one price update, got {messages:?}");
            };
            assert_eq!(update.price, "123.45");
            assert_eq!(update.confidence, "0.67");
            assert_eq!(update.symbol, "BTC/USD");
        }
    }

    #[test]
    fn test_malformed_price_is_not_broadcast() {
        let (relay, hub) = relay();
        let mut sub = hub.register();

        let before = DECODE_DIAGNOSTICS_TOTAL.get();
        let delivered = relay.handle(upstream(
            r#"{"type":"price_update","price_feed":{"id":"0x01","price":{"price":"1","conf":"1"}}}"#,
        ));
        assert_eq!(delivered, 0);
        assert!(drain_after_notices(&mut sub).is_empty());
        assert_eq!(DECODE_DIAGNOSTICS_TOTAL.get(), before + 1);
    }

    #[test]
    fn test_upstream_statuses_keep_connected_true() {
        let (relay, hub) = relay();
        let mut sub = hub.register();

        relay.handle(upstream(r#"{"type":"subscribe_response","success":false,"reason":"bad id"}"#));
        relay.handle(upstream(r#"{"type":"error","message":"boom"}"#));
        relay.handle(upstream(r#"{"type":"response","status":"success"}"#));

        assert_eq!(
            drain_after_notices(&mut sub),
            vec![
                RelayMessage::Status(StatusEvent::new("Subscription failed: bad id", true)),
                RelayMessage::Status(StatusEvent::new("Pyth Error: boom", true)),
            ]
        );
    }

    #[test]
    fn test_stopped_broadcasts_final_status() {
        let (relay, hub) = relay();
        let mut sub = hub.register();

        relay.handle(UpstreamEvent::Stopped { attempts: 5 });
        assert_eq!(
            drain_after_notices(&mut sub),
            vec![RelayMessage::Status(StatusEvent::retries_exhausted(5))]
        );
    }
}
