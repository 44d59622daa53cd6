//! Prometheus metrics for the price relay.
//!
//! All metrics live in the default registry and are exposed by the gateway
//! at `/metrics`.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error caught on first use.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

/// Upstream session state (1 = connected, 0 = otherwise).
pub static UPSTREAM_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "relay_upstream_connected",
        "Upstream WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// Upstream connector state machine.
/// Labels: state (disconnected/connecting/connected/stopped)
pub static UPSTREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "relay_upstream_state",
        "Upstream connector current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Scheduled reconnect attempts.
pub static UPSTREAM_RECONNECT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "relay_upstream_reconnect_total",
        "Total scheduled upstream reconnection attempts"
    )
    .unwrap()
});

/// Classified upstream messages.
/// Labels: kind (price_update/subscribe_response/error/response/unrecognized)
pub static UPSTREAM_MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "relay_upstream_messages_total",
        "Total classified upstream messages",
        &["kind"]
    )
    .unwrap()
});

/// Decoded price updates.
pub static PRICE_UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "relay_price_updates_total",
        "Total decoded price updates",
        &["symbol"]
    )
    .unwrap()
});

/// Upstream payloads rejected by the decoder.
pub static DECODE_DIAGNOSTICS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "relay_decode_diagnostics_total",
        "Total malformed upstream payloads"
    )
    .unwrap()
});

/// Per-subscriber message deliveries.
pub static BROADCAST_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "relay_broadcast_deliveries_total",
        "Total messages enqueued to subscribers"
    )
    .unwrap()
});

/// Messages dropped because a subscriber queue was full.
pub static BROADCAST_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "relay_broadcast_dropped_total",
        "Total messages dropped for slow subscribers"
    )
    .unwrap()
});

/// Connected downstream subscribers.
pub static SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("relay_subscribers", "Connected downstream subscribers").unwrap()
});

const UPSTREAM_STATES: [&str; 4] = ["disconnected", "connecting", "connected", "stopped"];

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn upstream_connected() {
        UPSTREAM_CONNECTED.set(1.0);
    }

    pub fn upstream_disconnected() {
        UPSTREAM_CONNECTED.set(0.0);
    }

    /// Only the active state is set to 1.
    pub fn upstream_state_set(state: &str) {
        for s in UPSTREAM_STATES {
            UPSTREAM_STATE.with_label_values(&[s]).set(0.0);
        }
        UPSTREAM_STATE.with_label_values(&[state]).set(1.0);
    }

    pub fn upstream_reconnect() {
        UPSTREAM_RECONNECT_TOTAL.inc();
    }

    pub fn upstream_message(kind: &str) {
        UPSTREAM_MESSAGES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn price_update(symbol: &str) {
        PRICE_UPDATES_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn decode_diagnostic() {
        DECODE_DIAGNOSTICS_TOTAL.inc();
    }

    pub fn broadcast_delivered(count: usize) {
        BROADCAST_DELIVERIES_TOTAL.inc_by(count as u64);
    }

    pub fn broadcast_dropped() {
        BROADCAST_DROPPED_TOTAL.inc();
    }

    pub fn subscribers_set(count: usize) {
        SUBSCRIBERS.set(count as i64);
    }
}

/// Prometheus text exposition of the default registry.
pub fn gather_text() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
