//! Upstream WebSocket connector for the price relay.
//!
//! Provides the single upstream session with:
//! - One subscribe request per successful connect
//! - Classification of inbound payloads into `UpstreamMessage`
//! - Bounded exponential backoff reconnection with a hard retry ceiling
//! - Channel-based event delivery (`UpstreamEvent`)

pub mod backoff;
pub mod connection;
pub mod error;
pub mod message;

pub use backoff::{ReconnectDecision, ReconnectPolicy};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, UpstreamEvent};
pub use error::{WsError, WsResult};
pub use message::{
    ErrorMessage, PriceUpdateMessage, RawPrice, RawPriceFeed, ResponseMessage, SubscribeRequest,
    SubscribeResponse, UpstreamMessage,
};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
