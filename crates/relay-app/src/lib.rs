//! Real-time price relay.
//!
//! Orchestrates the components:
//! - Upstream connector (one Hermes WebSocket session, bounded reconnects)
//! - Decoder (exponent-scaled prices, upstream status notices)
//! - Broadcast hub and subscriber gateway

pub mod app;
pub mod config;
pub mod error;
pub mod relay;

pub use app::Application;
pub use config::{AppConfig, FeedConfig, UpstreamConfig};
pub use error::{AppError, AppResult};
pub use relay::Relay;
