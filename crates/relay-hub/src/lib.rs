//! relay-hub - Subscriber fan-out and WebSocket gateway.
//!
//! # Architecture
//!
//! ```text
//! relay task ──broadcast()──▶ BroadcastHub ──try_send──▶ per-subscriber queue
//!                                                         │
//!            axum server (port 8081)                      ▼
//!            GET /ws          → upgrade, register, forward queue to socket
//!            GET /api/status  → subscriber count + last upstream status
//!            GET /metrics     → Prometheus text exposition
//! ```

mod config;
mod error;
mod hub;
mod server;

pub use config::ServerConfig;
pub use error::{HubError, HubResult};
pub use hub::{BroadcastHub, SubscriberId, Subscription};
pub use server::{create_router, run_server, serve, ConnectionLimiter, GatewayState, StatusSnapshot};
