//! Prometheus metrics and structured logging for the price relay.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Process-wide Prometheus metrics behind the `Metrics` facade
//! - Text exposition for the gateway's `/metrics` endpoint

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{gather_text, Metrics};
