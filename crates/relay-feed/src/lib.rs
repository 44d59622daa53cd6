//! Upstream message decoding for the price relay.
//!
//! Turns classified upstream messages into downstream `RelayMessage`
//! payloads: exponent-scaled prices with resolved symbols, and status
//! notices for subscription results and upstream-reported errors.

pub mod decoder;
pub mod error;

pub use decoder::{format_scaled, Decoded, MessageDecoder};
pub use error::{FeedError, FeedResult};
