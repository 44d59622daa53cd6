//! Integration tests for the price relay.
//!
//! These tests run the real connector and gateway against a mock upstream:
//! - Upstream connection lifecycle and subscription
//! - Price fan-out to gateway subscribers
//! - Retry exhaustion with the gateway still serving

pub mod common;
