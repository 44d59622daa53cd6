//! Core domain types for the price relay.
//!
//! This crate provides the types shared by every other relay crate:
//! - `FeedId`: Canonical upstream feed identifier (`0x`-prefixed hex)
//! - `FeedRegistry`: Static feed identifier to symbol table
//! - `NormalizedPriceUpdate`, `StatusEvent`: Downstream payloads
//! - `RelayMessage`: Tagged downstream wire message

pub mod error;
pub mod feed;
pub mod registry;
pub mod types;

pub use error::{CoreError, Result};
pub use feed::FeedId;
pub use registry::{FeedEntry, FeedRegistry, DEFAULT_FEEDS, UNKNOWN_SYMBOL};
pub use types::{NormalizedPriceUpdate, RelayMessage, StatusEvent};
