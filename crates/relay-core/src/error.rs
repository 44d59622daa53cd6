//! Error types for relay-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid feed id: {0}")]
    InvalidFeedId(String),

    #[error("Duplicate feed id: {0}")]
    DuplicateFeed(String),

    #[error("Feed registry is empty")]
    EmptyRegistry,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
