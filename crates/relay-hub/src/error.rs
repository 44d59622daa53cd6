//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HubResult<T> = Result<T, HubError>;
