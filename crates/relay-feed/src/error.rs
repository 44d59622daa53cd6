//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

pub type FeedResult<T> = Result<T, FeedError>;
