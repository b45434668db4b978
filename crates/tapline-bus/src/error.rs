//! Transport error types.

use thiserror::Error;

/// Result type alias for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Errors raised by the bus. None of them poison the bus itself.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid topic filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("invalid topic {0:?}")]
    InvalidTopic(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed payload on {topic}: {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}
