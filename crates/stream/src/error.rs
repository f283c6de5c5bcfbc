//! Stream error types

use thiserror::Error;

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors returned by stream backends
#[derive(Debug, Error)]
pub enum StreamError {
    /// Consumer group does not exist on the stream
    #[error("no consumer group '{group}' on stream '{key}'")]
    NoGroup { key: String, group: String },

    /// Entry id is not in `<millis>-<seq>` form
    #[error("invalid entry id: {0}")]
    InvalidId(String),

    /// Backend cannot be reached
    #[error("stream unavailable: {0}")]
    Unavailable(String),

    /// Backend replied with something we cannot interpret
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Redis client or server error
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

impl StreamError {
    /// Create a missing group error
    pub fn no_group(key: impl Into<String>, group: impl Into<String>) -> Self {
        Self::NoGroup {
            key: key.into(),
            group: group.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
