//! Pipeline error types

use tally_protocol::EncodeError;
use tally_stream::StreamError;
use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid required input (e.g., empty event id)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Event payload could not be serialized
    #[error("failed to encode event '{event_id}': {source}")]
    Encode {
        event_id: String,
        #[source]
        source: EncodeError,
    },

    /// Stream append failed
    #[error("failed to enqueue: {0}")]
    Enqueue(#[source] StreamError),

    /// Consumer group setup failed
    #[error("failed to start worker: {0}")]
    Start(#[source] StreamError),

    /// Stream query failed
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// `start` called on a running worker
    #[error("worker is already running")]
    AlreadyRunning,

    /// Configuration rejected by `PipelineConfig::validate`
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
