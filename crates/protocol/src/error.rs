//! Codec error types
//!
//! Errors raised while turning an `InstallEvent` into a stream entry payload
//! and back.

use thiserror::Error;

/// Errors that can occur while encoding an event
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Payload serialization failed
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that can occur while decoding a stream entry or event payload
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not a valid encoded event
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Required field absent or empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but not parseable
    #[error("invalid value for field '{field}': {value}")]
    InvalidField { field: &'static str, value: String },

    /// Coded enum value out of range
    #[error("invalid {field} code: {code}")]
    InvalidCode { field: &'static str, code: u8 },

    /// Envelope written by a newer producer
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),
}

impl DecodeError {
    /// Create a missing field error
    #[inline]
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField(field)
    }

    /// Create an invalid field error
    #[inline]
    pub fn invalid_field(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }

    /// Create an invalid enum code error
    #[inline]
    pub fn invalid_code(field: &'static str, code: u8) -> Self {
        Self::InvalidCode { field, code }
    }
}
