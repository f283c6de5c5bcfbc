//! Event payload codec
//!
//! Events travel through the stream as JSON. JSON is UTF-8 text, so the
//! encoded payload can be stored in a string-valued stream field as-is.

use crate::error::{DecodeError, EncodeError};
use crate::event::InstallEvent;

/// Encode an event into its stream payload
///
/// # Errors
///
/// Returns `EncodeError` if the event cannot be serialized.
pub fn encode(event: &InstallEvent) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(event)?)
}

/// Encode an event into a UTF-8 payload string
///
/// # Errors
///
/// Returns `EncodeError` if the event cannot be serialized.
pub fn encode_to_string(event: &InstallEvent) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode an event from its stream payload
///
/// # Errors
///
/// Returns `DecodeError` if the payload is malformed, lacks a required field,
/// or carries an empty `event_id`.
pub fn decode(bytes: &[u8]) -> Result<InstallEvent, DecodeError> {
    let event: InstallEvent = serde_json::from_slice(bytes)?;
    if event.event_id.is_empty() {
        return Err(DecodeError::missing_field("event_id"));
    }
    Ok(event)
}
