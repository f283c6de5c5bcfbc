//! Stream entry envelope
//!
//! Every enqueued event is stored as one stream entry with a fixed set of
//! string fields. A few identity fields are copied out of the payload so that
//! the stream can be inspected without decoding `event_data`.
//!
//! | Field | Content |
//! |-------|---------|
//! | `v` | envelope version |
//! | `event_id` | caller idempotency key |
//! | `app_id` | application id |
//! | `device_id` | device id |
//! | `event_data` | encoded `InstallEvent` |
//! | `enqueued_at` | unix seconds at enqueue |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::codec;
use crate::error::{DecodeError, EncodeError};
use crate::event::InstallEvent;

/// Current envelope version written by producers
pub const ENVELOPE_VERSION: u32 = 1;

/// Stream field names
pub mod fields {
    pub const VERSION: &str = "v";
    pub const EVENT_ID: &str = "event_id";
    pub const APP_ID: &str = "app_id";
    pub const DEVICE_ID: &str = "device_id";
    pub const EVENT_DATA: &str = "event_data";
    pub const ENQUEUED_AT: &str = "enqueued_at";
}

/// Typed view of one stream entry's fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u32,
    pub event_id: String,
    pub app_id: String,
    pub device_id: String,
    /// Encoded event payload
    pub event_data: String,
    /// Unix seconds when the producer enqueued the entry
    pub enqueued_at: i64,
}

impl Envelope {
    /// Build the envelope for an event, encoding its payload
    ///
    /// # Errors
    ///
    /// Returns `EncodeError` if the event payload cannot be encoded.
    pub fn for_event(event: &InstallEvent, enqueued_at: DateTime<Utc>) -> Result<Self, EncodeError> {
        Ok(Self {
            version: ENVELOPE_VERSION,
            event_id: event.event_id.clone(),
            app_id: event.app_id.clone(),
            device_id: event.device_id.clone(),
            event_data: codec::encode_to_string(event)?,
            enqueued_at: enqueued_at.timestamp(),
        })
    }

    /// Flatten into stream fields
    pub fn into_fields(self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (fields::VERSION.to_string(), self.version.to_string()),
            (fields::EVENT_ID.to_string(), self.event_id),
            (fields::APP_ID.to_string(), self.app_id),
            (fields::DEVICE_ID.to_string(), self.device_id),
            (fields::EVENT_DATA.to_string(), self.event_data),
            (fields::ENQUEUED_AT.to_string(), self.enqueued_at.to_string()),
        ])
    }

    /// Read an envelope back from stream fields
    ///
    /// Entries without a version field predate versioning and are read as
    /// version 1.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if `event_id` or `event_data` is missing, a
    /// numeric field does not parse, or the version is newer than this build.
    pub fn from_fields(entry: &BTreeMap<String, String>) -> Result<Self, DecodeError> {
        let version = match entry.get(fields::VERSION) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| DecodeError::invalid_field(fields::VERSION, raw.as_str()))?,
            None => 1,
        };
        if version > ENVELOPE_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let event_id = entry
            .get(fields::EVENT_ID)
            .filter(|id| !id.is_empty())
            .ok_or(DecodeError::missing_field(fields::EVENT_ID))?;
        let event_data = entry
            .get(fields::EVENT_DATA)
            .ok_or(DecodeError::missing_field(fields::EVENT_DATA))?;

        let enqueued_at = match entry.get(fields::ENQUEUED_AT) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| DecodeError::invalid_field(fields::ENQUEUED_AT, raw.as_str()))?,
            None => 0,
        };

        Ok(Self {
            version,
            event_id: event_id.clone(),
            app_id: entry.get(fields::APP_ID).cloned().unwrap_or_default(),
            device_id: entry.get(fields::DEVICE_ID).cloned().unwrap_or_default(),
            event_data: event_data.clone(),
            enqueued_at,
        })
    }

    /// Decode the carried event
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the payload is malformed or its `event_id`
    /// disagrees with the envelope.
    pub fn decode_event(&self) -> Result<InstallEvent, DecodeError> {
        let event = codec::decode(self.event_data.as_bytes())?;
        if event.event_id != self.event_id {
            return Err(DecodeError::invalid_field(
                fields::EVENT_ID,
                format!("payload has '{}', envelope has '{}'", event.event_id, self.event_id),
            ));
        }
        Ok(event)
    }

    /// Enqueue time, if the stored value is a valid timestamp
    pub fn enqueued_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.enqueued_at, 0)
    }
}

/// Decode an event straight from stream fields
///
/// # Errors
///
/// Returns `DecodeError` if either the envelope or the payload is invalid.
pub fn decode_fields(entry: &BTreeMap<String, String>) -> Result<InstallEvent, DecodeError> {
    Envelope::from_fields(entry)?.decode_event()
}
