//! Tally Protocol - install event model and stream payload codec
//!
//! This crate provides the types that cross the durable stream:
//! - `InstallEvent` - one install occurrence, plus its coded enums
//! - `encode` / `decode` - JSON payload codec (`Decode(Encode(e)) == e`)
//! - `Envelope` - fixed, versioned field layout of one stream entry
//!
//! # Flow
//!
//! ```text
//! InstallEvent --encode--> event_data --Envelope--> stream fields
//! stream fields --Envelope::from_fields--> event_data --decode--> InstallEvent
//! ```

mod codec;
mod envelope;
mod error;
mod event;

pub use codec::{decode, encode, encode_to_string};
pub use envelope::{ENVELOPE_VERSION, Envelope, decode_fields, fields};
pub use error::{DecodeError, EncodeError};
pub use event::{AppType, InstallEvent, InstallResult, InstallType};

#[cfg(test)]
mod envelope_test;
