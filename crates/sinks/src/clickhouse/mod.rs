//! ClickHouse Sink - Install Events Table
//!
//! Bulk-inserts install event batches into a single ClickHouse table.
//!
//! # Write path
//!
//! ```text
//! write_batch(&[InstallEvent])
//!   ├─ client.insert("install_events")   -> SinkError::Prepare
//!   ├─ insert.write(row) for each event  -> SinkError::Append
//!   └─ insert.end()                      -> SinkError::Send
//! ```
//!
//! One call is one INSERT. The writer does not retry; a failed batch stays
//! pending in the stream and is retried through reclamation upstream.

mod config;
mod row;
mod writer;

pub use config::{ClickHouseConfig, DEFAULT_DATABASE, DEFAULT_TABLE, DEFAULT_URL};
pub use row::InstallEventRow;
pub use writer::ClickHouseWriter;
