//! Tally - Sinks
//!
//! Writers that persist batches of install events into an analytical store.
//!
//! # Contract
//!
//! A sink receives the full ordered batch in one `write_batch` call. The call
//! is all-or-nothing from the caller's point of view: an `Err` means none of
//! the batch may be assumed persisted, even if the store physically kept
//! some rows. An empty batch is a successful no-op.
//!
//! ```text
//! [Consumer Loop] --&[InstallEvent]--> [SinkWriter] --> [Destination]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose |
//! |------|---------|
//! | `clickhouse` | Columnar analytics table (`install_events`) |
//! | `memory` | Keeps batches in memory (tests, dry runs) |

/// ClickHouse sink - columnar analytics database
pub mod clickhouse;

/// Memory sink - records batches in process
pub mod memory;

/// Common types shared by all sinks (errors, metrics)
mod common;

/// The sink writer trait
mod traits;

pub use common::{MetricsSnapshot, SinkError, SinkMetrics};
pub use traits::SinkWriter;

pub use clickhouse::{ClickHouseConfig, ClickHouseWriter, InstallEventRow};
pub use memory::{MemorySink, WrittenBatch};
