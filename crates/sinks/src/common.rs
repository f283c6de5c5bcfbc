//! Common types shared by all sinks
//!
//! The error type distinguishes the three stages of a bulk insert so the
//! caller's logs say where a batch failed. Metrics are lock-free counters
//! with a point-in-time snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Errors
// =============================================================================

/// Failure to persist a batch
///
/// Whatever the variant, the batch is considered not persisted.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The bulk insert could not be opened
    #[error("failed to prepare insert into '{table}': {message}")]
    Prepare { table: String, message: String },

    /// A row could not be added to the open insert
    #[error("failed to append event '{event_id}' to '{table}': {message}")]
    Append {
        table: String,
        event_id: String,
        message: String,
    },

    /// The populated insert could not be transmitted or committed
    #[error("failed to send {rows} rows to '{table}': {message}")]
    Send {
        table: String,
        rows: usize,
        message: String,
    },
}

impl SinkError {
    pub fn prepare(table: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Prepare {
            table: table.into(),
            message: err.to_string(),
        }
    }

    pub fn append(
        table: impl Into<String>,
        event_id: impl Into<String>,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::Append {
            table: table.into(),
            event_id: event_id.into(),
            message: err.to_string(),
        }
    }

    pub fn send(table: impl Into<String>, rows: usize, err: impl std::fmt::Display) -> Self {
        Self::Send {
            table: table.into(),
            rows,
            message: err.to_string(),
        }
    }

    /// Stage name for structured logging
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Prepare { .. } => "prepare",
            Self::Append { .. } => "append",
            Self::Send { .. } => "send",
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Counters maintained by every sink writer
#[derive(Debug, Default)]
pub struct SinkMetrics {
    batches_written: AtomicU64,
    rows_written: AtomicU64,
    batches_failed: AtomicU64,
    rows_failed: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch that was fully persisted
    #[inline]
    pub fn record_success(&self, rows: usize) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Record a batch that failed at any stage
    #[inline]
    pub fn record_failure(&self, rows: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.rows_failed.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_written: self.batches_written.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            rows_failed: self.rows_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_written: u64,
    pub rows_written: u64,
    pub batches_failed: u64,
    pub rows_failed: u64,
}
