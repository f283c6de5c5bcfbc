//! Memory sink
//!
//! Keeps written batches in process. Used by the pipeline tests to observe
//! flush contents and timing, and by `tally worker --dry-run` to run the
//! consumer without a database. Can be switched into a failing mode, or told
//! to reject specific events, to exercise the not-persisted path.
//!
//! History is unbounded by default; [`MemorySink::with_history`] keeps only
//! the most recent batches and attempts for long-running use. The sink
//! metrics always count everything.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tally_protocol::InstallEvent;
use tokio::time::Instant;

use crate::common::{SinkError, SinkMetrics};
use crate::traits::SinkWriter;

/// Table name reported in errors
const MEMORY_TABLE: &str = "memory";

/// One successful `write_batch` call
#[derive(Debug, Clone)]
pub struct WrittenBatch {
    pub events: Vec<InstallEvent>,
    pub written_at: Instant,
}

impl WrittenBatch {
    /// Event ids in batch order
    pub fn event_ids(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.event_id.as_str()).collect()
    }
}

/// One non-empty `write_batch` call, failed or not
#[derive(Debug, Clone)]
struct Attempt {
    at: Instant,
    event_ids: Vec<String>,
}

/// Ring of the most recent `limit` items (unbounded when `None`)
#[derive(Debug)]
struct History<T> {
    items: VecDeque<T>,
    limit: Option<usize>,
}

impl<T> History<T> {
    fn new(limit: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            limit,
        }
    }

    fn push(&mut self, item: T) {
        if self.limit == Some(0) {
            return;
        }
        if let Some(limit) = self.limit {
            while self.items.len() >= limit {
                self.items.pop_front();
            }
        }
        self.items.push_back(item);
    }
}

/// In-process sink that records batches
pub struct MemorySink {
    batches: Mutex<History<WrittenBatch>>,
    attempts: Mutex<History<Attempt>>,
    failing: AtomicBool,
    rejected: Mutex<HashSet<String>>,
    metrics: Arc<SinkMetrics>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::build(None)
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that retains only the last `limit` batches and attempts
    pub fn with_history(limit: usize) -> Self {
        Self::build(Some(limit))
    }

    fn build(limit: Option<usize>) -> Self {
        Self {
            batches: Mutex::new(History::new(limit)),
            attempts: Mutex::new(History::new(limit)),
            failing: AtomicBool::new(false),
            rejected: Mutex::new(HashSet::new()),
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// A sink whose writes fail until [`set_failing(false)`](Self::set_failing)
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail every write whose batch contains `event_id`
    pub fn reject_event(&self, event_id: impl Into<String>) {
        self.rejected.lock().insert(event_id.into());
    }

    /// Retained successfully written batches, oldest first
    pub fn batches(&self) -> Vec<WrittenBatch> {
        self.batches.lock().items.iter().cloned().collect()
    }

    /// Retained successfully written events, in write order
    pub fn events(&self) -> Vec<InstallEvent> {
        self.batches
            .lock()
            .items
            .iter()
            .flat_map(|b| b.events.iter().cloned())
            .collect()
    }

    /// Times of retained non-empty write attempts, including failed ones
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().items.iter().map(|a| a.at).collect()
    }

    /// Number of retained write attempts whose batch contained `event_id`
    pub fn attempts_with(&self, event_id: &str) -> usize {
        self.attempts
            .lock()
            .items
            .iter()
            .filter(|a| a.event_ids.iter().any(|id| id == event_id))
            .count()
    }

    pub fn metrics(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }

    fn rejects(&self, events: &[InstallEvent]) -> bool {
        let rejected = self.rejected.lock();
        !rejected.is_empty() && events.iter().any(|e| rejected.contains(&e.event_id))
    }
}

#[async_trait]
impl SinkWriter for MemorySink {
    async fn write_batch(&self, events: &[InstallEvent]) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        self.attempts.lock().push(Attempt {
            at: now,
            event_ids: events.iter().map(|e| e.event_id.clone()).collect(),
        });

        if self.failing.load(Ordering::SeqCst) {
            self.metrics.record_failure(events.len());
            return Err(SinkError::send(
                MEMORY_TABLE,
                events.len(),
                "sink is in failing mode",
            ));
        }
        if self.rejects(events) {
            self.metrics.record_failure(events.len());
            return Err(SinkError::send(
                MEMORY_TABLE,
                events.len(),
                "batch contains a rejected event",
            ));
        }

        self.batches.lock().push(WrittenBatch {
            events: events.to_vec(),
            written_at: now,
        });
        self.metrics.record_success(events.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
