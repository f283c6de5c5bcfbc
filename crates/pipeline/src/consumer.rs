//! Consumer loop - claim, accumulate, flush, acknowledge
//!
//! # State machine
//!
//! ```text
//!  Idle ──ensure group──► GroupEnsured ──spawn──► Running ──cancel──► Draining ──► Stopped
//! ```
//!
//! The worker drives `Idle → GroupEnsured → Running`; the loop itself moves
//! to `Draining` when it observes cancellation and to `Stopped` after the
//! final flush.
//!
//! # One iteration, in priority order
//!
//! 1. Cancelled: flush any partial batch, exit.
//! 2. Flush timer elapsed: flush a non-empty batch, reset the timer.
//! 3. Reclaim due: take over entries idle in the group, accept them.
//! 4. Otherwise: group read of up to `read_count` new entries, blocking up to
//!    `read_block` (less when a non-empty batch is due sooner), accept them.
//!
//! Accepting an entry decodes its envelope. A decode failure is acked at once
//! and dropped. A decoded event joins the batch; reaching `batch_size`
//! flushes immediately and resets the timer.
//!
//! # Reclaimed entries
//!
//! Reclaimed entries never share a batch with fresh ones: a non-empty batch
//! is flushed before they are accepted, and they are flushed on their own
//! straight after. An entry delivered more than `max_deliveries` times is
//! acked and dropped without reaching the sink. When a reclaimed batch
//! fails, its events are retried one at a time so only the rejected ones
//! stay pending.
//!
//! # Acknowledgment
//!
//! A flush hands the whole batch to the sink. On success every entry id in
//! it is acked; on failure none is, and the batch is discarded. Unacked
//! entries stay in the group's pending list until reclaimed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tally_protocol::{InstallEvent, decode_fields};
use tally_sinks::SinkWriter;
use tally_stream::{DurableStream, EntryId, StreamEntry};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::{Batch, FlushTimer};
use crate::config::{PipelineConfig, ReclaimConfig};
use crate::metrics::ConsumerMetrics;

/// Shortest read block used while a batch is waiting on the timer
const MIN_READ_BLOCK: Duration = Duration::from_millis(1);

/// Lifecycle state of a consumer loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    #[default]
    Idle,
    GroupEnsured,
    Running,
    Draining,
    Stopped,
}

impl ConsumerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GroupEnsured => "group_ensured",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a flush happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushReason {
    Size,
    Timer,
    Shutdown,
    /// Fresh batch cleared ahead of reclaimed entries
    BeforeReclaim,
    /// Batch of reclaimed entries
    Reclaim,
}

impl FlushReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Timer => "timer",
            Self::Shutdown => "shutdown",
            Self::BeforeReclaim => "before_reclaim",
            Self::Reclaim => "reclaim",
        }
    }
}

/// The read/accumulate/flush loop
///
/// Owns its batch; run it on its own task with [`ConsumerLoop::run`].
pub(crate) struct ConsumerLoop {
    stream: Arc<dyn DurableStream>,
    sink: Arc<dyn SinkWriter>,
    config: PipelineConfig,
    metrics: Arc<ConsumerMetrics>,
    state: Arc<watch::Sender<ConsumerState>>,
    batch: Batch,
    timer: FlushTimer,
    next_reclaim: Option<Instant>,
}

impl ConsumerLoop {
    pub(crate) fn new(
        stream: Arc<dyn DurableStream>,
        sink: Arc<dyn SinkWriter>,
        config: PipelineConfig,
        metrics: Arc<ConsumerMetrics>,
        state: Arc<watch::Sender<ConsumerState>>,
    ) -> Self {
        let batch = Batch::new(config.batch_size);
        let timer = FlushTimer::new(config.flush_interval);
        // First reclaim runs right away to pick up a previous run's leftovers
        let next_reclaim = config.reclaim.as_ref().map(|_| Instant::now());
        Self {
            stream,
            sink,
            config,
            metrics,
            state,
            batch,
            timer,
            next_reclaim,
        }
    }

    /// Run until `cancel` fires, then drain and exit
    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        info!(
            stream = %self.config.stream_key,
            group = %self.config.group,
            consumer = %self.config.consumer,
            sink = self.sink.name(),
            batch_size = self.config.batch_size,
            "consumer loop started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if self.timer.is_elapsed() {
                if !self.batch.is_empty() {
                    self.flush(FlushReason::Timer).await;
                }
                self.timer.reset();
                continue;
            }

            if let Some(reclaim) = self.reclaim_due() {
                let entries = self.reclaim(&reclaim).await;
                self.accept_reclaimed(entries, reclaim.max_deliveries).await;
                continue;
            }

            match self.claim().await {
                Some(entries) => self.accept(entries).await,
                None => self.backoff(&cancel).await,
            }
        }

        self.state.send_replace(ConsumerState::Draining);
        if !self.batch.is_empty() {
            self.flush(FlushReason::Shutdown).await;
        }
        self.state.send_replace(ConsumerState::Stopped);

        info!(
            stream = %self.config.stream_key,
            consumer = %self.config.consumer,
            "consumer loop stopped"
        );
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Group read; `None` on error
    async fn claim(&self) -> Option<Vec<StreamEntry>> {
        let block = self.read_block();
        match self
            .stream
            .read_group(
                &self.config.stream_key,
                &self.config.group,
                &self.config.consumer,
                self.config.read_count,
                block,
            )
            .await
        {
            Ok(entries) => {
                if !entries.is_empty() {
                    self.metrics.record_claimed(entries.len() as u64);
                    debug!(count = entries.len(), "claimed entries");
                }
                Some(entries)
            }
            Err(e) => {
                self.metrics.record_read_error();
                error!(
                    stream = %self.config.stream_key,
                    group = %self.config.group,
                    error = %e,
                    "failed to read from stream"
                );
                None
            }
        }
    }

    /// Read block, shortened so a waiting batch is flushed on time
    fn read_block(&self) -> Duration {
        if self.batch.is_empty() {
            return self.config.read_block;
        }
        self.config
            .read_block
            .min(self.timer.remaining())
            .max(MIN_READ_BLOCK)
    }

    /// Pause after a failed read, cut short by cancellation
    async fn backoff(&self, cancel: &CancellationToken) {
        if self.config.error_backoff.is_zero() {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.error_backoff) => {}
        }
    }

    fn reclaim_due(&self) -> Option<ReclaimConfig> {
        let due = self.next_reclaim.is_some_and(|at| Instant::now() >= at);
        if !due {
            return None;
        }
        self.config.reclaim.clone()
    }

    /// Take over entries left idle by other (or earlier) consumers
    async fn reclaim(&mut self, reclaim: &ReclaimConfig) -> Vec<StreamEntry> {
        self.next_reclaim = Some(Instant::now() + reclaim.interval);

        match self
            .stream
            .claim_idle(
                &self.config.stream_key,
                &self.config.group,
                &self.config.consumer,
                reclaim.min_idle,
                reclaim.count,
            )
            .await
        {
            Ok(entries) => {
                if !entries.is_empty() {
                    self.metrics.record_reclaimed(entries.len() as u64);
                    info!(
                        count = entries.len(),
                        min_idle = ?reclaim.min_idle,
                        "reclaimed idle entries"
                    );
                }
                entries
            }
            Err(e) => {
                self.metrics.record_read_error();
                warn!(
                    stream = %self.config.stream_key,
                    group = %self.config.group,
                    error = %e,
                    "failed to reclaim idle entries"
                );
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Accumulating
    // =========================================================================

    async fn accept(&mut self, entries: Vec<StreamEntry>) {
        for entry in entries {
            if self.push(entry).await {
                self.flush(FlushReason::Size).await;
                self.timer.reset();
            }
        }
    }

    /// Accept reclaimed entries as a batch of their own
    async fn accept_reclaimed(&mut self, entries: Vec<StreamEntry>, max_deliveries: u32) {
        let entries: Vec<StreamEntry> = entries
            .into_iter()
            .filter(|entry| !self.batch.contains(&entry.id))
            .collect();
        if entries.is_empty() {
            return;
        }

        if !self.batch.is_empty() {
            self.flush(FlushReason::BeforeReclaim).await;
        }

        for entry in entries {
            if entry.deliveries > max_deliveries {
                self.metrics.record_dropped();
                error!(
                    entry_id = %entry.id,
                    deliveries = entry.deliveries,
                    max_deliveries,
                    "entry exceeded delivery limit, dropping"
                );
                self.ack(&entry.id).await;
                continue;
            }
            if self.push(entry).await {
                self.flush(FlushReason::Reclaim).await;
            }
        }

        if !self.batch.is_empty() {
            self.flush(FlushReason::Reclaim).await;
        }
    }

    /// Decode one entry into the batch; true once the batch is full
    async fn push(&mut self, entry: StreamEntry) -> bool {
        match decode_fields(&entry.fields) {
            Ok(event) => self.batch.push(event, entry.id),
            Err(e) => {
                self.metrics.record_decode_error();
                error!(entry_id = %entry.id, error = %e, "failed to decode entry, dropping");
                self.ack(&entry.id).await;
                false
            }
        }
    }

    // =========================================================================
    // Flushing
    // =========================================================================

    async fn flush(&mut self, reason: FlushReason) {
        let count = self.batch.len();
        if count == 0 {
            return;
        }
        let (events, ids) = self.batch.take();
        info!(count, reason = reason.as_str(), "flushing batch");

        match self.sink.write_batch(&events).await {
            Ok(()) => {
                self.metrics.record_flushed(count as u64);
                let mut acked = 0usize;
                for id in &ids {
                    if self.ack(id).await {
                        acked += 1;
                    }
                }
                info!(count, acked, "batch persisted");
            }
            Err(e) => {
                self.metrics.record_flush_failure();
                error!(
                    count,
                    sink = self.sink.name(),
                    error = %e,
                    "failed to write batch, entries left pending"
                );
                if reason == FlushReason::Reclaim && count > 1 {
                    self.flush_each(&events, &ids).await;
                }
            }
        }
    }

    /// Write events one at a time, acking each one the sink accepts
    async fn flush_each(&self, events: &[InstallEvent], ids: &[EntryId]) {
        let mut written = 0usize;
        for (event, id) in events.iter().zip(ids) {
            match self.sink.write_batch(std::slice::from_ref(event)).await {
                Ok(()) => {
                    self.metrics.record_flushed(1);
                    self.ack(id).await;
                    written += 1;
                }
                Err(e) => {
                    self.metrics.record_flush_failure();
                    warn!(
                        entry_id = %id,
                        event_id = %event.event_id,
                        error = %e,
                        "entry rejected by sink, left pending"
                    );
                }
            }
        }
        info!(count = events.len(), written, "retried reclaimed batch entry by entry");
    }

    /// Acknowledge one entry; false if the ack failed
    async fn ack(&self, id: &EntryId) -> bool {
        match self
            .stream
            .ack(&self.config.stream_key, &self.config.group, id)
            .await
        {
            Ok(()) => {
                self.metrics.record_ack();
                true
            }
            Err(e) => {
                self.metrics.record_ack_failure();
                error!(entry_id = %id, error = %e, "failed to ack entry");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "consumer_test.rs"]
mod consumer_test;
