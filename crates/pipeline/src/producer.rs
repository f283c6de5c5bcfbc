//! Producer - validates events and appends them to the durable stream
//!
//! # Single vs batch
//!
//! | Call | Invalid event | Append failure | Returns |
//! |------|---------------|----------------|---------|
//! | `create` | `Validation` / `Encode` error | `Enqueue` error | entry id |
//! | `create_batch` | skipped and logged | per entry: logged; round trip: `Enqueue` | `()` |
//!
//! `create_batch` is best-effort per event: the caller learns the total vs.
//! succeeded counts only through logs and [`ProducerMetrics`]. Duplicate
//! event ids are not detected here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_protocol::{Envelope, InstallEvent};
use tally_stream::{DurableStream, EntryId, Fields};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::ProducerMetrics;

/// Enqueues install events onto the stream
///
/// Cheap to share: wrap in an `Arc` and call from any number of tasks.
pub struct Producer {
    stream: Arc<dyn DurableStream>,
    stream_key: String,
    max_len: usize,
    metrics: Arc<ProducerMetrics>,
}

impl Producer {
    pub fn new(stream: Arc<dyn DurableStream>, config: &PipelineConfig) -> Self {
        Self {
            stream,
            stream_key: config.stream_key.clone(),
            max_len: config.max_len,
            metrics: Arc::new(ProducerMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ProducerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Append one event and return its entry id
    ///
    /// # Errors
    ///
    /// - `Validation` if the event id is empty
    /// - `Encode` if the payload cannot be serialized
    /// - `Enqueue` if the stream rejects the append
    pub async fn create(&self, event: &InstallEvent) -> Result<EntryId> {
        if event.event_id.is_empty() {
            self.metrics.record_skipped();
            return Err(PipelineError::validation("event_id is required"));
        }

        let fields = entry_fields(event, Utc::now()).inspect_err(|_| {
            self.metrics.record_skipped();
        })?;

        match self
            .stream
            .append(&self.stream_key, &fields, self.max_len)
            .await
        {
            Ok(id) => {
                self.metrics.record_enqueued(1);
                debug!(
                    event_id = %event.event_id,
                    app_id = %event.app_id,
                    entry_id = %id,
                    "event enqueued"
                );
                Ok(id)
            }
            Err(e) => {
                self.metrics.record_enqueue_failures(1);
                error!(
                    event_id = %event.event_id,
                    app_id = %event.app_id,
                    stream = %self.stream_key,
                    error = %e,
                    "failed to enqueue event"
                );
                Err(PipelineError::Enqueue(e))
            }
        }
    }

    /// Append many events in one pipelined round trip
    ///
    /// An empty slice is a no-op. Events with an empty id or an encode
    /// failure are skipped; if none remain, fails with `Validation`. Per-entry
    /// append failures are logged and counted but do not fail the call.
    pub async fn create_batch(&self, events: &[InstallEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let enqueued_at = Utc::now();
        let mut entries = Vec::with_capacity(events.len());

        for event in events {
            if event.event_id.is_empty() {
                self.metrics.record_skipped();
                warn!(app_id = %event.app_id, "skipping event with empty event_id");
                continue;
            }
            match entry_fields(event, enqueued_at) {
                Ok(fields) => entries.push(fields),
                Err(e) => {
                    self.metrics.record_skipped();
                    warn!(event_id = %event.event_id, error = %e, "skipping unencodable event");
                }
            }
        }

        if entries.is_empty() {
            return Err(PipelineError::validation("no valid events"));
        }

        let valid = entries.len();
        let outcomes = match self
            .stream
            .append_pipeline(&self.stream_key, &entries, self.max_len)
            .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                self.metrics.record_enqueue_failures(valid as u64);
                error!(
                    count = valid,
                    stream = %self.stream_key,
                    error = %e,
                    "failed to execute batch pipeline"
                );
                return Err(PipelineError::Enqueue(e));
            }
        };

        let mut succeeded = 0usize;
        for outcome in &outcomes {
            match outcome {
                Ok(_) => succeeded += 1,
                Err(e) => warn!(stream = %self.stream_key, error = %e, "batch entry append failed"),
            }
        }
        let failed = outcomes.len() - succeeded;

        self.metrics.record_enqueued(succeeded as u64);
        if failed > 0 {
            self.metrics.record_enqueue_failures(failed as u64);
        }

        info!(
            total = events.len(),
            valid,
            success = succeeded,
            "install events batch queued"
        );
        Ok(())
    }
}

/// Stream fields for one event
fn entry_fields(event: &InstallEvent, enqueued_at: DateTime<Utc>) -> Result<Fields> {
    let envelope =
        Envelope::for_event(event, enqueued_at).map_err(|source| PipelineError::Encode {
            event_id: event.event_id.clone(),
            source,
        })?;
    Ok(envelope.into_fields())
}

#[cfg(test)]
#[path = "producer_test.rs"]
mod producer_test;
