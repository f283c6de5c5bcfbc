//! Test doubles shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tally_protocol::{AppType, InstallEvent};
use tally_stream::{
    DurableStream, EntryId, Fields, GroupCreation, GroupStart, MemoryStream, Result,
    StreamEntry, StreamError,
};

pub(crate) fn event(id: &str) -> InstallEvent {
    let time = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    InstallEvent::new(id, "app-1", AppType::Android, "device-1", time)
}

/// `MemoryStream` that records calls and can be told to fail
#[derive(Default)]
pub(crate) struct RecordingStream {
    pub(crate) inner: MemoryStream,
    acks: Mutex<Vec<EntryId>>,
    reads: AtomicUsize,
    reclaims: AtomicUsize,
    fail_reads: AtomicBool,
    fail_appends: AtomicBool,
    fail_groups: AtomicBool,
    fail_odd_pipeline_entries: AtomicBool,
}

impl RecordingStream {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn acks(&self) -> Vec<EntryId> {
        self.acks.lock().clone()
    }

    pub(crate) fn ack_count(&self) -> usize {
        self.acks.lock().len()
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn reclaims(&self) -> usize {
        self.reclaims.load(Ordering::SeqCst)
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_groups(&self, fail: bool) {
        self.fail_groups.store(fail, Ordering::SeqCst);
    }

    /// Pipelined appends reject every entry at an odd index
    pub(crate) fn set_fail_odd_pipeline_entries(&self, fail: bool) {
        self.fail_odd_pipeline_entries.store(fail, Ordering::SeqCst);
    }

    /// Append raw fields, bypassing the producer
    pub(crate) async fn push_raw(&self, key: &str, fields: Fields) -> EntryId {
        self.inner.append(key, &fields, 0).await.unwrap()
    }
}

#[async_trait]
impl DurableStream for RecordingStream {
    async fn append(&self, key: &str, fields: &Fields, max_len: usize) -> Result<EntryId> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StreamError::unavailable("append refused"));
        }
        self.inner.append(key, fields, max_len).await
    }

    async fn append_pipeline(
        &self,
        key: &str,
        entries: &[Fields],
        max_len: usize,
    ) -> Result<Vec<Result<EntryId>>> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StreamError::unavailable("pipeline refused"));
        }
        if !self.fail_odd_pipeline_entries.load(Ordering::SeqCst) {
            return self.inner.append_pipeline(key, entries, max_len).await;
        }

        let mut outcomes = Vec::with_capacity(entries.len());
        for (idx, fields) in entries.iter().enumerate() {
            if idx % 2 == 1 {
                outcomes.push(Err(StreamError::unavailable("entry refused")));
            } else {
                outcomes.push(self.inner.append(key, fields, max_len).await);
            }
        }
        Ok(outcomes)
    }

    async fn ensure_group(
        &self,
        key: &str,
        group: &str,
        start: GroupStart,
    ) -> Result<GroupCreation> {
        if self.fail_groups.load(Ordering::SeqCst) {
            return Err(StreamError::unavailable("group refused"));
        }
        self.inner.ensure_group(key, group, start).await
    }

    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StreamError::unavailable("read refused"));
        }
        self.inner
            .read_group(key, group, consumer, count, block)
            .await
    }

    async fn ack(&self, key: &str, group: &str, id: &EntryId) -> Result<()> {
        self.acks.lock().push(id.clone());
        self.inner.ack(key, group, id).await
    }

    async fn pending_count(&self, key: &str, group: &str) -> Result<u64> {
        self.inner.pending_count(key, group).await
    }

    async fn length(&self, key: &str) -> Result<u64> {
        self.inner.length(key).await
    }

    async fn claim_idle(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        self.reclaims.fetch_add(1, Ordering::SeqCst);
        self.inner
            .claim_idle(key, group, consumer, min_idle, count)
            .await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
