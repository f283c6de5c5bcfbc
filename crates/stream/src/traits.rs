//! Durable stream trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EntryId, Fields, GroupCreation, GroupStart, StreamEntry};

/// Append-only, capped, ordered log with consumer-group reads
///
/// Implementations must be safe to call concurrently: producers append from
/// many tasks while a consumer loop reads and acknowledges.
#[async_trait]
pub trait DurableStream: Send + Sync {
    /// Append one entry, trimming the stream to roughly `max_len` entries
    ///
    /// Trimming is approximate and never blocks the append. A `max_len` of
    /// zero disables trimming.
    async fn append(&self, key: &str, fields: &Fields, max_len: usize) -> Result<EntryId>;

    /// Append many entries in a single round trip
    ///
    /// The outer error means the round trip itself failed. Otherwise the
    /// result holds one outcome per input, in input order.
    async fn append_pipeline(
        &self,
        key: &str,
        entries: &[Fields],
        max_len: usize,
    ) -> Result<Vec<Result<EntryId>>>;

    /// Create the consumer group (and the stream) if absent
    async fn ensure_group(&self, key: &str, group: &str, start: GroupStart)
    -> Result<GroupCreation>;

    /// Claim up to `count` never-delivered entries for `consumer`
    ///
    /// Waits up to `block` for new entries; a zero `block` does not wait.
    /// Timeout is an empty result, not an error. Claimed entries stay in the
    /// group's pending list until acknowledged.
    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>>;

    /// Remove one entry from the group's pending list
    async fn ack(&self, key: &str, group: &str, id: &EntryId) -> Result<()>;

    /// Number of delivered-but-unacknowledged entries in the group
    async fn pending_count(&self, key: &str, group: &str) -> Result<u64>;

    /// Number of entries retained in the stream
    async fn length(&self, key: &str) -> Result<u64>;

    /// Take over entries pending longer than `min_idle`, from any consumer
    ///
    /// Returns up to `count` entries now owned by `consumer`, each carrying
    /// its delivery count including this claim. Pending entries whose
    /// payload was already trimmed are dropped from the pending list.
    async fn claim_idle(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
