//! In-memory stream backend
//!
//! A process-local log with the consumer-group semantics of Redis Streams:
//! `<millis>-<seq>` ids, approximate length capping, a per-group delivery
//! cursor and pending-entries list, blocking group reads, and idle-entry
//! reclamation. Used by tests and for running the pipeline without Redis.
//!
//! # Example
//!
//! ```ignore
//! use tally_stream::{DurableStream, GroupStart, MemoryStream};
//!
//! let stream = MemoryStream::new();
//! stream.ensure_group("installs", "workers", GroupStart::Beginning).await?;
//! let id = stream.append("installs", &fields, 100_000).await?;
//! let claimed = stream.read_group("installs", "workers", "w-1", 10, Duration::from_secs(1)).await?;
//! stream.ack("installs", "workers", &claimed[0].id).await?;
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{Result, StreamError};
use crate::traits::DurableStream;
use crate::types::{EntryId, Fields, GroupCreation, GroupStart, StreamEntry};

/// Numeric form of an entry id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Seq {
    ms: u64,
    seq: u64,
}

impl Seq {
    fn parse(id: &EntryId) -> Result<Self> {
        let invalid = || StreamError::InvalidId(id.to_string());
        let (ms, seq) = id.as_str().split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            ms: ms.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }

    /// Next id after `self`, using the wall clock when it has moved forward
    fn next(self, now_ms: u64) -> Self {
        if now_ms > self.ms {
            Self { ms: now_ms, seq: 0 }
        } else {
            Self {
                ms: self.ms,
                seq: self.seq + 1,
            }
        }
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

struct StoredEntry {
    seq: Seq,
    fields: Fields,
}

impl StoredEntry {
    fn to_entry(&self, deliveries: u32) -> StreamEntry {
        StreamEntry {
            id: EntryId::new(self.seq.to_string()),
            fields: self.fields.clone(),
            deliveries,
        }
    }
}

struct PendingEntry {
    consumer: String,
    delivered_at: Instant,
    deliveries: u32,
}

#[derive(Default)]
struct GroupState {
    last_delivered: Seq,
    pending: BTreeMap<Seq, PendingEntry>,
}

#[derive(Default)]
struct StreamState {
    entries: VecDeque<StoredEntry>,
    last_id: Seq,
    groups: HashMap<String, GroupState>,
}

impl StreamState {
    fn push(&mut self, fields: Fields, max_len: usize) -> EntryId {
        let seq = self.last_id.next(wall_clock_ms());
        self.last_id = seq;
        self.entries.push_back(StoredEntry { seq, fields });

        if max_len > 0 {
            while self.entries.len() > max_len {
                self.entries.pop_front();
            }
        }

        EntryId::new(seq.to_string())
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Pending entry as seen by [`MemoryStream::pending`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInfo {
    pub id: EntryId,
    pub consumer: String,
    pub deliveries: u32,
}

/// In-process durable stream
#[derive(Default)]
pub struct MemoryStream {
    streams: Mutex<HashMap<String, StreamState>>,
    appended: Notify,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// All retained entries of a stream, oldest first
    pub fn entries(&self, key: &str) -> Vec<StreamEntry> {
        self.streams
            .lock()
            .get(key)
            .map(|state| state.entries.iter().map(|e| e.to_entry(0)).collect())
            .unwrap_or_default()
    }

    /// Pending-entries list of a group, oldest first
    pub fn pending(&self, key: &str, group: &str) -> Vec<PendingInfo> {
        let streams = self.streams.lock();
        let Some(group_state) = streams.get(key).and_then(|s| s.groups.get(group)) else {
            return Vec::new();
        };
        group_state
            .pending
            .iter()
            .map(|(seq, p)| PendingInfo {
                id: EntryId::new(seq.to_string()),
                consumer: p.consumer.clone(),
                deliveries: p.deliveries,
            })
            .collect()
    }

    /// Claim new entries without waiting; empty if nothing is available
    fn try_deliver(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(key)
            .ok_or_else(|| StreamError::no_group(key, group))?;

        let StreamState {
            entries, groups, ..
        } = state;
        let group_state = groups
            .get_mut(group)
            .ok_or_else(|| StreamError::no_group(key, group))?;

        let now = Instant::now();
        let start = entries.partition_point(|e| e.seq <= group_state.last_delivered);
        let mut delivered = Vec::new();

        for stored in entries.iter().skip(start).take(count) {
            group_state.last_delivered = stored.seq;
            group_state.pending.insert(
                stored.seq,
                PendingEntry {
                    consumer: consumer.to_string(),
                    delivered_at: now,
                    deliveries: 1,
                },
            );
            delivered.push(stored.to_entry(1));
        }

        Ok(delivered)
    }
}

#[async_trait]
impl DurableStream for MemoryStream {
    async fn append(&self, key: &str, fields: &Fields, max_len: usize) -> Result<EntryId> {
        let id = {
            let mut streams = self.streams.lock();
            streams
                .entry(key.to_string())
                .or_default()
                .push(fields.clone(), max_len)
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn append_pipeline(
        &self,
        key: &str,
        entries: &[Fields],
        max_len: usize,
    ) -> Result<Vec<Result<EntryId>>> {
        let ids = {
            let mut streams = self.streams.lock();
            let state = streams.entry(key.to_string()).or_default();
            entries
                .iter()
                .map(|fields| Ok(state.push(fields.clone(), max_len)))
                .collect()
        };
        self.appended.notify_waiters();
        Ok(ids)
    }

    async fn ensure_group(
        &self,
        key: &str,
        group: &str,
        start: GroupStart,
    ) -> Result<GroupCreation> {
        let mut streams = self.streams.lock();
        let state = streams.entry(key.to_string()).or_default();
        if state.groups.contains_key(group) {
            return Ok(GroupCreation::AlreadyExists);
        }

        let last_delivered = match start {
            GroupStart::Beginning => Seq::default(),
            GroupStart::Latest => state.last_id,
        };
        state.groups.insert(
            group.to_string(),
            GroupState {
                last_delivered,
                pending: BTreeMap::new(),
            },
        );
        Ok(GroupCreation::Created)
    }

    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let deadline = Instant::now() + block;

        loop {
            // Register before checking so an append in between still wakes us
            let notified = self.appended.notified();

            let delivered = self.try_deliver(key, group, consumer, count)?;
            if !delivered.is_empty() || block.is_zero() {
                return Ok(delivered);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, key: &str, group: &str, id: &EntryId) -> Result<()> {
        let seq = Seq::parse(id)?;
        let mut streams = self.streams.lock();
        let group_state = streams
            .get_mut(key)
            .and_then(|s| s.groups.get_mut(group))
            .ok_or_else(|| StreamError::no_group(key, group))?;
        group_state.pending.remove(&seq);
        Ok(())
    }

    async fn pending_count(&self, key: &str, group: &str) -> Result<u64> {
        let streams = self.streams.lock();
        streams
            .get(key)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.len() as u64)
            .ok_or_else(|| StreamError::no_group(key, group))
    }

    async fn length(&self, key: &str) -> Result<u64> {
        Ok(self
            .streams
            .lock()
            .get(key)
            .map_or(0, |s| s.entries.len() as u64))
    }

    async fn claim_idle(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(key)
            .ok_or_else(|| StreamError::no_group(key, group))?;
        let StreamState {
            entries, groups, ..
        } = state;
        let group_state = groups
            .get_mut(group)
            .ok_or_else(|| StreamError::no_group(key, group))?;

        let now = Instant::now();
        let mut claimed = Vec::new();
        let mut trimmed = Vec::new();

        for (seq, pending) in group_state.pending.iter_mut() {
            if claimed.len() >= count {
                break;
            }
            if now.duration_since(pending.delivered_at) < min_idle {
                continue;
            }

            let found = entries
                .binary_search_by_key(seq, |e| e.seq)
                .ok()
                .map(|idx| &entries[idx]);
            match found {
                Some(stored) => {
                    pending.consumer = consumer.to_string();
                    pending.delivered_at = now;
                    pending.deliveries += 1;
                    claimed.push(stored.to_entry(pending.deliveries));
                }
                None => trimmed.push(*seq),
            }
        }

        for seq in trimmed {
            group_state.pending.remove(&seq);
        }

        Ok(claimed)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
