//! Redis Streams backend
//!
//! Maps the [`DurableStream`] operations onto Redis stream commands:
//!
//! | Operation | Command |
//! |-----------|---------|
//! | `append` | `XADD key MAXLEN ~ n * field value ...` |
//! | `append_pipeline` | pipelined `XADD`s, one round trip |
//! | `ensure_group` | `XGROUP CREATE key group start MKSTREAM` |
//! | `read_group` | `XREADGROUP GROUP g c COUNT n BLOCK ms STREAMS key >` |
//! | `ack` | `XACK` |
//! | `pending_count` | `XPENDING key group` (summary form) |
//! | `length` | `XLEN` |
//! | `claim_idle` | `XAUTOCLAIM key group consumer min-idle 0-0 COUNT n`, then `XPENDING key group id id 1` per entry |
//!
//! The multiplexed connection is shared by clones, so a blocking
//! `XREADGROUP` stalls other commands on the same connection. Give the
//! consumer its own `RedisStream`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamPendingReply;
use redis::{Cmd, RedisError, Value};

use crate::error::{Result, StreamError};
use crate::traits::DurableStream;
use crate::types::{EntryId, Fields, GroupCreation, GroupStart, StreamEntry};

/// Redis server error code for an existing consumer group
const BUSYGROUP: &str = "BUSYGROUP";

/// Delivery count assumed for a claimed entry whose pending row is gone
const MIN_CLAIMED_DELIVERIES: u32 = 2;

/// Durable stream backed by Redis Streams
#[derive(Clone)]
pub struct RedisStream {
    conn: MultiplexedConnection,
}

impl RedisStream {
    /// Connect to Redis at `url` (e.g., "redis://127.0.0.1:6379/0")
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Redis` if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::debug!("connected to redis");
        Ok(Self { conn })
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn xadd(key: &str, fields: &Fields, max_len: usize) -> Cmd {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(key);
        if max_len > 0 {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }
        cmd.arg("*");
        for (name, value) in fields {
            cmd.arg(name).arg(value);
        }
        cmd
    }

    fn xgroup_create(key: &str, group: &str, start: GroupStart) -> Cmd {
        let mut cmd = redis::cmd("XGROUP");
        cmd.arg("CREATE")
            .arg(key)
            .arg(group)
            .arg(start.as_str())
            .arg("MKSTREAM");
        cmd
    }

    fn xreadgroup(key: &str, group: &str, consumer: &str, count: usize, block: Duration) -> Cmd {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer).arg("COUNT").arg(count);
        // BLOCK 0 means "forever" to Redis; a zero block here means "don't wait"
        if !block.is_zero() {
            cmd.arg("BLOCK").arg(block.as_millis().max(1) as u64);
        }
        cmd.arg("STREAMS").arg(key).arg(">");
        cmd
    }

    fn xautoclaim(
        key: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Cmd {
        let mut cmd = redis::cmd("XAUTOCLAIM");
        cmd.arg(key)
            .arg(group)
            .arg(consumer)
            .arg(min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count);
        cmd
    }

    /// Extended `XPENDING` for exactly one entry
    fn xpending_entry(key: &str, group: &str, id: &EntryId) -> Cmd {
        let mut cmd = redis::cmd("XPENDING");
        cmd.arg(key)
            .arg(group)
            .arg(id.as_str())
            .arg(id.as_str())
            .arg(1);
        cmd
    }
}

// =============================================================================
// Reply parsing
// =============================================================================

fn unexpected(what: &str, value: &Value) -> StreamError {
    StreamError::UnexpectedReply(format!("{what}: {value:?}"))
}

fn is_busygroup(err: &RedisError) -> bool {
    err.code() == Some(BUSYGROUP) || err.to_string().starts_with(BUSYGROUP)
}

fn group_creation(result: redis::RedisResult<()>) -> Result<GroupCreation> {
    match result {
        Ok(()) => Ok(GroupCreation::Created),
        Err(e) if is_busygroup(&e) => Ok(GroupCreation::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// Parse a list of `[id, [field, value, ...]]` items
///
/// Nil items and items with nil or empty fields are entries already trimmed
/// from the stream; they are skipped.
fn parse_entries(items: &Value, deliveries: u32) -> Result<Vec<StreamEntry>> {
    let Value::Array(items) = items else {
        return Err(unexpected("entry list", items));
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let parts = match item {
            Value::Nil => continue,
            Value::Array(parts) if parts.len() == 2 => parts,
            other => return Err(unexpected("stream entry", other)),
        };
        let id: String = redis::from_redis_value(&parts[0])?;
        let fields: Option<Fields> = redis::from_redis_value(&parts[1])?;
        match fields {
            Some(fields) if !fields.is_empty() => entries.push(StreamEntry {
                id: EntryId::new(id),
                fields,
                deliveries,
            }),
            _ => tracing::debug!(entry_id = %id, "entry no longer in stream"),
        }
    }
    Ok(entries)
}

/// Parse an `XREADGROUP` reply: nil on timeout, else entries per stream key
fn parse_read_reply(reply: &Value) -> Result<Vec<StreamEntry>> {
    let streams: Vec<&Value> = match reply {
        Value::Nil => return Ok(Vec::new()),
        Value::Array(streams) => streams
            .iter()
            .map(|stream| match stream {
                Value::Array(pair) if pair.len() == 2 => Ok(&pair[1]),
                other => Err(unexpected("XREADGROUP stream", other)),
            })
            .collect::<Result<_>>()?,
        Value::Map(streams) => streams.iter().map(|(_, items)| items).collect(),
        other => return Err(unexpected("XREADGROUP", other)),
    };

    let mut entries = Vec::new();
    for items in streams {
        entries.extend(parse_entries(items, 1)?);
    }
    Ok(entries)
}

/// Parse an `XAUTOCLAIM` reply
///
/// `[next-cursor, [[id, fields], ...]]`, plus a list of deleted ids on 7.0+
/// which the server has already removed from the pending list.
fn parse_autoclaim(reply: &Value) -> Result<Vec<StreamEntry>> {
    let Value::Array(parts) = reply else {
        return Err(unexpected("XAUTOCLAIM", reply));
    };
    let claimed = parts.get(1).ok_or_else(|| {
        StreamError::UnexpectedReply(format!("XAUTOCLAIM reply has {} elements", parts.len()))
    })?;
    parse_entries(claimed, MIN_CLAIMED_DELIVERIES)
}

/// Delivery count from a one-entry extended `XPENDING` reply
///
/// Rows are `[id, consumer, idle-ms, deliveries]`; an empty reply means the
/// entry was acknowledged in the meantime.
fn parse_pending_deliveries(reply: &Value) -> Result<Option<u32>> {
    let Value::Array(rows) = reply else {
        return Err(unexpected("XPENDING", reply));
    };
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    let (_id, _consumer, _idle, deliveries): (String, String, u64, u32) =
        redis::from_redis_value(row)?;
    Ok(Some(deliveries))
}

/// Copy delivery counts from pipelined `XPENDING` replies onto their entries
fn apply_deliveries(entries: &mut [StreamEntry], replies: &[Value]) -> Result<()> {
    if replies.len() != entries.len() {
        return Err(StreamError::UnexpectedReply(format!(
            "{} XPENDING replies for {} claimed entries",
            replies.len(),
            entries.len()
        )));
    }
    for (entry, reply) in entries.iter_mut().zip(replies) {
        if let Some(deliveries) = parse_pending_deliveries(reply)? {
            entry.deliveries = deliveries;
        }
    }
    Ok(())
}

#[async_trait]
impl DurableStream for RedisStream {
    async fn append(&self, key: &str, fields: &Fields, max_len: usize) -> Result<EntryId> {
        let mut conn = self.conn.clone();
        let id: String = Self::xadd(key, fields, max_len)
            .query_async(&mut conn)
            .await?;
        Ok(EntryId::new(id))
    }

    async fn append_pipeline(
        &self,
        key: &str,
        entries: &[Fields],
        max_len: usize,
    ) -> Result<Vec<Result<EntryId>>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for fields in entries {
            pipe.add_command(Self::xadd(key, fields, max_len));
        }

        let mut conn = self.conn.clone();
        let ids: Vec<String> = pipe.query_async(&mut conn).await?;
        if ids.len() != entries.len() {
            return Err(StreamError::UnexpectedReply(format!(
                "pipeline returned {} ids for {} entries",
                ids.len(),
                entries.len()
            )));
        }
        Ok(ids.into_iter().map(|id| Ok(EntryId::new(id))).collect())
    }

    async fn ensure_group(
        &self,
        key: &str,
        group: &str,
        start: GroupStart,
    ) -> Result<GroupCreation> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = Self::xgroup_create(key, group, start)
            .query_async(&mut conn)
            .await;
        group_creation(result)
    }

    async fn read_group(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let reply: Value = Self::xreadgroup(key, group, consumer, count, block)
            .query_async(&mut conn)
            .await?;
        parse_read_reply(&reply)
    }

    async fn ack(&self, key: &str, group: &str, id: &EntryId) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("XACK")
            .arg(key)
            .arg(group)
            .arg(id.as_str())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn pending_count(&self, key: &str, group: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let reply: StreamPendingReply = redis::cmd("XPENDING")
            .arg(key)
            .arg(group)
            .query_async(&mut conn)
            .await?;
        Ok(reply.count() as u64)
    }

    async fn length(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("XLEN").arg(key).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn claim_idle(
        &self,
        key: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let reply: Value = Self::xautoclaim(key, group, consumer, min_idle, count)
            .query_async(&mut conn)
            .await?;
        let mut entries = parse_autoclaim(&reply)?;
        if entries.is_empty() {
            return Ok(entries);
        }

        let mut pipe = redis::pipe();
        for entry in &entries {
            pipe.add_command(Self::xpending_entry(key, group, &entry.id));
        }
        let replies: Vec<Value> = pipe.query_async(&mut conn).await?;
        apply_deliveries(&mut entries, &replies)?;
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
