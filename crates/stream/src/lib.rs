//! Tally Stream - durable, consumer-group log backends
//!
//! The ingestion pipeline only talks to the log through the
//! [`DurableStream`] trait: append (single or pipelined), consumer-group
//! creation, bounded-wait group reads, per-entry acknowledgment, backlog
//! introspection, and reclamation of entries left pending by dead consumers.
//!
//! # Backends
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | `MemoryStream` | In-process log with the same group semantics (tests, dev) |
//! | `RedisStream` | Redis Streams (`redis` feature) |
//!
//! # Entry lifecycle
//!
//! ```text
//! append ──> [stream] ──read_group──> pending(consumer) ──ack──> done
//!                                         │
//!                                         └──claim_idle──> pending(other consumer)
//! ```

mod error;
mod memory;
mod traits;
mod types;

#[cfg(feature = "redis")]
mod redis;

pub use error::{Result, StreamError};
pub use memory::{MemoryStream, PendingInfo};
pub use traits::DurableStream;
pub use types::{EntryId, Fields, GroupCreation, GroupStart, StreamEntry};

#[cfg(feature = "redis")]
pub use self::redis::RedisStream;
