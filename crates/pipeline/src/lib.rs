//! Tally - Pipeline
//!
//! At-least-once ingestion of install events: a producer that appends to a
//! durable stream, and a worker whose consumer loop batches claimed entries
//! into a sink and acknowledges them only after the sink confirms.
//!
//! # Architecture
//!
//! ```text
//! [Callers]                [Durable Stream]                 [Worker]
//!   create ──────┐                                ┌── read_group / claim_idle
//!   create_batch ┴─→ Producer ──append──→ log ───┤
//!                                                 └─→ ConsumerLoop ──→ Batch ──→ SinkWriter
//!                                   log ◄──── ack ────────────────────────────────┘
//! ```
//!
//! # Key Design
//!
//! - **Ack after persist**: an entry is acked only if its whole batch was written
//! - **Dual trigger**: flush at `batch_size` or when the flush timer elapses
//! - **Poison entries**: undecodable entries are acked and dropped at once
//! - **Reclamation**: entries idle in the group (dead consumers, failed
//!   flushes) are taken over and flushed again
//! - **Injected collaborators**: stream and sink are trait objects, no globals
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tally_pipeline::{PipelineConfig, Producer, Worker};
//! use tally_sinks::MemorySink;
//! use tally_stream::MemoryStream;
//!
//! let stream = Arc::new(MemoryStream::new());
//! let config = PipelineConfig::default();
//!
//! let producer = Producer::new(stream.clone(), &config);
//! producer.create(&event).await?;
//!
//! let mut worker = Worker::new(stream, Arc::new(MemorySink::new()), config)?;
//! worker.start().await?;
//! // ...
//! worker.stop().await;
//! ```

mod batch;
mod config;
mod consumer;
mod error;
mod metrics;
mod producer;
mod worker;

pub use config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONSUMER, DEFAULT_ERROR_BACKOFF, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_GROUP, DEFAULT_MAX_DELIVERIES, DEFAULT_MAX_LEN, DEFAULT_READ_BLOCK,
    DEFAULT_READ_COUNT, DEFAULT_RECLAIM_COUNT, DEFAULT_RECLAIM_INTERVAL,
    DEFAULT_RECLAIM_MIN_IDLE, DEFAULT_STREAM_KEY, PipelineConfig, ReclaimConfig,
};
pub use consumer::ConsumerState;
pub use error::{PipelineError, Result};
pub use metrics::{
    ConsumerMetrics, ConsumerMetricsSnapshot, ProducerMetrics, ProducerMetricsSnapshot,
};
pub use producer::Producer;
pub use worker::{Worker, WorkerStatus, backlog_status};

#[cfg(test)]
mod test_support;
