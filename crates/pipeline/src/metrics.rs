//! Pipeline metrics
//!
//! Atomic counters for the producer and the consumer loop. All operations
//! use relaxed ordering; values are eventually consistent, not real-time.

use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Producer
// =============================================================================

/// Counters for `Producer::create` and `Producer::create_batch`
#[derive(Debug, Default)]
pub struct ProducerMetrics {
    /// Entries appended to the stream
    events_enqueued: AtomicU64,

    /// Events dropped before append (empty id, encode failure)
    events_skipped: AtomicU64,

    /// Events whose append failed (per entry or whole round trip)
    enqueue_failures: AtomicU64,
}

impl ProducerMetrics {
    #[inline]
    pub const fn new() -> Self {
        Self {
            events_enqueued: AtomicU64::new(0),
            events_skipped: AtomicU64::new(0),
            enqueue_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_enqueued(&self, count: u64) {
        self.events_enqueued.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.events_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_enqueue_failures(&self, count: u64) {
        self.enqueue_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProducerMetricsSnapshot {
        ProducerMetricsSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_skipped: self.events_skipped.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ProducerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerMetricsSnapshot {
    pub events_enqueued: u64,
    pub events_skipped: u64,
    pub enqueue_failures: u64,
}

// =============================================================================
// Consumer
// =============================================================================

/// Counters for the consumer loop
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    /// Entries delivered by group reads
    entries_claimed: AtomicU64,

    /// Entries taken over from idle consumers
    entries_reclaimed: AtomicU64,

    /// Entries dropped (and acked) because they failed to decode
    decode_errors: AtomicU64,

    /// Reclaimed entries dropped (and acked) past the delivery limit
    entries_dropped: AtomicU64,

    /// Successful sink writes
    batches_flushed: AtomicU64,

    /// Events in successful sink writes
    events_flushed: AtomicU64,

    /// Failed sink writes (batch left pending)
    flush_failures: AtomicU64,

    /// Successful acknowledgments
    acks: AtomicU64,

    /// Failed acknowledgments
    ack_failures: AtomicU64,

    /// Failed group reads or reclaim attempts
    read_errors: AtomicU64,
}

impl ConsumerMetrics {
    #[inline]
    pub const fn new() -> Self {
        Self {
            entries_claimed: AtomicU64::new(0),
            entries_reclaimed: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            entries_dropped: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            events_flushed: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            acks: AtomicU64::new(0),
            ack_failures: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_claimed(&self, count: u64) {
        self.entries_claimed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reclaimed(&self, count: u64) {
        self.entries_reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.entries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flushed(&self, events: u64) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.events_flushed.fetch_add(events, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ack(&self) {
        self.acks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ack_failure(&self) {
        self.ack_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConsumerMetricsSnapshot {
        ConsumerMetricsSnapshot {
            entries_claimed: self.entries_claimed.load(Ordering::Relaxed),
            entries_reclaimed: self.entries_reclaimed.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            events_flushed: self.events_flushed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            acks: self.acks.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ConsumerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerMetricsSnapshot {
    pub entries_claimed: u64,
    pub entries_reclaimed: u64,
    pub decode_errors: u64,
    pub entries_dropped: u64,
    pub batches_flushed: u64,
    pub events_flushed: u64,
    pub flush_failures: u64,
    pub acks: u64,
    pub ack_failures: u64,
    pub read_errors: u64,
}
