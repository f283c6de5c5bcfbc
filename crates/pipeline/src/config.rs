//! Pipeline configuration
//!
//! Names, limits and timings shared by the producer and the consumer loop.
//!
//! | Setting | Default | Used by |
//! |---------|---------|---------|
//! | `stream_key` | `install_events_stream` | both |
//! | `group` | `install_events_consumer_group` | consumer |
//! | `consumer` | `install_events_consumer` | consumer |
//! | `max_len` | 100,000 (approximate) | producer |
//! | `read_count` | 10 | consumer |
//! | `read_block` | 1s | consumer |
//! | `batch_size` | 100 | consumer |
//! | `flush_interval` | 5s | consumer |
//! | `error_backoff` | 500ms | consumer |
//! | `reclaim` | 60s idle, every 30s, 100 entries, 5 deliveries | consumer |

use std::time::Duration;

use crate::error::{PipelineError, Result};

// =============================================================================
// Constants
// =============================================================================

pub const DEFAULT_STREAM_KEY: &str = "install_events_stream";

pub const DEFAULT_GROUP: &str = "install_events_consumer_group";

pub const DEFAULT_CONSUMER: &str = "install_events_consumer";

/// Approximate cap on retained stream entries
pub const DEFAULT_MAX_LEN: usize = 100_000;

/// Entries requested per group read
pub const DEFAULT_READ_COUNT: usize = 10;

/// How long a group read waits for new entries
pub const DEFAULT_READ_BLOCK: Duration = Duration::from_secs(1);

/// Events per flush
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Periodic flush timer
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Pause after a failed stream read
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_millis(500);

pub const DEFAULT_RECLAIM_MIN_IDLE: Duration = Duration::from_secs(60);

pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(30);

pub const DEFAULT_RECLAIM_COUNT: usize = 100;

/// Deliveries after which a reclaimed entry is dropped
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

// =============================================================================
// Configuration
// =============================================================================

/// Reclamation of entries left pending by dead consumers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimConfig {
    /// Entries pending at least this long are taken over
    pub min_idle: Duration,

    /// How often to look for idle entries
    pub interval: Duration,

    /// Maximum entries taken over per attempt
    pub count: usize,

    /// A reclaimed entry delivered more often than this is acked and
    /// dropped instead of retried
    pub max_deliveries: u32,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            min_idle: DEFAULT_RECLAIM_MIN_IDLE,
            interval: DEFAULT_RECLAIM_INTERVAL,
            count: DEFAULT_RECLAIM_COUNT,
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }
}

/// Configuration for the producer, consumer loop and worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Stream key
    pub stream_key: String,

    /// Consumer group name
    pub group: String,

    /// Consumer name within the group
    pub consumer: String,

    /// Approximate maximum retained entries (0 = no cap)
    pub max_len: usize,

    /// Entries requested per read
    pub read_count: usize,

    /// Maximum wait of one read
    pub read_block: Duration,

    /// Size trigger
    pub batch_size: usize,

    /// Time trigger
    pub flush_interval: Duration,

    /// Pause after a failed read before retrying
    pub error_backoff: Duration,

    /// Idle-entry reclamation (`None` disables it)
    pub reclaim: Option<ReclaimConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stream_key: DEFAULT_STREAM_KEY.into(),
            group: DEFAULT_GROUP.into(),
            consumer: DEFAULT_CONSUMER.into(),
            max_len: DEFAULT_MAX_LEN,
            read_count: DEFAULT_READ_COUNT,
            read_block: DEFAULT_READ_BLOCK,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            reclaim: Some(ReclaimConfig::default()),
        }
    }
}

impl PipelineConfig {
    pub fn with_stream_key(mut self, key: impl Into<String>) -> Self {
        self.stream_key = key.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn with_read_count(mut self, count: usize) -> Self {
        self.read_count = count;
        self
    }

    pub fn with_read_block(mut self, block: Duration) -> Self {
        self.read_block = block;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn with_reclaim(mut self, reclaim: ReclaimConfig) -> Self {
        self.reclaim = Some(reclaim);
        self
    }

    pub fn without_reclaim(mut self) -> Self {
        self.reclaim = None;
        self
    }

    /// Check limits and timings
    ///
    /// Reclamation must not take over entries that are still sitting in a
    /// live consumer's batch, so `min_idle` has to exceed the longest time an
    /// entry can wait before its flush (`flush_interval + read_block`).
    pub fn validate(&self) -> Result<()> {
        if self.stream_key.is_empty() {
            return Err(PipelineError::invalid_config("stream_key must not be empty"));
        }
        if self.group.is_empty() {
            return Err(PipelineError::invalid_config("group must not be empty"));
        }
        if self.consumer.is_empty() {
            return Err(PipelineError::invalid_config("consumer must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::invalid_config("batch_size must be > 0"));
        }
        if self.read_count == 0 {
            return Err(PipelineError::invalid_config("read_count must be > 0"));
        }
        if self.flush_interval.is_zero() {
            return Err(PipelineError::invalid_config("flush_interval must be > 0"));
        }

        if let Some(reclaim) = &self.reclaim {
            if reclaim.count == 0 {
                return Err(PipelineError::invalid_config("reclaim.count must be > 0"));
            }
            if reclaim.interval.is_zero() {
                return Err(PipelineError::invalid_config("reclaim.interval must be > 0"));
            }
            if reclaim.max_deliveries == 0 {
                return Err(PipelineError::invalid_config(
                    "reclaim.max_deliveries must be > 0",
                ));
            }
            let max_wait = self.flush_interval + self.read_block;
            if reclaim.min_idle <= max_wait {
                return Err(PipelineError::invalid_config(format!(
                    "reclaim.min_idle ({:?}) must exceed flush_interval + read_block ({:?})",
                    reclaim.min_idle, max_wait
                )));
            }
        }

        Ok(())
    }
}
