//! Stream, batching and reclamation settings
//!
//! These three sections together describe how events move from the stream
//! into batches:
//!
//! ```toml
//! [stream]
//! key = "install_events_stream"
//! group = "install_events_consumer_group"
//! consumer = "worker-a"
//! max_len = 100000
//! read_count = 10
//! read_block = "1s"
//!
//! [batch]
//! size = 100
//! flush_interval = "5s"
//!
//! [reclaim]
//! enabled = true
//! min_idle = "60s"
//! interval = "30s"
//! count = 100
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Stream names and read behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Stream key
    /// Default: install_events_stream
    pub key: String,

    /// Consumer group
    /// Default: install_events_consumer_group
    pub group: String,

    /// Consumer name; must be unique per running worker
    /// Default: install_events_consumer
    pub consumer: String,

    /// Approximate cap on retained entries (0 = unbounded)
    /// Default: 100000
    pub max_len: usize,

    /// Entries requested per read
    /// Default: 10
    pub read_count: usize,

    /// Longest a read blocks waiting for entries
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub read_block: Duration,

    /// Pause after a failed read
    /// Default: 500ms
    #[serde(with = "humantime_serde")]
    pub error_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            key: "install_events_stream".into(),
            group: "install_events_consumer_group".into(),
            consumer: "install_events_consumer".into(),
            max_len: 100_000,
            read_count: 10,
            read_block: Duration::from_secs(1),
            error_backoff: Duration::from_millis(500),
        }
    }
}

/// Flush triggers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Events per batch
    /// Default: 100
    pub size: usize,

    /// Flush a non-empty batch at least this often
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Takeover of entries left pending by dead consumers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReclaimConfig {
    /// Default: true
    pub enabled: bool,

    /// Entries pending this long are taken over
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub min_idle: Duration,

    /// How often to look for idle entries
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Entries taken over per attempt
    /// Default: 100
    pub count: usize,

    /// Reclaimed entries delivered more often than this are acked and dropped
    /// Default: 5
    pub max_deliveries: u32,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_idle: Duration::from_secs(60),
            interval: Duration::from_secs(30),
            count: 100,
            max_deliveries: 5,
        }
    }
}
