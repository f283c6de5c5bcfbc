//! Command implementations for the Tally CLI
//!
//! Shared plumbing lives here: locating the config file and turning its
//! sections into the pipeline, stream and sink settings each command needs.

pub mod enqueue;
pub mod status;
pub mod worker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tally_config::Config;
use tally_pipeline::{PipelineConfig, ReclaimConfig};
use tally_sinks::ClickHouseConfig;
use tally_stream::{DurableStream, RedisStream};

/// Paths tried, in order, when `--config` is not given
const DEFAULT_CONFIG_PATHS: &[&str] = &["configs/tally.toml", "tally.toml"];

/// Load configuration
///
/// An explicit path must exist. Without one, the first default path that
/// exists is used, falling back to built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path).context("failed to load configuration");
    }

    for candidate in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
        if candidate.exists() {
            return Config::from_file(&candidate).context("failed to load configuration");
        }
    }

    Ok(Config::default())
}

/// Pipeline settings from the `[stream]`, `[batch]` and `[reclaim]` sections
pub fn pipeline_config(config: &Config) -> PipelineConfig {
    let stream = &config.stream;
    let pipeline = PipelineConfig::default()
        .with_stream_key(stream.key.as_str())
        .with_group(stream.group.as_str())
        .with_consumer(stream.consumer.as_str())
        .with_max_len(stream.max_len)
        .with_read_count(stream.read_count)
        .with_read_block(stream.read_block)
        .with_error_backoff(stream.error_backoff)
        .with_batch_size(config.batch.size)
        .with_flush_interval(config.batch.flush_interval);

    let reclaim = &config.reclaim;
    if reclaim.enabled {
        pipeline.with_reclaim(ReclaimConfig {
            min_idle: reclaim.min_idle,
            interval: reclaim.interval,
            count: reclaim.count,
            max_deliveries: reclaim.max_deliveries,
        })
    } else {
        pipeline.without_reclaim()
    }
}

/// ClickHouse writer settings from the `[clickhouse]` section
pub fn clickhouse_config(config: &Config) -> ClickHouseConfig {
    let section = &config.clickhouse;
    let mut clickhouse = ClickHouseConfig::default()
        .with_url(section.url.as_str())
        .with_database(section.database.as_str())
        .with_table(section.table.as_str());
    clickhouse.username = section.username.clone();
    clickhouse.password = section.password.clone();
    clickhouse
}

/// Connect to the Redis stream named in `[redis]`
pub async fn connect_stream(config: &Config) -> Result<Arc<dyn DurableStream>> {
    // The URL may carry a password, so it is not included in the error
    let stream = RedisStream::connect(&config.redis.url)
        .await
        .context("failed to connect to Redis")?;
    Ok(Arc::new(stream))
}
