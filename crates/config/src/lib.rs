//! Tally Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Every section is optional; an empty file runs a worker against a local
//! Redis and ClickHouse.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use tally_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[batch]\nsize = 500").unwrap();
//! assert_eq!(config.batch.size, 500);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [redis]
//! url = "redis://127.0.0.1:6379"
//!
//! [stream]
//! consumer = "worker-a"
//!
//! [batch]
//! size = 100
//! flush_interval = "5s"
//!
//! [clickhouse]
//! url = "http://localhost:8123"
//! ```

mod clickhouse;
mod error;
mod global;
mod logging;
mod redis;
mod stream;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use clickhouse::ClickHouseConfig;
pub use error::{ConfigError, Result};
pub use global::GlobalConfig;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use redis::RedisConfig;
pub use stream::{BatchConfig, ReclaimConfig, StreamConfig};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Process-wide settings
    pub global: GlobalConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Redis connection
    pub redis: RedisConfig,

    /// Stream names and read behaviour
    pub stream: StreamConfig,

    /// Flush triggers
    pub batch: BatchConfig,

    /// Idle-entry reclamation
    pub reclaim: ReclaimConfig,

    /// ClickHouse destination
    pub clickhouse: ClickHouseConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
