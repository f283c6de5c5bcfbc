//! ClickHouse destination configuration

use serde::Deserialize;

/// ClickHouse server receiving flushed batches
///
/// # Example
///
/// ```toml
/// [clickhouse]
/// url = "http://clickhouse:8123"
/// database = "analytics"
/// username = "writer"
/// password = "secret"
/// table = "install_events"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    /// HTTP endpoint
    /// Default: http://localhost:8123
    pub url: String,

    /// Default: default
    pub database: String,

    /// Optional username
    pub username: Option<String>,

    /// Optional password
    pub password: Option<String>,

    /// Destination table
    /// Default: install_events
    pub table: String,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".into(),
            database: "default".into(),
            username: None,
            password: None,
            table: "install_events".into(),
        }
    }
}
