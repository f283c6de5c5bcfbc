//! Redis connection configuration

use serde::Deserialize;

/// Redis server hosting the install event stream
///
/// # Example
///
/// ```toml
/// [redis]
/// url = "redis://:secret@10.0.0.5:6379/2"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL (`redis://` or `rediss://`)
    /// Default: redis://127.0.0.1:6379
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".into(),
        }
    }
}
