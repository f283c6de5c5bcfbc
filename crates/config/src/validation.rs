//! Configuration validation
//!
//! Checks what serde cannot:
//! - Names used to address the stream and group are non-empty
//! - Counts and intervals are non-zero
//! - Endpoints carry a supported scheme
//! - Reclamation cannot take over entries still sitting in the local batch

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_endpoints(config)?;
    validate_stream(config)?;
    validate_batch(config)?;
    validate_reclaim(config)?;
    validate_global(config)?;
    Ok(())
}

fn validate_endpoints(config: &Config) -> Result<()> {
    let redis = &config.redis.url;
    if redis.is_empty() {
        return Err(ConfigError::missing_field("redis", "url"));
    }
    if !(redis.starts_with("redis://") || redis.starts_with("rediss://")) {
        return Err(ConfigError::invalid_value(
            "redis",
            "url",
            format!("'{redis}' must start with redis:// or rediss://"),
        ));
    }

    let clickhouse = &config.clickhouse;
    if clickhouse.url.is_empty() {
        return Err(ConfigError::missing_field("clickhouse", "url"));
    }
    if !(clickhouse.url.starts_with("http://") || clickhouse.url.starts_with("https://")) {
        return Err(ConfigError::invalid_value(
            "clickhouse",
            "url",
            format!("'{}' must start with http:// or https://", clickhouse.url),
        ));
    }
    if clickhouse.table.is_empty() {
        return Err(ConfigError::missing_field("clickhouse", "table"));
    }
    if clickhouse.password.is_some() && clickhouse.username.is_none() {
        return Err(ConfigError::missing_field("clickhouse", "username"));
    }

    Ok(())
}

fn validate_stream(config: &Config) -> Result<()> {
    let stream = &config.stream;
    for (field, value) in [
        ("key", &stream.key),
        ("group", &stream.group),
        ("consumer", &stream.consumer),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::missing_field("stream", field));
        }
    }

    if stream.read_count == 0 {
        return Err(ConfigError::invalid_value(
            "stream",
            "read_count",
            "must be at least 1",
        ));
    }

    Ok(())
}

fn validate_batch(config: &Config) -> Result<()> {
    if config.batch.size == 0 {
        return Err(ConfigError::invalid_value("batch", "size", "must be at least 1"));
    }
    if config.batch.flush_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "batch",
            "flush_interval",
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_reclaim(config: &Config) -> Result<()> {
    let reclaim = &config.reclaim;
    if !reclaim.enabled {
        return Ok(());
    }

    if reclaim.count == 0 {
        return Err(ConfigError::invalid_value(
            "reclaim",
            "count",
            "must be at least 1",
        ));
    }
    if reclaim.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "reclaim",
            "interval",
            "must be greater than zero",
        ));
    }
    if reclaim.max_deliveries == 0 {
        return Err(ConfigError::invalid_value(
            "reclaim",
            "max_deliveries",
            "must be at least 1",
        ));
    }

    // An entry can wait up to one flush interval plus one read in the batch
    let floor = config.batch.flush_interval + config.stream.read_block;
    if reclaim.min_idle <= floor {
        return Err(ConfigError::invalid_value(
            "reclaim",
            "min_idle",
            format!(
                "{:?} must exceed batch.flush_interval + stream.read_block ({:?})",
                reclaim.min_idle, floor
            ),
        ));
    }

    Ok(())
}

fn validate_global(config: &Config) -> Result<()> {
    if config.global.shutdown_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "global",
            "shutdown_timeout",
            "must be greater than zero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn parse_err(toml: &str) -> ConfigError {
        Config::from_str(toml).unwrap_err()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = parse_err("[stream]\ngroup = \"  \"");
        assert!(matches!(
            err,
            ConfigError::MissingField {
                section: "stream",
                field: "group"
            }
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = parse_err("[batch]\nsize = 0");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "batch",
                field: "size",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_flush_interval_rejected() {
        let err = parse_err("[batch]\nflush_interval = \"0s\"");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "flush_interval",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_read_count_rejected() {
        let err = parse_err("[stream]\nread_count = 0");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "read_count",
                ..
            }
        ));
    }

    #[test]
    fn test_reclaim_idle_must_exceed_batch_window() {
        let toml = r#"
[batch]
flush_interval = "30s"

[stream]
read_block = "1s"

[reclaim]
min_idle = "31s"
"#;
        let err = parse_err(toml);
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "reclaim",
                field: "min_idle",
                ..
            }
        ));
    }

    #[test]
    fn test_reclaim_max_deliveries_must_be_positive() {
        let err = parse_err("[reclaim]\nmax_deliveries = 0");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "reclaim",
                field: "max_deliveries",
                ..
            }
        ));
    }

    #[test]
    fn test_disabled_reclaim_skips_checks() {
        let toml = r#"
[reclaim]
enabled = false
min_idle = "1s"
count = 0
"#;
        assert!(Config::from_str(toml).is_ok());
    }

    #[test]
    fn test_bad_redis_scheme_rejected() {
        let err = parse_err("[redis]\nurl = \"http://localhost:6379\"");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "redis",
                ..
            }
        ));
    }

    #[test]
    fn test_tls_redis_accepted() {
        assert!(Config::from_str("[redis]\nurl = \"rediss://cache:6380\"").is_ok());
    }

    #[test]
    fn test_bad_clickhouse_scheme_rejected() {
        let err = parse_err("[clickhouse]\nurl = \"tcp://ch:9000\"");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "clickhouse",
                field: "url",
                ..
            }
        ));
    }

    #[test]
    fn test_password_without_username_rejected() {
        let err = parse_err("[clickhouse]\npassword = \"pw\"");
        assert!(matches!(
            err,
            ConfigError::MissingField {
                section: "clickhouse",
                field: "username"
            }
        ));
    }

    #[test]
    fn test_zero_shutdown_timeout_rejected() {
        let err = parse_err("[global]\nshutdown_timeout = \"0s\"");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "global",
                ..
            }
        ));
    }
}
