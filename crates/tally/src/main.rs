//! Tally - install event ingestion worker
//!
//! # Usage
//!
//! ```bash
//! # Consume the stream into ClickHouse until SIGINT/SIGTERM
//! tally worker
//! tally --config configs/tally.toml worker --consumer worker-b
//!
//! # Inspect the backlog
//! tally status --json
//!
//! # Push JSON-lines events onto the stream
//! tally enqueue events.jsonl
//! ```

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tally - install event ingestion worker
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consume install events from the stream into ClickHouse
    Worker(cmd::worker::WorkerArgs),

    /// Show stream length and consumer group backlog
    Status(cmd::status::StatusArgs),

    /// Enqueue install events from a JSON-lines file
    Enqueue(cmd::enqueue::EnqueueArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cmd::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Worker(args) => {
            let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
            init_logging(&log_level, config.log.format)?;
            cmd::worker::run(args, config).await
        }
        Command::Status(args) => {
            // Status doesn't need logging - just outputs to stdout
            cmd::status::run(args, config).await
        }
        Command::Enqueue(args) => {
            let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
            init_logging(&log_level, config.log.format)?;
            cmd::enqueue::run(args, config).await
        }
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_cli_flag_overrides_config_level() {
        let config = Config::from_str("[log]\nlevel = \"warn\"").unwrap();
        assert_eq!(resolve_log_level(Some("debug"), &config), "debug");
        assert_eq!(resolve_log_level(None, &config), "warn");
    }

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(resolve_log_level(None, &Config::default()), "info");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["tally", "-l", "debug", "worker", "--dry-run"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Worker(ref a) if a.dry_run));

        let cli = Cli::try_parse_from(["tally", "status", "--json", "-c", "tally.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("tally.toml")));
        assert!(matches!(cli.command, Command::Status(ref a) if a.json));

        assert!(Cli::try_parse_from(["tally"]).is_err());
    }
}
