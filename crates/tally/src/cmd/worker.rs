//! Worker command - consume the stream into ClickHouse
//!
//! Starts one consumer loop and keeps it running until SIGINT or SIGTERM,
//! then stops it, giving the final flush up to `global.shutdown_timeout`.
//! Entries not acknowledged by then stay pending in the stream for the next
//! worker (or another worker's reclaim) to deliver.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::{info, warn};

use tally_config::Config;
use tally_pipeline::Worker;
use tally_sinks::{ClickHouseWriter, MemorySink, SinkWriter};

/// Batches a dry run keeps for inspection; older ones are only counted
const DRY_RUN_HISTORY: usize = 64;

/// Worker command arguments
#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Consumer name within the group; overrides `stream.consumer`
    #[arg(long)]
    pub consumer: Option<String>,

    /// Count flushed batches in memory instead of writing to ClickHouse
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the worker command
pub async fn run(args: WorkerArgs, config: Config) -> Result<()> {
    let mut pipeline = super::pipeline_config(&config);
    if let Some(consumer) = args.consumer {
        pipeline = pipeline.with_consumer(consumer);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        stream = %pipeline.stream_key,
        group = %pipeline.group,
        consumer = %pipeline.consumer,
        dry_run = args.dry_run,
        "tally worker starting"
    );

    let stream = super::connect_stream(&config).await?;

    let dry_run_sink = args.dry_run.then(|| Arc::new(dry_run_sink()));
    let sink: Arc<dyn SinkWriter> = match &dry_run_sink {
        Some(sink) => sink.clone(),
        None => {
            let writer = ClickHouseWriter::new(&super::clickhouse_config(&config));
            writer
                .ping()
                .await
                .context("failed to reach ClickHouse")?;
            info!(table = writer.table(), "connected to ClickHouse");
            Arc::new(writer)
        }
    };

    let mut worker =
        Worker::new(stream, sink, pipeline).context("invalid pipeline configuration")?;
    worker.start().await.context("failed to start worker")?;

    wait_for_shutdown().await?;
    info!("shutdown signal received, draining current batch");

    let shutdown_timeout = config.global.shutdown_timeout;
    if tokio::time::timeout(shutdown_timeout, worker.stop())
        .await
        .is_err()
    {
        warn!(
            timeout = ?shutdown_timeout,
            "worker did not stop within timeout, unacknowledged entries stay pending"
        );
    }

    let metrics = worker.metrics().snapshot();
    info!(
        entries_claimed = metrics.entries_claimed,
        entries_reclaimed = metrics.entries_reclaimed,
        events_flushed = metrics.events_flushed,
        flush_failures = metrics.flush_failures,
        decode_errors = metrics.decode_errors,
        entries_dropped = metrics.entries_dropped,
        "tally worker stopped"
    );

    if let Some(sink) = dry_run_sink {
        let written = sink.metrics().snapshot();
        info!(
            batches = written.batches_written,
            events = written.rows_written,
            "dry run collected batches"
        );
    }

    Ok(())
}

fn dry_run_sink() -> MemorySink {
    MemorySink::with_history(DRY_RUN_HISTORY)
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            res = signal::ctrl_c() => res.context("failed to install Ctrl+C handler")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;

    Ok(())
}
