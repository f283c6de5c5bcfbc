//! Enqueue command - push JSON-lines install events onto the stream
//!
//! Each non-blank line is one encoded `InstallEvent`. Lines that fail to
//! decode are logged and skipped; the rest go through the producer in
//! pipelined chunks.
//!
//! # Usage
//!
//! ```bash
//! tally enqueue events.jsonl
//! cat events.jsonl | tally enqueue - --chunk-size 1000
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use tally_config::Config;
use tally_pipeline::Producer;
use tally_protocol::{InstallEvent, decode};

/// Enqueue command arguments
#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// JSON-lines file of install events ("-" reads stdin)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Events per pipelined append
    #[arg(long, default_value_t = 500)]
    pub chunk_size: usize,
}

/// Line-level outcome of one enqueue run
#[derive(Debug, Default, PartialEq, Eq)]
struct EnqueueSummary {
    lines: usize,
    unparsable: usize,
    chunks: usize,
}

/// Run the enqueue command
pub async fn run(args: EnqueueArgs, config: Config) -> Result<()> {
    if args.chunk_size == 0 {
        anyhow::bail!("--chunk-size must be at least 1");
    }

    let stream = super::connect_stream(&config).await?;
    let producer = Producer::new(stream, &super::pipeline_config(&config));

    let summary = if args.file.as_os_str() == "-" {
        enqueue_lines(BufReader::new(tokio::io::stdin()), &producer, args.chunk_size).await?
    } else {
        let file = tokio::fs::File::open(&args.file)
            .await
            .with_context(|| format!("failed to open {}", args.file.display()))?;
        enqueue_lines(BufReader::new(file), &producer, args.chunk_size).await?
    };

    let metrics = producer.metrics().snapshot();
    info!(
        lines = summary.lines,
        unparsable = summary.unparsable,
        chunks = summary.chunks,
        enqueued = metrics.events_enqueued,
        skipped = metrics.events_skipped,
        failed = metrics.enqueue_failures,
        "enqueue complete"
    );
    Ok(())
}

async fn enqueue_lines<R>(
    reader: R,
    producer: &Producer,
    chunk_size: usize,
) -> Result<EnqueueSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = EnqueueSummary::default();
    let mut chunk: Vec<InstallEvent> = Vec::with_capacity(chunk_size);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        summary.lines += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match decode(line.as_bytes()) {
            Ok(event) => chunk.push(event),
            Err(e) => {
                warn!(line = summary.lines, error = %e, "skipping unparsable event");
                summary.unparsable += 1;
                continue;
            }
        }

        if chunk.len() == chunk_size {
            send_chunk(producer, &chunk).await?;
            summary.chunks += 1;
            chunk.clear();
        }
    }

    if !chunk.is_empty() {
        send_chunk(producer, &chunk).await?;
        summary.chunks += 1;
    }

    Ok(summary)
}

async fn send_chunk(producer: &Producer, chunk: &[InstallEvent]) -> Result<()> {
    producer
        .create_batch(chunk)
        .await
        .with_context(|| format!("failed to enqueue chunk of {} events", chunk.len()))
}
