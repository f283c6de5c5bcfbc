//! Status command - show the consumer group backlog
//!
//! # Usage
//!
//! ```bash
//! tally status
//! tally status --json
//! ```

use anyhow::{Context, Result};
use clap::Args;

use tally_config::Config;
use tally_pipeline::{WorkerStatus, backlog_status};

/// Status command arguments
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the status command
pub async fn run(args: StatusArgs, config: Config) -> Result<()> {
    let stream = super::connect_stream(&config).await?;
    let pipeline = super::pipeline_config(&config);

    let status = backlog_status(stream.as_ref(), &pipeline)
        .await
        .context("failed to read stream backlog - has a worker created the group yet?")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&status));
    }
    Ok(())
}

fn render_status(status: &WorkerStatus) -> String {
    format!(
        "Stream:    {}\nGroup:     {}\nConsumer:  {}\nLength:    {}\nPending:   {}\n",
        status.stream_key,
        status.group_name,
        status.consumer_name,
        status.stream_length,
        status.pending_count,
    )
}
