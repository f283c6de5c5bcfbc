//! Worker - lifecycle wrapper around the consumer loop
//!
//! ```text
//! start() ── ensure group ── spawn loop ──► running
//! stop()  ── cancel ── join (loop drains its batch) ──► stopped
//! status() ── pending count + stream length
//! ```
//!
//! The stream and sink are injected; the worker owns no connections.
//! Dropping a running worker cancels the loop without waiting for it; only
//! `stop` joins.

use std::sync::Arc;

use serde::Serialize;
use tally_sinks::SinkWriter;
use tally_stream::{DurableStream, GroupCreation, GroupStart};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::consumer::{ConsumerLoop, ConsumerState};
use crate::error::{PipelineError, Result};
use crate::metrics::ConsumerMetrics;

/// Backlog snapshot returned by [`Worker::status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    /// Entries delivered to the group but not yet acknowledged
    pub pending_count: u64,
    /// Entries retained in the stream
    pub stream_length: u64,
    pub group_name: String,
    pub consumer_name: String,
    pub stream_key: String,
}

/// Query the backlog of the configured stream and group
///
/// Usable without a worker (e.g., from a status command).
pub async fn backlog_status(
    stream: &dyn DurableStream,
    config: &PipelineConfig,
) -> Result<WorkerStatus> {
    let pending_count = stream
        .pending_count(&config.stream_key, &config.group)
        .await?;
    let stream_length = stream.length(&config.stream_key).await?;

    Ok(WorkerStatus {
        pending_count,
        stream_length,
        group_name: config.group.clone(),
        consumer_name: config.consumer.clone(),
        stream_key: config.stream_key.clone(),
    })
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs one consumer loop against a stream and a sink
pub struct Worker {
    stream: Arc<dyn DurableStream>,
    sink: Arc<dyn SinkWriter>,
    config: PipelineConfig,
    metrics: Arc<ConsumerMetrics>,
    state: Arc<watch::Sender<ConsumerState>>,
    running: Option<RunningLoop>,
}

impl Worker {
    /// Create a worker; the config is validated here
    pub fn new(
        stream: Arc<dyn DurableStream>,
        sink: Arc<dyn SinkWriter>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(ConsumerState::Idle);
        Ok(Self {
            stream,
            sink,
            config,
            metrics: Arc::new(ConsumerMetrics::new()),
            state: Arc::new(state),
            running: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current consumer loop state
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    /// Whether a loop is spawned and has not exited
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Ensure the consumer group and spawn the consumer loop
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a loop is already active
    /// - `Start` if the consumer group cannot be created
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }

        self.state.send_replace(ConsumerState::Idle);
        info!(
            stream = %self.config.stream_key,
            group = %self.config.group,
            consumer = %self.config.consumer,
            "starting worker"
        );

        let creation = self
            .stream
            .ensure_group(
                &self.config.stream_key,
                &self.config.group,
                GroupStart::Beginning,
            )
            .await
            .map_err(|e| {
                error!(
                    stream = %self.config.stream_key,
                    group = %self.config.group,
                    error = %e,
                    "failed to create consumer group"
                );
                PipelineError::Start(e)
            })?;

        match creation {
            GroupCreation::Created => info!(group = %self.config.group, "consumer group created"),
            GroupCreation::AlreadyExists => {
                debug!(group = %self.config.group, "consumer group already exists")
            }
        }
        self.state.send_replace(ConsumerState::GroupEnsured);

        let cancel = CancellationToken::new();
        let consumer = ConsumerLoop::new(
            Arc::clone(&self.stream),
            Arc::clone(&self.sink),
            self.config.clone(),
            Arc::clone(&self.metrics),
            Arc::clone(&self.state),
        );
        let handle = tokio::spawn(consumer.run(cancel.clone()));
        self.running = Some(RunningLoop { cancel, handle });
        self.state.send_replace(ConsumerState::Running);

        info!("worker started");
        Ok(())
    }

    /// Cancel the loop and wait for it to drain and exit
    ///
    /// A no-op if the worker was never started or is already stopped. Does
    /// not interrupt a sink write in progress; bound it with a timeout from
    /// the caller if needed.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        info!("stopping worker");
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            error!(error = %e, "consumer loop task failed");
            self.state.send_replace(ConsumerState::Stopped);
        }
        info!("worker stopped");
    }

    /// Pending-entries count and stream length for this worker's group
    ///
    /// # Errors
    ///
    /// Returns `Stream` if either query fails.
    pub async fn status(&self) -> Result<WorkerStatus> {
        backlog_status(self.stream.as_ref(), &self.config).await
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
