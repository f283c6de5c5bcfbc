//! ClickHouse writer
//!
//! Row-based inserts through the `clickhouse` crate.

use std::sync::Arc;

use async_trait::async_trait;
use clickhouse::Client;
use clickhouse::insert::Insert;
use tally_protocol::InstallEvent;
use tracing::{debug, warn};

use super::config::ClickHouseConfig;
use super::row::InstallEventRow;
use crate::common::{SinkError, SinkMetrics};
use crate::traits::SinkWriter;

/// Writes install event batches into ClickHouse
pub struct ClickHouseWriter {
    client: Client,
    table: String,
    metrics: Arc<SinkMetrics>,
}

impl ClickHouseWriter {
    pub fn new(config: &ClickHouseConfig) -> Self {
        Self::with_client(config.build_client(), config.table.clone())
    }

    /// Use a pre-built client (custom transport, test mock server)
    pub fn with_client(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Metrics handle, shared with the writer
    pub fn metrics(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Round-trip a trivial query to confirm the server is reachable
    pub async fn ping(&self) -> Result<(), SinkError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(|e| SinkError::prepare(&self.table, e))
    }

    async fn insert(&self, events: &[InstallEvent]) -> Result<(), SinkError> {
        let table = self.table.as_str();

        let mut insert: Insert<InstallEventRow> = self
            .client
            .insert(table)
            .await
            .map_err(|e| SinkError::prepare(table, e))?;

        for event in events {
            let row = InstallEventRow::from_event(event);
            insert
                .write(&row)
                .await
                .map_err(|e| SinkError::append(table, &event.event_id, e))?;
        }

        insert
            .end()
            .await
            .map_err(|e| SinkError::send(table, events.len(), e))
    }
}

#[async_trait]
impl SinkWriter for ClickHouseWriter {
    async fn write_batch(&self, events: &[InstallEvent]) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }

        match self.insert(events).await {
            Ok(()) => {
                self.metrics.record_success(events.len());
                debug!(table = %self.table, rows = events.len(), "inserted batch");
                Ok(())
            }
            Err(e) => {
                self.metrics.record_failure(events.len());
                warn!(
                    table = %self.table,
                    rows = events.len(),
                    stage = e.stage(),
                    error = %e,
                    "batch insert failed"
                );
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "clickhouse"
    }
}
