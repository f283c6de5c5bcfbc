//! Sink writer trait

use async_trait::async_trait;
use tally_protocol::InstallEvent;

use crate::common::SinkError;

/// Bulk writer for install event batches
///
/// Implementations must treat an empty slice as a successful no-op and must
/// report any failure to prepare, populate, or transmit the bulk insert as a
/// `SinkError`. No partial success is reported.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    /// Persist the whole batch, in order
    async fn write_batch(&self, events: &[InstallEvent]) -> Result<(), SinkError>;

    /// Sink name for logging
    fn name(&self) -> &str;
}
