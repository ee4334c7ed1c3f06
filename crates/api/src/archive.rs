//! The WORM archival sink fed by the audit chain after commit.

use async_trait::async_trait;

use crate::error::ChainError;
use signet_types::model::AuditEvent;

/// A write-once sink for committed audit events.
///
/// Archival runs out-of-band: a failed archive never rolls back the append
/// that produced the event, and the archiver retries on its own schedule.
/// Production sinks write object-locked storage keyed
/// `YYYY/MM/DD/<event_id>.json`.
#[async_trait]
pub trait ArchivalSink: Send + Sync {
    /// Writes one event under the given key.
    async fn archive(&self, key: &str, event: &AuditEvent) -> Result<(), ChainError>;
}
