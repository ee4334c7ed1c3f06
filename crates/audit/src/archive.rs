//! Out-of-band archival of committed events to WORM storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use signet_api::archive::ArchivalSink;
use signet_api::error::ChainError;
use signet_types::model::AuditEvent;

/// Attempts per event before giving up and logging.
const ARCHIVE_ATTEMPTS: u32 = 3;

/// The object key for an archived event: `YYYY/MM/DD/<event_id>.json`,
/// where the event id is the zero-padded chain sequence number.
pub fn archive_key(event: &AuditEvent) -> String {
    format!(
        "{}/{:010}.json",
        event.created_at.format("%Y/%m/%d"),
        event.seq
    )
}

/// Spawns the archiver task and returns its feed.
///
/// Archival never blocks or rolls back an append: the writer pushes
/// committed events into an unbounded queue and moves on. Failed writes are
/// retried a few times with backoff, then logged and dropped; the chain row
/// remains the source of truth.
pub(crate) fn spawn_archiver(sink: Arc<dyn ArchivalSink>) -> mpsc::UnboundedSender<AuditEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AuditEvent>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let key = archive_key(&event);
            let mut attempt = 0u32;
            loop {
                match sink.archive(&key, &event).await {
                    Ok(()) => break,
                    Err(e) if attempt + 1 < ARCHIVE_ATTEMPTS => {
                        attempt += 1;
                        tracing::warn!(%key, attempt, error = %e, "archive write failed, retrying");
                        tokio::time::sleep(Duration::from_millis(100u64 << attempt)).await;
                    }
                    Err(e) => {
                        tracing::error!(%key, error = %e, "archive write abandoned");
                        break;
                    }
                }
            }
        }
    });
    tx
}

/// An in-memory sink for tests and local development.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, AuditEvent)>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The archived entries in arrival order.
    pub fn entries(&self) -> Vec<(String, AuditEvent)> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl ArchivalSink for MemorySink {
    async fn archive(&self, key: &str, event: &AuditEvent) -> Result<(), ChainError> {
        self.entries.lock().push((key.to_string(), event.clone()));
        Ok(())
    }
}
