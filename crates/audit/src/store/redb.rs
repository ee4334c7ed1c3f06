//! The `redb`-backed durable audit store.
//!
//! One database file per chain, two tables: the event rows keyed by seq, and
//! a single-row meta table holding the chain head. Head updates happen in
//! the same write transaction as the row insert, so the head can never drift
//! from the rows.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use signet_api::error::ChainError;
use signet_api::store::AuditStore;
use signet_types::model::{AuditEvent, ChainHead};

use super::check_against_head;

const EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_events");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("chain_meta");

const HEAD_KEY: &str = "head";

fn backend<E: std::fmt::Display>(e: E) -> ChainError {
    ChainError::Backend(e.to_string())
}

/// A durable audit chain in a single `redb` file.
pub struct RedbAuditStore {
    db: Database,
}

impl RedbAuditStore {
    /// Opens (or creates) the chain database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        // Ensure tables exist so reads never race table creation.
        let txn = db.begin_write().map_err(backend)?;
        {
            txn.open_table(EVENTS).map_err(backend)?;
            txn.open_table(META).map_err(backend)?;
        }
        txn.commit().map_err(backend)?;
        Ok(Self { db })
    }

    fn read_head(table: &impl ReadableTable<&'static str, &'static [u8]>) -> Result<ChainHead, ChainError> {
        match table.get(HEAD_KEY).map_err(backend)? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(backend),
            None => Ok(ChainHead::empty()),
        }
    }
}

impl AuditStore for RedbAuditStore {
    fn append(&self, event: AuditEvent) -> Result<(), ChainError> {
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut events = txn.open_table(EVENTS).map_err(backend)?;
            let mut meta = txn.open_table(META).map_err(backend)?;

            let head = Self::read_head(&meta)?;
            check_against_head(&event, &head)?;

            let row = serde_json::to_vec(&event).map_err(backend)?;
            events.insert(event.seq, row.as_slice()).map_err(backend)?;

            let new_head = ChainHead {
                seq: event.seq,
                hash: event.hash.clone(),
            };
            let head_row = serde_json::to_vec(&new_head).map_err(backend)?;
            meta.insert(HEAD_KEY, head_row.as_slice()).map_err(backend)?;
        }
        txn.commit().map_err(backend)
    }

    fn head(&self) -> Result<ChainHead, ChainError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let meta = txn.open_table(META).map_err(backend)?;
        Self::read_head(&meta)
    }

    fn get(&self, seq: u64) -> Result<Option<AuditEvent>, ChainError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let events = txn.open_table(EVENTS).map_err(backend)?;
        let result = match events.get(seq).map_err(backend)? {
            Some(guard) => serde_json::from_slice(guard.value())
                .map(Some)
                .map_err(backend),
            None => Ok(None),
        };
        result
    }

    fn range(&self, from: u64, to: u64) -> Result<Vec<AuditEvent>, ChainError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let events = txn.open_table(EVENTS).map_err(backend)?;
        let mut out = Vec::new();
        for entry in events.range(from..=to).map_err(backend)? {
            let (_, value) = entry.map_err(backend)?;
            out.push(serde_json::from_slice(value.value()).map_err(backend)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::tempdir;

    fn event(seq: u64, prev_hash: Option<Vec<u8>>) -> AuditEvent {
        AuditEvent {
            seq,
            event_type: "test.event".into(),
            payload: json!({"seq": seq}),
            prev_hash,
            hash: vec![seq as u8; 32],
            signature: vec![9, 9, 9],
            signer_kid: "test-kid".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rows_and_head_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chain.redb");

        {
            let store = RedbAuditStore::open(&path).unwrap();
            store.append(event(1, None)).unwrap();
            store.append(event(2, Some(vec![1u8; 32]))).unwrap();
        }

        let store = RedbAuditStore::open(&path).unwrap();
        assert_eq!(store.head().unwrap().seq, 2);
        let rows = store.range(1, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].payload, json!({"seq": 2}));
    }

    #[test]
    fn tail_conflicts_are_rejected_durably() {
        let dir = tempdir().unwrap();
        let store = RedbAuditStore::open(dir.path().join("chain.redb")).unwrap();

        store.append(event(1, None)).unwrap();
        assert!(matches!(
            store.append(event(2, Some(vec![7u8; 32]))),
            Err(ChainError::Conflict(_))
        ));
        assert_eq!(store.head().unwrap().seq, 1);
    }
}
