//! The in-memory idempotency store.
//!
//! `reserve` is a compare-and-set under one lock: the first caller to
//! present a key owns it and everyone else observes that claim. Records are
//! bound to the reserving principal and expire after the configured TTL.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use signet_api::error::IdempotencyError;
use signet_api::store::IdempotencyStore;
use signet_types::model::{IdempotencyRecord, Reservation};

enum Entry {
    Pending {
        principal_id: String,
        created_at: DateTime<Utc>,
    },
    Finalized(IdempotencyRecord),
}

impl Entry {
    fn principal_id(&self) -> &str {
        match self {
            Entry::Pending { principal_id, .. } => principal_id,
            Entry::Finalized(record) => &record.principal_id,
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        match self {
            Entry::Pending { created_at, .. } => *created_at,
            Entry::Finalized(record) => record.created_at,
        }
    }
}

/// An in-memory idempotency table.
#[derive(Default)]
pub struct MemoryIdempotencyStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryIdempotencyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn reserve(&self, key: &str, principal_id: &str) -> Result<Reservation, IdempotencyError> {
        let mut entries = self.entries.lock();
        let claim = match entries.get(key) {
            None => None,
            Some(entry) if entry.principal_id() != principal_id => {
                return Err(IdempotencyError::Conflict {
                    key: key.to_string(),
                })
            }
            Some(Entry::Pending { .. }) => Some(Reservation::Pending),
            Some(Entry::Finalized(record)) => Some(Reservation::Existing(record.clone())),
        };
        if let Some(existing) = claim {
            return Ok(existing);
        }
        entries.insert(
            key.to_string(),
            Entry::Pending {
                principal_id: principal_id.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(Reservation::New)
    }

    fn finalize(
        &self,
        key: &str,
        principal_id: &str,
        status_code: u16,
        response: Value,
    ) -> Result<(), IdempotencyError> {
        let mut entries = self.entries.lock();
        let created_at = match entries.get(key) {
            Some(entry) if entry.principal_id() == principal_id => entry.created_at(),
            Some(_) => {
                return Err(IdempotencyError::Conflict {
                    key: key.to_string(),
                })
            }
            None => {
                return Err(IdempotencyError::Backend(format!(
                    "finalize of unreserved key '{key}'"
                )))
            }
        };
        entries.insert(
            key.to_string(),
            Entry::Finalized(IdempotencyRecord {
                key: key.to_string(),
                principal_id: principal_id.to_string(),
                status_code,
                response,
                created_at,
            }),
        );
        Ok(())
    }

    fn release(&self, key: &str, principal_id: &str) -> Result<(), IdempotencyError> {
        let mut entries = self.entries.lock();
        // Only the owning principal may drop its own pending reservation;
        // finalized records stay for replay until they expire.
        let owned_pending = matches!(
            entries.get(key),
            Some(Entry::Pending { principal_id: owner, .. }) if owner == principal_id
        );
        if owned_pending {
            entries.remove(key);
        }
        Ok(())
    }

    fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, IdempotencyError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at() >= cutoff);
        Ok(before - entries.len())
    }
}
