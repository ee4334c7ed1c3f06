//! The in-memory audit store.

use parking_lot::RwLock;

use signet_api::error::ChainError;
use signet_api::store::AuditStore;
use signet_types::model::{AuditEvent, ChainHead};

use super::check_against_head;

/// A chain held in process memory. The backing vector is the chain itself:
/// index `i` holds seq `i + 1`.
#[derive(Default)]
pub struct MemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditStore {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Test support: mutates a stored event in place, bypassing the
    /// append-only rule, so verification tests can simulate storage
    /// tampering.
    pub fn tamper(&self, seq: u64, mutate: impl FnOnce(&mut AuditEvent)) -> bool {
        let mut events = self.events.write();
        match seq
            .checked_sub(1)
            .and_then(|i| events.get_mut(i as usize))
        {
            Some(event) => {
                mutate(event);
                true
            }
            None => false,
        }
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, event: AuditEvent) -> Result<(), ChainError> {
        let mut events = self.events.write();
        let head = match events.last() {
            Some(last) => ChainHead {
                seq: last.seq,
                hash: last.hash.clone(),
            },
            None => ChainHead::empty(),
        };
        check_against_head(&event, &head)?;
        events.push(event);
        Ok(())
    }

    fn head(&self) -> Result<ChainHead, ChainError> {
        let events = self.events.read();
        Ok(match events.last() {
            Some(last) => ChainHead {
                seq: last.seq,
                hash: last.hash.clone(),
            },
            None => ChainHead::empty(),
        })
    }

    fn get(&self, seq: u64) -> Result<Option<AuditEvent>, ChainError> {
        let events = self.events.read();
        Ok(seq
            .checked_sub(1)
            .and_then(|i| events.get(i as usize))
            .cloned())
    }

    fn range(&self, from: u64, to: u64) -> Result<Vec<AuditEvent>, ChainError> {
        let events = self.events.read();
        Ok(events
            .iter()
            .filter(|e| e.seq >= from && e.seq <= to)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(seq: u64, prev_hash: Option<Vec<u8>>) -> AuditEvent {
        AuditEvent {
            seq,
            event_type: "test.event".into(),
            payload: json!({"seq": seq}),
            prev_hash,
            hash: vec![seq as u8; 32],
            signature: vec![1, 2, 3],
            signer_kid: "test-kid".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn gapless_appends_advance_the_head() {
        let store = MemoryAuditStore::new();
        store.append(event(1, None)).unwrap();
        store.append(event(2, Some(vec![1u8; 32]))).unwrap();

        let head = store.head().unwrap();
        assert_eq!(head.seq, 2);
        assert_eq!(head.hash, vec![2u8; 32]);
        assert_eq!(store.range(1, 10).unwrap().len(), 2);
    }

    #[test]
    fn losing_the_tail_race_is_a_conflict_not_a_fork() {
        let store = MemoryAuditStore::new();
        store.append(event(1, None)).unwrap();

        // Two writers both built an event on top of seq 1.
        store.append(event(2, Some(vec![1u8; 32]))).unwrap();
        let lost = store.append(event(2, Some(vec![1u8; 32])));
        assert!(matches!(lost, Err(ChainError::Conflict(_))));
        assert_eq!(store.head().unwrap().seq, 2);
    }

    #[test]
    fn second_genesis_is_rejected() {
        let store = MemoryAuditStore::new();
        store.append(event(1, None)).unwrap();
        let second = store.append(event(2, None));
        assert!(matches!(second, Err(ChainError::Conflict(_))));
    }
}
