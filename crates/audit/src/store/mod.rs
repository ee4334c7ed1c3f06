//! Audit store backends.
//!
//! Both backends enforce the chain constraints at the row level: gapless
//! sequence numbers, a `prev_hash` that matches the current head, and a
//! single genesis. A caller that loses the tail race gets a conflict, never
//! a fork.

pub mod memory;
pub mod redb;

use signet_api::error::ChainError;
use signet_types::model::{AuditEvent, ChainHead};

/// Validates an incoming event against the current head.
///
/// Shared by every backend so the uniqueness rules cannot drift between
/// them.
pub(crate) fn check_against_head(event: &AuditEvent, head: &ChainHead) -> Result<(), ChainError> {
    if event.seq != head.seq + 1 {
        return Err(ChainError::Conflict(format!(
            "expected seq {}, got {}",
            head.seq + 1,
            event.seq
        )));
    }
    match (&event.prev_hash, head.seq) {
        (None, 0) => Ok(()),
        (None, _) => Err(ChainError::Conflict(
            "second genesis rejected: chain is not empty".into(),
        )),
        (Some(prev), 0) => Err(ChainError::Conflict(format!(
            "prev_hash {} does not match the empty chain",
            hex::encode(prev)
        ))),
        (Some(prev), _) if prev == &head.hash => Ok(()),
        (Some(prev), _) => Err(ChainError::Conflict(format!(
            "prev_hash {} does not match head {}",
            hex::encode(prev),
            hex::encode(&head.hash)
        ))),
    }
}
