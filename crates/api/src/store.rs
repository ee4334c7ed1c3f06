//! Typed persistence seams.
//!
//! The kernel specifies storage as dyn-safe traits with the same uniqueness
//! constraints a relational schema would encode (unique `prev_hash`/`hash`,
//! unique `(manifest_id, approver_id)`, primary-keyed kid and idempotency
//! key, single genesis). Backends are interchangeable; the workspace ships
//! in-memory implementations for every trait and a `redb`-backed audit store.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{ChainError, GovernanceError, IdempotencyError, RegistryError};
use signet_types::model::{AuditEvent, ChainHead, Manifest, Reservation, SignerRecord};

/// Persistence for registered signers.
///
/// Rows are never deleted; retirement is a metadata update.
pub trait SignerStore: Send + Sync {
    /// Inserts a new signer row. Fails with `KidConflict` if the kid exists
    /// (the registry layer decides whether an upsert is idempotent).
    fn insert(&self, record: SignerRecord) -> Result<(), RegistryError>;

    /// Fetches a signer by kid.
    fn get(&self, kid: &str) -> Result<Option<SignerRecord>, RegistryError>;

    /// All signers, ordered by `created_at` descending.
    fn list(&self) -> Result<Vec<SignerRecord>, RegistryError>;

    /// Marks a signer retired. Idempotent; fails with `NotFound` for an
    /// unknown kid.
    fn mark_retired(&self, kid: &str, at: DateTime<Utc>) -> Result<SignerRecord, RegistryError>;
}

/// Persistence for one audit chain.
///
/// `append` is the integrity boundary: implementations must reject a row
/// whose `seq` is not exactly `head.seq + 1`, whose `prev_hash` duplicates an
/// existing link, or that would create a second genesis.
pub trait AuditStore: Send + Sync {
    /// Appends one event, enforcing the chain uniqueness constraints.
    fn append(&self, event: AuditEvent) -> Result<(), ChainError>;

    /// The current chain head; `ChainHead::empty()` for an empty chain.
    fn head(&self) -> Result<ChainHead, ChainError>;

    /// Fetches one event by sequence number.
    fn get(&self, seq: u64) -> Result<Option<AuditEvent>, ChainError>;

    /// Fetches events with `from <= seq <= to`, ascending. Missing rows at
    /// the tail are not an error; the result simply ends early.
    fn range(&self, from: u64, to: u64) -> Result<Vec<AuditEvent>, ChainError>;
}

/// Persistence for manifests and their embedded approvals.
pub trait ManifestStore: Send + Sync {
    /// Inserts a new manifest. Fails with `Validation` if the id exists.
    fn insert(&self, manifest: Manifest) -> Result<(), GovernanceError>;

    /// Fetches a manifest by id.
    fn get(&self, id: &str) -> Result<Option<Manifest>, GovernanceError>;

    /// Applies a closure to the manifest row under the store's write lock,
    /// persisting the result. This is the serialization point for state
    /// machine transitions: concurrent approvals on one manifest observe
    /// each other's writes.
    fn update(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut Manifest) -> Result<(), GovernanceError>,
    ) -> Result<Manifest, GovernanceError>;
}

/// Persistence for idempotency reservations.
pub trait IdempotencyStore: Send + Sync {
    /// Atomically reserves a key for a principal (compare-and-set). First
    /// reserve wins; a replay by the owning principal returns the finalized
    /// record or a pending marker; any other principal conflicts.
    fn reserve(&self, key: &str, principal_id: &str) -> Result<Reservation, IdempotencyError>;

    /// Records the final response for a reserved key.
    fn finalize(
        &self,
        key: &str,
        principal_id: &str,
        status_code: u16,
        response: Value,
    ) -> Result<(), IdempotencyError>;

    /// Drops a failed reservation so the same principal can retry.
    fn release(&self, key: &str, principal_id: &str) -> Result<(), IdempotencyError>;

    /// Removes records older than the TTL. Returns how many were dropped.
    fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, IdempotencyError>;
}
