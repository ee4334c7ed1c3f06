//! At-most-once submission bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A finalized idempotency row: the response snapshot replayed to retries.
///
/// The row is bound to the principal that first presented the key; a replay by
/// anyone else is a conflict. Rows expire after the configured TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Client-chosen idempotency key.
    pub key: String,
    /// The principal the key is bound to.
    pub principal_id: String,
    /// HTTP-shaped status of the original outcome.
    pub status_code: u16,
    /// The original response body, replayed verbatim.
    pub response: Value,
    /// When the key was first reserved.
    pub created_at: DateTime<Utc>,
}

/// The outcome of reserving an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// The key is fresh; the caller owns the operation and must finalize.
    New,
    /// The key was already finalized by the same principal; replay this.
    Existing(IdempotencyRecord),
    /// The key is reserved but the original operation has not finished.
    /// The caller must await the original completion or retry later.
    Pending,
}
