//! The hash-chained, signed audit event row and its verification vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{base64_bytes, base64_bytes_opt};

/// Well-known audit event types emitted by the kernel.
///
/// Downstream services extend the namespace with their own dotted types; the
/// chain itself treats the type as an opaque label.
pub mod event_type {
    /// A manifest submission was accepted and persisted as a draft.
    pub const MANIFEST_SUBMITTED: &str = "manifest.submitted";
    /// A manifest's canonical bytes were signed.
    pub const MANIFEST_SIGNED: &str = "manifest.signed";
    /// Multisig was requested for a manifest.
    pub const MANIFEST_MULTISIG_REQUESTED: &str = "manifest.multisig_requested";
    /// An approval (or rejection) was recorded.
    pub const MANIFEST_APPROVAL_RECORDED: &str = "manifest.approval.recorded";
    /// The approval threshold was met.
    pub const MANIFEST_MULTISIG_COMPLETE: &str = "manifest.multisig_complete";
    /// A manifest was applied.
    pub const MANIFEST_APPLIED: &str = "manifest.applied";
    /// A manifest was rejected.
    pub const MANIFEST_REJECTED: &str = "manifest.rejected";
    /// The policy gate refused an apply.
    pub const MANIFEST_BLOCKED: &str = "manifest.blocked";
    /// A signer was registered.
    pub const SIGNER_REGISTERED: &str = "signer.registered";
    /// A signer was retired.
    pub const SIGNER_RETIRED: &str = "signer.retired";
}

/// One event in an audit chain.
///
/// `hash = SHA-256(C(payload) || prev_hash)` with empty previous bytes at
/// genesis, and `signature` covers `hash`. Rows are append-only and never
/// mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 1, strictly gapless.
    pub seq: u64,
    /// Dotted event type label.
    pub event_type: String,
    /// Structured event payload; hashed in canonical form.
    pub payload: Value,
    /// Hash of the previous event; `None` only for the genesis event.
    #[serde(default, with = "base64_bytes_opt")]
    pub prev_hash: Option<Vec<u8>>,
    /// SHA-256 over the canonical payload concatenated with `prev_hash`.
    #[serde(with = "base64_bytes")]
    pub hash: Vec<u8>,
    /// Signature over `hash` by `signer_kid`.
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// The signer that signed this event.
    pub signer_kid: String,
    /// When the event was committed.
    pub created_at: DateTime<Utc>,
}

/// The most recent position of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    /// Sequence number of the newest event; 0 when the chain is empty.
    pub seq: u64,
    /// Hash of the newest event; empty when the chain is empty.
    #[serde(with = "base64_bytes")]
    pub hash: Vec<u8>,
}

impl ChainHead {
    /// The head of an empty chain.
    pub fn empty() -> Self {
        Self {
            seq: 0,
            hash: Vec::new(),
        }
    }
}

/// Why verification rejected a particular event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFailureReason {
    /// Recomputed digest differs from the stored `hash`.
    HashMismatch,
    /// `prev_hash` does not equal the previous event's `hash`.
    PrevLinkBroken,
    /// The stored signature does not verify against the stored `hash`.
    SignatureInvalid,
    /// The event's `signer_kid` is not in the registry.
    SignerUnknown,
    /// More than one event claims to be genesis.
    DuplicateGenesis,
}

impl std::fmt::Display for ChainFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::HashMismatch => "hash_mismatch",
            Self::PrevLinkBroken => "prev_link_broken",
            Self::SignatureInvalid => "signature_invalid",
            Self::SignerUnknown => "signer_unknown",
            Self::DuplicateGenesis => "duplicate_genesis",
        };
        f.write_str(s)
    }
}

/// The location and cause of a verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainFailure {
    /// Sequence number of the offending event.
    pub seq: u64,
    /// What was wrong with it.
    pub reason: ChainFailureReason,
}

impl std::fmt::Display for ChainFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event {} failed verification: {}", self.seq, self.reason)
    }
}
