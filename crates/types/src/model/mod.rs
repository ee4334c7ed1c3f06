//! Core governance data structures.
//!
//! Every cross-component reference in this module is an opaque ID (`kid`,
//! `manifest_id`, `signature_id`, audit `seq`), never an in-memory pointer:
//! rows are looked up in their owning store by key.

mod audit;
mod idempotency;
mod manifest;
mod signer;

pub use audit::{event_type, AuditEvent, ChainFailure, ChainFailureReason, ChainHead};
pub use idempotency::{IdempotencyRecord, Reservation};
pub use manifest::{Approval, ApprovalDecision, Impact, Manifest, ManifestStatus};
pub use signer::{PayloadRef, SignPurpose, SignatureAlgorithm, SignatureRecord, SignerRecord};
