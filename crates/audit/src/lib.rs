//! # Signet Audit Chain
//!
//! The append-only, linearly hash-chained, signed event log. Every event is
//! sealed by the kernel signer over `SHA-256(C(payload) || prev_hash)`, and
//! the chain can be replayed and re-verified from any point.
//!
//! Appends funnel through a single writer task per chain, so exactly one
//! writer ever observes a given chain tail. Readers (verify, stream, head)
//! go straight to the store and never block the writer.

pub mod archive;
pub mod chain;
pub mod store;

pub use archive::{archive_key, MemorySink};
pub use chain::{verify_range, AuditChain, ChainOptions, VerifyOutcome};
pub use store::memory::MemoryAuditStore;
pub use store::redb::RedbAuditStore;
