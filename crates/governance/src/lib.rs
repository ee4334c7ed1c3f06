//! # Signet Governance
//!
//! The manifest governance plane: the signer registry service, the
//! idempotency store, the manifest store with its state machine, the policy
//! gate, and the coordinator that orchestrates
//! submit → sign → multisig → apply with audit emissions along the way.

pub mod coordinator;
pub mod idempotency;
pub mod manifest;
pub mod policy;
pub mod registry;

pub use coordinator::{
    ApproveResponse, ApplyResponse, GovernanceCoordinator, MultisigResponse, SubmitRequest,
    SubmitResponse,
};
pub use idempotency::MemoryIdempotencyStore;
pub use manifest::MemoryManifestStore;
pub use policy::{DisabledGate, HttpPolicyGate, StaticGate};
pub use registry::{MemorySignerStore, SignerRegistry};
