//! # Signet Kernel API Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! # Signet Kernel API
//!
//! Core traits and interfaces for the Signet trust kernel. This crate defines
//! the stable contract between the governance coordinator and every pluggable
//! component: signing providers, stores, the policy gate, and the audit
//! archival sink.

/// The WORM archival sink consumed by the audit chain after commit.
pub mod archive;
/// Unified traits for cryptographic keys and signatures.
pub mod crypto;
/// Re-exports all core error types from the central `signet-types` crate.
pub mod error;
/// The allow/deny decision point consulted before manifest application.
pub mod policy;
/// The signing capability surface and its provider/KMS seams.
pub mod provider;
/// Typed persistence seams for signers, manifests, events, and idempotency.
pub mod store;

/// A curated set of the most commonly used traits and types.
pub mod prelude {
    pub use crate::archive::ArchivalSink;
    pub use crate::crypto::{
        SerializableKey, Signature, SigningKey, SigningKeyPair, VerifyingKey,
    };
    pub use crate::error::{
        ChainError, ConfigError, CryptoError, EncodingError, ErrorCode, GovernanceError,
        IdempotencyError, RegistryError, SigningError,
    };
    pub use crate::policy::{PolicyDecision, PolicyGate, PolicyQuery};
    pub use crate::provider::{KmsApi, ProviderSignature, SigningProvider};
    pub use crate::store::{AuditStore, IdempotencyStore, ManifestStore, SignerStore};
}
