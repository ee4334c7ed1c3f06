#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Signet Kernel Types
//!
//! This crate is the foundational library for the Signet trust kernel,
//! containing all core data structures, error types, and configuration
//! objects.
//!
//! ## Architectural Role
//!
//! As the base crate, `signet-types` has minimal dependencies and is itself a
//! dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `Manifest`, `AuditEvent`, `SignerRecord`, and the
//! various error enums.

/// A top-level, crate-wide `Result` type alias with a default error type.
pub type Result<T, E = crate::error::KernelError> = std::result::Result<T, E>;

/// The canonical, deterministic byte codec for all signed or hashed values.
pub mod codec;
/// The explicit runtime configuration record, constructed once at startup.
pub mod config;
/// A unified set of all error types used across the kernel.
pub mod error;
/// Core governance data structures: manifests, approvals, signers, audit events.
pub mod model;
