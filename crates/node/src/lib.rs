//! # Signet Node
//!
//! Wiring for a running kernel: resolve the [`Config`] from the
//! environment, pick and validate a signing backend, assemble the audit
//! chain and governance coordinator, and keep the background chores
//! (idempotency TTL sweeps) running.
//!
//! [`Config`]: signet_types::config::Config

pub mod builder;
pub mod telemetry;

pub use builder::{build_kernel, Kernel, SigningBackend};
