//! Re-exports of the canonical error types from `signet-types`.
//!
//! Components depend on this crate for their trait contracts; re-exporting
//! the error enums here keeps their `use` lists pointed at one place.

pub use signet_types::error::{
    ChainError, ConfigError, CryptoError, EncodingError, ErrorCode, GovernanceError,
    IdempotencyError, KernelError, RegistryError, SigningError,
};
