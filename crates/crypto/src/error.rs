//! Local error types for the `signet-crypto` crate.

// Re-export the canonical error types from the API crate.
pub use signet_api::error::{CryptoError, SigningError};
