//! # Signet Kernel Cryptography
//!
//! Concrete signature algorithms and the pluggable signing providers built on
//! them. The rest of the workspace consumes this crate exclusively through
//! the traits in `signet-api`: the capability surface in
//! [`signet_api::provider`] and the key traits in [`signet_api::crypto`].

pub mod error;
pub mod hash;
pub mod provider;
pub mod sign;
