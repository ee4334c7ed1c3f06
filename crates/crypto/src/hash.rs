//! Cryptographic hash functions.

use sha2::{Digest, Sha256};

/// Create a SHA-256 hash of any type that can be referenced as bytes.
pub fn sha256<T: AsRef<[u8]>>(data: T) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hasher.finalize().into()
}

/// The chain digest: SHA-256 over the canonical payload concatenated with
/// the previous event's hash (empty bytes at genesis).
pub fn chain_digest(canonical_payload: &[u8], prev_hash: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(canonical_payload);
    hasher.update(prev_hash);
    hasher.finalize().into()
}
