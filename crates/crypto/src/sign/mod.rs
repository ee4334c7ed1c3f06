//! Signature algorithm implementations.
//!
//! ## Digest convention
//!
//! Every kernel signature is bound to the SHA-256 digest of its canonical
//! payload:
//!
//! * `rsa-pkcs1-sha256` / `rsa-pss-sha256` sign the precomputed digest
//!   directly (the KMS `MessageType=DIGEST` path), never re-hashing it.
//! * `ecdsa-p256-sha256` signs the digest as a prehash.
//! * `ed25519` treats the 32-byte digest as its message (Ed25519 hashes
//!   internally).
//! * `hmac-sha256` tags the canonical payload itself, matching the KMS
//!   `GenerateMac` contract; when only a digest is available the tag covers
//!   the digest bytes. Comparison is constant-time in all paths.

pub mod ecdsa;
pub mod ed25519;
pub mod hmac;
pub mod rsa;

use signet_api::error::CryptoError;
use signet_types::model::SignatureAlgorithm;

use crate::hash::sha256;

/// Verifies a signature over a precomputed SHA-256 digest using raw key
/// material from the signer registry.
///
/// For HMAC signers `key_material` is the shared secret and the tag must
/// cover the digest bytes; for everything else it is the public key in the
/// algorithm's serialized form (raw 32 bytes for Ed25519, DER for RSA,
/// SEC1 for P-256).
pub fn verify_digest(
    algorithm: SignatureAlgorithm,
    key_material: &[u8],
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    match algorithm {
        SignatureAlgorithm::Ed25519 => ed25519::verify(key_material, digest, signature),
        SignatureAlgorithm::RsaPkcs1Sha256 => {
            rsa::verify_digest(rsa::RsaScheme::Pkcs1, key_material, digest, signature)
        }
        SignatureAlgorithm::RsaPssSha256 => {
            rsa::verify_digest(rsa::RsaScheme::Pss, key_material, digest, signature)
        }
        SignatureAlgorithm::EcdsaP256Sha256 => ecdsa::verify_digest(key_material, digest, signature),
        SignatureAlgorithm::HmacSha256 => hmac::verify(key_material, digest, signature),
    }
}

/// Verifies a signature over a canonical payload using raw key material.
///
/// Computes the payload digest and defers to [`verify_digest`], except for
/// HMAC where the tag covers the payload itself.
pub fn verify_payload(
    algorithm: SignatureAlgorithm,
    key_material: &[u8],
    payload: &[u8],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    if algorithm == SignatureAlgorithm::HmacSha256 {
        return hmac::verify(key_material, payload, signature);
    }
    let digest = sha256(payload);
    verify_digest(algorithm, key_material, &digest, signature)
}
