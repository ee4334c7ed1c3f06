//! The signing capability surface.
//!
//! A [`SigningProvider`] is the kernel's only path to producing signatures.
//! Three variants exist behind this trait: an in-process local key (dev
//! only), an HTTPS signing proxy, and a cloud KMS reached through the
//! vendor-neutral [`KmsApi`] seam. No inheritance hierarchy: callers hold a
//! `dyn SigningProvider` and nothing else.

use async_trait::async_trait;

use crate::error::SigningError;
use signet_types::model::{SignPurpose, SignatureAlgorithm};

/// A signature as produced by a provider, before it is persisted as a
/// `SignatureRecord` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSignature {
    /// The registered kid that produced the signature.
    pub kid: String,
    /// The algorithm used.
    pub algorithm: SignatureAlgorithm,
    /// Raw signature bytes.
    pub sig: Vec<u8>,
}

/// The capability set {sign_payload, sign_digest, verify, public_key}.
///
/// Every signature is bound to the SHA-256 digest of its canonical payload:
/// `sign_payload` hashes internally, `sign_digest` accepts a digest the
/// caller already computed (the audit chain's append path). Implementations
/// enforce their own deadline and retry transient remote failures exactly
/// once with jittered backoff.
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// The kid this provider signs under.
    fn kid(&self) -> &str;

    /// The algorithm this provider produces.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Signs a canonicalized payload for the given purpose.
    async fn sign_payload(
        &self,
        payload: &[u8],
        purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError>;

    /// Signs a precomputed SHA-256 digest for the given purpose.
    ///
    /// RSA implementations must sign the digest itself (KMS
    /// `MessageType=DIGEST`), never re-hash it.
    async fn sign_digest(
        &self,
        digest: &[u8; 32],
        purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError>;

    /// Verifies a signature this provider (or its key) produced over the
    /// given payload. HMAC comparisons are constant-time.
    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError>;

    /// The provider's public key bytes. Fails for HMAC-only providers, whose
    /// key material never leaves the boundary.
    async fn public_key(&self) -> Result<Vec<u8>, SigningError>;
}

/// The vendor-neutral slice of a cloud KMS the kernel relies on.
///
/// Mirrors the semantics of `Sign` with `MessageType=DIGEST` for asymmetric
/// keys and `GenerateMac` for HMAC keys. Concrete vendor adapters live
/// outside the kernel; tests use an in-process fake.
#[async_trait]
pub trait KmsApi: Send + Sync {
    /// Signs a precomputed SHA-256 digest with the named key.
    async fn sign_digest(
        &self,
        key_id: &str,
        algorithm: SignatureAlgorithm,
        digest: &[u8; 32],
    ) -> Result<Vec<u8>, SigningError>;

    /// Computes an HMAC-SHA256 tag over the full message with the named key.
    async fn generate_mac(&self, key_id: &str, message: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// Fetches the public key of an asymmetric KMS key.
    async fn get_public_key(&self, key_id: &str) -> Result<Vec<u8>, SigningError>;
}
