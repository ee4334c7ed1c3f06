//! The cloud-KMS signing provider.
//!
//! Vendor adapters implement [`KmsApi`]; this provider holds the calling
//! convention. Asymmetric keys sign precomputed SHA-256 digests (the
//! `Sign` + `MessageType=DIGEST` path; RSA keys in particular must never
//! re-hash), HMAC keys tag the full message via `GenerateMac`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tokio::sync::OnceCell;

use signet_api::error::{CryptoError, SigningError};
use signet_api::provider::{KmsApi, ProviderSignature, SigningProvider};
use signet_types::model::{SignPurpose, SignatureAlgorithm};

use super::call_with_retry;
use crate::hash::sha256;
use crate::sign::verify_digest;

/// A signing provider backed by a cloud KMS key.
pub struct KmsProvider {
    kms: Arc<dyn KmsApi>,
    /// The vendor-side key identifier (ARN, resource name, …).
    key_id: String,
    /// The registry kid this key signs under.
    kid: String,
    algorithm: SignatureAlgorithm,
    timeout: Duration,
    max_retries: u32,
    cached_public_key: OnceCell<Vec<u8>>,
}

impl KmsProvider {
    /// Builds a provider over a vendor adapter.
    pub fn new(
        kms: Arc<dyn KmsApi>,
        key_id: impl Into<String>,
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            kms,
            key_id: key_id.into(),
            kid: kid.into(),
            algorithm,
            timeout,
            max_retries,
            cached_public_key: OnceCell::new(),
        }
    }

    fn wrap(&self, sig: Vec<u8>) -> ProviderSignature {
        ProviderSignature {
            kid: self.kid.clone(),
            algorithm: self.algorithm,
            sig,
        }
    }
}

#[async_trait]
impl SigningProvider for KmsProvider {
    fn kid(&self) -> &str {
        &self.kid
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    async fn sign_payload(
        &self,
        payload: &[u8],
        purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError> {
        if self.algorithm == SignatureAlgorithm::HmacSha256 {
            let sig = call_with_retry(self.timeout, self.max_retries, || {
                self.kms.generate_mac(&self.key_id, payload)
            })
            .await?;
            return Ok(self.wrap(sig));
        }
        self.sign_digest(&sha256(payload), purpose).await
    }

    async fn sign_digest(
        &self,
        digest: &[u8; 32],
        _purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError> {
        let sig = if self.algorithm == SignatureAlgorithm::HmacSha256 {
            call_with_retry(self.timeout, self.max_retries, || {
                self.kms.generate_mac(&self.key_id, digest)
            })
            .await?
        } else {
            call_with_retry(self.timeout, self.max_retries, || {
                self.kms.sign_digest(&self.key_id, self.algorithm, digest)
            })
            .await?
        };
        Ok(self.wrap(sig))
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        if self.algorithm == SignatureAlgorithm::HmacSha256 {
            // Recompute the tag remotely and compare in constant time; the
            // secret never leaves the KMS boundary.
            let expected = call_with_retry(self.timeout, self.max_retries, || {
                self.kms.generate_mac(&self.key_id, payload)
            })
            .await?;
            return Ok(bool::from(expected.ct_eq(signature)));
        }
        let public_key = self.public_key().await?;
        let digest = sha256(payload);
        Ok(verify_digest(
            self.algorithm,
            &public_key,
            &digest,
            signature,
        )?)
    }

    async fn public_key(&self) -> Result<Vec<u8>, SigningError> {
        if self.algorithm == SignatureAlgorithm::HmacSha256 {
            return Err(SigningError::Crypto(CryptoError::Unsupported(
                "HMAC KMS keys have no public key".into(),
            )));
        }
        self.cached_public_key
            .get_or_try_init(|| async {
                call_with_retry(self.timeout, self.max_retries, || {
                    self.kms.get_public_key(&self.key_id)
                })
                .await
            })
            .await
            .map(|key| key.clone())
    }
}
