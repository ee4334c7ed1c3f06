//! ECDSA on P-256 via the `p256` crate.
//!
//! Signs precomputed SHA-256 digests as prehashes. Public keys travel as
//! uncompressed SEC1 points; signatures in fixed 64-byte form.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use signet_api::error::CryptoError;

/// A P-256 signing key pair.
#[derive(Clone)]
pub struct EcdsaKeyPair {
    signing_key: SigningKey,
}

impl EcdsaKeyPair {
    /// Generates a fresh key pair.
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self {
            signing_key: SigningKey::random(&mut OsRng),
        })
    }

    /// Reconstructs a pair from a 32-byte scalar.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        SigningKey::from_slice(bytes)
            .map(|signing_key| Self { signing_key })
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse P-256 key: {e}")))
    }

    /// The private scalar bytes.
    pub fn private_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// The public key as an uncompressed SEC1 point.
    pub fn public_key_sec1(&self) -> Vec<u8> {
        VerifyingKey::from(&self.signing_key)
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Signs a precomputed SHA-256 digest as a prehash.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        let signature: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| CryptoError::OperationFailed(format!("ECDSA signing failed: {e}")))?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Verifies a prehash signature against a SEC1 public key.
pub fn verify_digest(
    public_key_sec1: &[u8],
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let key = VerifyingKey::from_sec1_bytes(public_key_sec1)
        .map_err(|e| CryptoError::InvalidKey(format!("failed to parse SEC1 public key: {e}")))?;
    let sig = match Signature::from_slice(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    Ok(key.verify_prehash(digest, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn prehash_roundtrip() {
        let pair = EcdsaKeyPair::generate().unwrap();
        let digest = sha256(b"chain head digest");
        let sig = pair.sign_digest(&digest).unwrap();
        let pk = pair.public_key_sec1();

        assert!(verify_digest(&pk, &digest, &sig).unwrap());
        assert!(!verify_digest(&pk, &sha256(b"tampered"), &sig).unwrap());
    }

    #[test]
    fn private_key_serialization_roundtrip() {
        let pair = EcdsaKeyPair::generate().unwrap();
        let restored = EcdsaKeyPair::from_private_bytes(&pair.private_bytes()).unwrap();
        assert_eq!(pair.public_key_sec1(), restored.public_key_sec1());
    }
}
