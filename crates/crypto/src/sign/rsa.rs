//! RSA digest signing via the `rsa` crate.
//!
//! Both padding schemes sign a precomputed SHA-256 digest, mirroring the KMS
//! `MessageType=DIGEST` contract. Public keys travel as SubjectPublicKeyInfo
//! DER.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use signet_api::error::CryptoError;

/// RSA modulus size used for generated keys.
const RSA_BITS: usize = 2048;

/// The two supported RSA signature schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaScheme {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Pkcs1,
    /// RSASSA-PSS with SHA-256.
    Pss,
}

/// An RSA key pair bound to one signature scheme.
#[derive(Clone)]
pub struct RsaKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    scheme: RsaScheme,
}

impl RsaKeyPair {
    /// Generates a fresh 2048-bit key pair.
    pub fn generate(scheme: RsaScheme) -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| CryptoError::OperationFailed(format!("RSA key generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
            scheme,
        })
    }

    /// The scheme this pair signs with.
    pub fn scheme(&self) -> RsaScheme {
        self.scheme
    }

    /// The public key as SubjectPublicKeyInfo DER.
    pub fn public_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        self.public_key
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidKey(format!("DER encoding failed: {e}")))
    }

    /// Signs a precomputed SHA-256 digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        match self.scheme {
            RsaScheme::Pkcs1 => self
                .private_key
                .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
                .map_err(|e| CryptoError::OperationFailed(format!("PKCS1 signing failed: {e}"))),
            RsaScheme::Pss => self
                .private_key
                .sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), digest)
                .map_err(|e| CryptoError::OperationFailed(format!("PSS signing failed: {e}"))),
        }
    }
}

/// Verifies a signature over a precomputed digest against a DER public key.
pub fn verify_digest(
    scheme: RsaScheme,
    public_key_der: &[u8],
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<bool, CryptoError> {
    let public_key = RsaPublicKey::from_public_key_der(public_key_der)
        .map_err(|e| CryptoError::InvalidKey(format!("failed to parse DER public key: {e}")))?;
    let verified = match scheme {
        RsaScheme::Pkcs1 => public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature)
            .is_ok(),
        RsaScheme::Pss => public_key
            .verify(Pss::new::<Sha256>(), digest, signature)
            .is_ok(),
    };
    Ok(verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn pkcs1_digest_roundtrip() {
        let pair = RsaKeyPair::generate(RsaScheme::Pkcs1).unwrap();
        let digest = sha256(b"manifest bytes");
        let sig = pair.sign_digest(&digest).unwrap();
        let der = pair.public_key_der().unwrap();

        assert!(verify_digest(RsaScheme::Pkcs1, &der, &digest, &sig).unwrap());
        let other = sha256(b"other bytes");
        assert!(!verify_digest(RsaScheme::Pkcs1, &der, &other, &sig).unwrap());
    }

    #[test]
    fn pss_digest_roundtrip() {
        let pair = RsaKeyPair::generate(RsaScheme::Pss).unwrap();
        let digest = sha256(b"audit digest");
        let sig = pair.sign_digest(&digest).unwrap();
        let der = pair.public_key_der().unwrap();

        assert!(verify_digest(RsaScheme::Pss, &der, &digest, &sig).unwrap());
        // PSS and PKCS1 signatures are not interchangeable.
        assert!(!verify_digest(RsaScheme::Pkcs1, &der, &digest, &sig).unwrap());
    }
}
