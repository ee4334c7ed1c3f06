//! The in-process signing provider.
//!
//! Holds a private key in process memory. For development and tests only:
//! production deployments set `REQUIRE_KMS` and never construct one. When
//! used as a dev fallback the kid is derived from the key material so
//! verifiers can tell local signatures apart.

use std::fs;
use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use rand::RngCore;
use zeroize::Zeroizing;

use signet_api::crypto::{SerializableKey, SigningKeyPair};
use signet_api::error::{CryptoError, SigningError};
use signet_api::provider::{ProviderSignature, SigningProvider};
use signet_types::model::{SignPurpose, SignatureAlgorithm};

use crate::hash::sha256;
use crate::sign::ecdsa::EcdsaKeyPair;
use crate::sign::ed25519::{Ed25519KeyPair, Ed25519PrivateKey};
use crate::sign::rsa::{RsaKeyPair, RsaScheme};
use crate::sign::{hmac, verify_payload};

/// Private key material for one local signer.
pub enum LocalKeyMaterial {
    /// An Ed25519 key pair.
    Ed25519(Ed25519KeyPair),
    /// An RSA key pair (scheme carried inside).
    Rsa(RsaKeyPair),
    /// A P-256 key pair.
    EcdsaP256(EcdsaKeyPair),
    /// An HMAC shared secret.
    Hmac(Zeroizing<Vec<u8>>),
}

impl LocalKeyMaterial {
    /// Generates fresh material for the given algorithm.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self, CryptoError> {
        match algorithm {
            SignatureAlgorithm::Ed25519 => Ed25519KeyPair::generate().map(Self::Ed25519),
            SignatureAlgorithm::RsaPkcs1Sha256 => {
                RsaKeyPair::generate(RsaScheme::Pkcs1).map(Self::Rsa)
            }
            SignatureAlgorithm::RsaPssSha256 => {
                RsaKeyPair::generate(RsaScheme::Pss).map(Self::Rsa)
            }
            SignatureAlgorithm::EcdsaP256Sha256 => EcdsaKeyPair::generate().map(Self::EcdsaP256),
            SignatureAlgorithm::HmacSha256 => {
                let mut secret = Zeroizing::new(vec![0u8; 32]);
                rand::rngs::OsRng.fill_bytes(&mut secret);
                Ok(Self::Hmac(secret))
            }
        }
    }

    /// The algorithm this material signs with.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            Self::Ed25519(_) => SignatureAlgorithm::Ed25519,
            Self::Rsa(pair) => match pair.scheme() {
                RsaScheme::Pkcs1 => SignatureAlgorithm::RsaPkcs1Sha256,
                RsaScheme::Pss => SignatureAlgorithm::RsaPssSha256,
            },
            Self::EcdsaP256(_) => SignatureAlgorithm::EcdsaP256Sha256,
            Self::Hmac(_) => SignatureAlgorithm::HmacSha256,
        }
    }

    /// The bytes a verifier needs: the serialized public key, or the shared
    /// secret for HMAC material.
    pub fn verification_material(&self) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::Ed25519(pair) => Ok(pair.public_key().to_bytes()),
            Self::Rsa(pair) => pair.public_key_der(),
            Self::EcdsaP256(pair) => Ok(pair.public_key_sec1()),
            Self::Hmac(secret) => Ok(secret.to_vec()),
        }
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::Ed25519(pair) => Ok(pair.sign(digest)?.to_bytes()),
            Self::Rsa(pair) => pair.sign_digest(digest),
            Self::EcdsaP256(pair) => pair.sign_digest(digest),
            Self::Hmac(secret) => hmac::sign(secret, digest),
        }
    }
}

/// A development signing provider over in-memory key material.
pub struct LocalProvider {
    kid: String,
    material: LocalKeyMaterial,
}

impl LocalProvider {
    /// Wraps existing material under an operator-chosen kid.
    pub fn new(kid: impl Into<String>, material: LocalKeyMaterial) -> Self {
        Self {
            kid: kid.into(),
            material,
        }
    }

    /// Generates a provider whose kid is derived from the key material, in
    /// the `local-<alg>:<prefix>` form fallback verifiers look for.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self, SigningError> {
        let material = LocalKeyMaterial::generate(algorithm)?;
        let kid = fallback_kid(&material)?;
        Ok(Self { kid, material })
    }

    /// Loads an Ed25519 provider from a raw 32-byte seed file, creating the
    /// file with a fresh seed if it does not exist. Dev convenience only;
    /// the file holds an unencrypted seed.
    pub fn from_seed_file(path: &Path, kid: impl Into<String>) -> Result<Self, SigningError> {
        let pair = if path.exists() {
            let seed = Zeroizing::new(
                fs::read(path).map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
            );
            let private = Ed25519PrivateKey::from_bytes(&seed)?;
            Ed25519KeyPair::from_private_key(&private)?
        } else {
            let pair = Ed25519KeyPair::generate()?;
            let seed = Zeroizing::new(pair.private_key().to_bytes());
            let mut file = fs::File::create(path)
                .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;
            file.write_all(&seed)
                .and_then(|_| file.sync_all())
                .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;
            pair
        };
        Ok(Self::new(kid, LocalKeyMaterial::Ed25519(pair)))
    }

    /// The bytes to register for this signer in the registry.
    pub fn verification_material(&self) -> Result<Vec<u8>, SigningError> {
        Ok(self.material.verification_material()?)
    }
}

/// Derives the distinguishing dev-fallback kid for local material.
///
/// The prefix comes from the public key, or from a hash of the secret for
/// HMAC material so the secret itself never leaks into an identifier.
pub fn fallback_kid(material: &LocalKeyMaterial) -> Result<String, SigningError> {
    let bytes = match material {
        LocalKeyMaterial::Hmac(secret) => sha256(secret).to_vec(),
        other => other.verification_material()?,
    };
    let prefix = hex::encode(&bytes[..bytes.len().min(6)]);
    Ok(format!("local-{}:{}", material.algorithm(), prefix))
}

#[async_trait]
impl SigningProvider for LocalProvider {
    fn kid(&self) -> &str {
        &self.kid
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        self.material.algorithm()
    }

    async fn sign_payload(
        &self,
        payload: &[u8],
        _purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError> {
        let sig = match &self.material {
            // HMAC tags cover the payload itself (the GenerateMac contract).
            LocalKeyMaterial::Hmac(secret) => hmac::sign(secret, payload)?,
            material => material.sign_digest(&sha256(payload))?,
        };
        Ok(ProviderSignature {
            kid: self.kid.clone(),
            algorithm: self.algorithm(),
            sig,
        })
    }

    async fn sign_digest(
        &self,
        digest: &[u8; 32],
        _purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError> {
        Ok(ProviderSignature {
            kid: self.kid.clone(),
            algorithm: self.algorithm(),
            sig: self.material.sign_digest(digest)?,
        })
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        let material = self.material.verification_material()?;
        Ok(verify_payload(
            self.algorithm(),
            &material,
            payload,
            signature,
        )?)
    }

    async fn public_key(&self) -> Result<Vec<u8>, SigningError> {
        match &self.material {
            LocalKeyMaterial::Hmac(_) => Err(SigningError::Crypto(CryptoError::Unsupported(
                "HMAC signers have no public key".into(),
            ))),
            material => Ok(material.verification_material()?),
        }
    }
}
