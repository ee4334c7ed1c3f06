//! Ed25519 signing via `ed25519-dalek`.

use ed25519_dalek::{Signer as _, Verifier as _};
use rand::rngs::OsRng;
use signet_api::crypto::{SerializableKey, Signature, SigningKey, SigningKeyPair, VerifyingKey};
use signet_api::error::CryptoError;

/// Ed25519 key pair.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

/// Ed25519 public key.
pub struct Ed25519PublicKey(ed25519_dalek::VerifyingKey);

/// Ed25519 private key (seed form).
pub struct Ed25519PrivateKey(ed25519_dalek::SigningKey);

/// Ed25519 signature.
pub struct Ed25519Signature(ed25519_dalek::Signature);

impl Ed25519KeyPair {
    /// Generates a new key pair from the OS entropy source.
    pub fn generate() -> Result<Self, CryptoError> {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        Ok(Self { signing_key })
    }

    /// Reconstructs a key pair from an existing private key.
    pub fn from_private_key(private_key: &Ed25519PrivateKey) -> Result<Self, CryptoError> {
        Ok(Self {
            signing_key: private_key.0.clone(),
        })
    }
}

impl SigningKeyPair for Ed25519KeyPair {
    type PublicKey = Ed25519PublicKey;
    type PrivateKey = Ed25519PrivateKey;
    type Signature = Ed25519Signature;

    fn public_key(&self) -> Self::PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key())
    }

    fn private_key(&self) -> Self::PrivateKey {
        Ed25519PrivateKey(self.signing_key.clone())
    }

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        Ok(Ed25519Signature(self.signing_key.sign(message)))
    }
}

impl VerifyingKey for Ed25519PublicKey {
    type Signature = Ed25519Signature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl SerializableKey for Ed25519PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Ed25519 public key must be 32 bytes".into()))?;
        ed25519_dalek::VerifyingKey::from_bytes(&arr)
            .map(Ed25519PublicKey)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse public key: {e}")))
    }
}

impl SigningKey for Ed25519PrivateKey {
    type Signature = Ed25519Signature;

    fn sign(&self, message: &[u8]) -> Result<Self::Signature, CryptoError> {
        Ok(Ed25519Signature(self.0.sign(message)))
    }
}

impl SerializableKey for Ed25519PrivateKey {
    fn to_bytes(&self) -> Vec<u8> {
        // Export just the seed (32 bytes).
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Ed25519 seed must be 32 bytes".into()))?;
        Ok(Ed25519PrivateKey(ed25519_dalek::SigningKey::from_bytes(
            &seed,
        )))
    }
}

impl SerializableKey for Ed25519Signature {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        ed25519_dalek::Signature::from_slice(bytes)
            .map(Ed25519Signature)
            .map_err(|e| CryptoError::InvalidSignature(format!("failed to parse signature: {e}")))
    }
}

impl Signature for Ed25519Signature {}

/// Verifies a signature from raw key, message, and signature bytes.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
    let key = Ed25519PublicKey::from_bytes(public_key)?;
    let sig = match Ed25519Signature::from_bytes(signature) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(message, &sig).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let keypair = Ed25519KeyPair::generate().unwrap();
        let message = b"test message";

        let signature = keypair.sign(message).unwrap();
        assert!(keypair.public_key().verify(message, &signature).is_ok());
        assert!(keypair
            .public_key()
            .verify(b"different message", &signature)
            .is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let keypair = Ed25519KeyPair::generate().unwrap();

        let public_bytes = keypair.public_key().to_bytes();
        let private_bytes = keypair.private_key().to_bytes();
        assert_eq!(public_bytes.len(), 32);
        assert_eq!(private_bytes.len(), 32);

        let loaded_private = Ed25519PrivateKey::from_bytes(&private_bytes).unwrap();
        let reconstructed = Ed25519KeyPair::from_private_key(&loaded_private).unwrap();
        assert_eq!(reconstructed.public_key().to_bytes(), public_bytes);

        // Signatures are deterministic, so the reconstructed pair signs
        // identically.
        let message = b"persistence check";
        assert_eq!(
            keypair.sign(message).unwrap().to_bytes(),
            reconstructed.sign(message).unwrap().to_bytes()
        );
    }

    #[test]
    fn raw_verify_dispatch() {
        let keypair = Ed25519KeyPair::generate().unwrap();
        let message = b"raw bytes";
        let sig = keypair.sign(message).unwrap().to_bytes();
        let pk = keypair.public_key().to_bytes();

        assert!(verify(&pk, message, &sig).unwrap());
        assert!(!verify(&pk, b"tampered", &sig).unwrap());
        // Malformed signature bytes verify as false, not as an error.
        assert!(!verify(&pk, message, &[0u8; 10]).unwrap());
    }
}
