//! Signer identities and the signatures they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::base64_bytes;

/// The signature algorithms the kernel can register and verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Ed25519 over the raw message bytes.
    #[serde(rename = "ed25519")]
    Ed25519,
    /// RSASSA-PKCS1-v1_5 over a SHA-256 digest.
    #[serde(rename = "rsa-pkcs1-sha256")]
    RsaPkcs1Sha256,
    /// RSASSA-PSS over a SHA-256 digest.
    #[serde(rename = "rsa-pss-sha256")]
    RsaPssSha256,
    /// ECDSA on P-256 over a SHA-256 digest.
    #[serde(rename = "ecdsa-p256-sha256")]
    EcdsaP256Sha256,
    /// HMAC-SHA256. Internal-trust contexts only; not externally verifiable.
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
}

impl SignatureAlgorithm {
    /// The stable wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::RsaPkcs1Sha256 => "rsa-pkcs1-sha256",
            Self::RsaPssSha256 => "rsa-pss-sha256",
            Self::EcdsaP256Sha256 => "ecdsa-p256-sha256",
            Self::HmacSha256 => "hmac-sha256",
        }
    }

    /// Parses a wire name back into an algorithm.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ed25519" => Some(Self::Ed25519),
            "rsa-pkcs1-sha256" => Some(Self::RsaPkcs1Sha256),
            "rsa-pss-sha256" => Some(Self::RsaPssSha256),
            "ecdsa-p256-sha256" => Some(Self::EcdsaP256Sha256),
            "hmac-sha256" => Some(Self::HmacSha256),
            _ => None,
        }
    }

    /// Whether the algorithm has a public verification key.
    ///
    /// Externally verifiable artifacts (manifests, audit events) require an
    /// asymmetric algorithm; HMAC signers are rejected for those purposes.
    pub fn is_asymmetric(&self) -> bool {
        !matches!(self, Self::HmacSha256)
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered signing identity.
///
/// Rows are append-only: rotation registers a new `kid`, and retirement sets
/// `retired_at` without ever deleting the row, so historical chain signatures
/// stay verifiable forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRecord {
    /// Globally unique key identifier.
    pub kid: String,
    /// The algorithm this signer produces.
    pub algorithm: SignatureAlgorithm,
    /// Key material for verification: the public key (DER/SEC1/raw per
    /// algorithm) for asymmetric signers, or the shared secret for HMAC
    /// signers (internal-trust deployments only).
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    /// When the signer was registered.
    pub created_at: DateTime<Utc>,
    /// When the signer was retired, if ever. A retired signer refuses new
    /// signings but still verifies old ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<DateTime<Utc>>,
}

impl SignerRecord {
    /// Whether this signer may produce new signatures.
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }
}

/// What a signature was produced over, when the caller wants the binding
/// recorded alongside the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadRef {
    /// The canonical bytes of a manifest.
    Manifest {
        /// The manifest the signature covers.
        manifest_id: String,
    },
    /// A chain digest, hex encoded.
    AuditHash {
        /// The `hash` column of the covered audit event.
        hash_hex: String,
    },
}

/// The purpose tag a caller attaches to a signing request.
///
/// Providers may route purposes to different keys; the tag also ends up in
/// proxy requests so a remote signer can enforce per-purpose policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignPurpose {
    /// Signing a manifest's canonical bytes.
    Manifest,
    /// Signing an audit chain digest.
    Audit,
    /// Verifying or countersigning an approval.
    Approval,
    /// Signing a license artifact.
    License,
}

impl SignPurpose {
    /// The stable wire name of the purpose.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Audit => "audit",
            Self::Approval => "approval",
            Self::License => "license",
        }
    }
}

/// A produced signature, bound to exactly one canonical payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Server-assigned row id.
    pub id: String,
    /// The signer that produced this signature.
    pub kid: String,
    /// The algorithm used.
    pub algorithm: SignatureAlgorithm,
    /// Raw signature bytes.
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,
    /// When the signature was produced.
    pub ts: DateTime<Utc>,
    /// Optional record of what the signature covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_ref: Option<PayloadRef>,
}
