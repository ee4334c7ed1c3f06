//! Core error types for the Signet trust kernel.
//!
//! Each domain gets its own `thiserror` enum, and every variant carries a
//! stable machine-readable code via [`ErrorCode`]. User-visible messages stay
//! actor-safe; internal detail belongs in logs, not in these strings.

use thiserror::Error;

use crate::model::{ChainFailure, ManifestStatus};

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors from canonical encoding.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The value cannot be represented as canonical JSON (non-finite number,
    /// unsupported type, or a serializer failure).
    #[error("canonical encoding failed: {0}")]
    Serialize(String),
    /// Canonical bytes could not be parsed back into a value.
    #[error("canonical decoding failed: {0}")]
    Deserialize(String),
}

impl ErrorCode for EncodingError {
    fn code(&self) -> &'static str {
        match self {
            Self::Serialize(_) => "ENCODING_SERIALIZE_FAILED",
            Self::Deserialize(_) => "ENCODING_DESERIALIZE_FAILED",
        }
    }
}

/// Errors from cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The signature failed cryptographic verification.
    #[error("signature verification failed")]
    VerificationFailed,
    /// The provided key material is malformed or invalid for the algorithm.
    #[error("invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// The provided signature bytes are malformed for the algorithm.
    #[error("invalid signature format: {0}")]
    InvalidSignature(String),
    /// A digest had an unexpected length.
    #[error("invalid digest length: expected {expected}, got {got}")]
    InvalidDigestLength {
        /// The expected length in bytes.
        expected: usize,
        /// The actual length in bytes.
        got: usize,
    },
    /// The requested operation or parameter is not supported in this context.
    #[error("unsupported cryptographic operation: {0}")]
    Unsupported(String),
    /// A generic failure in an underlying cryptographic library.
    #[error("cryptographic operation failed: {0}")]
    OperationFailed(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature(_) => "CRYPTO_INVALID_SIGNATURE",
            Self::InvalidDigestLength { .. } => "CRYPTO_INVALID_DIGEST_LENGTH",
            Self::Unsupported(_) => "CRYPTO_UNSUPPORTED",
            Self::OperationFailed(_) => "CRYPTO_OPERATION_FAILED",
        }
    }
}

/// Errors from a signing provider.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The provider is transiently unreachable. Safe to retry under the same
    /// idempotency key.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    /// The requested signer has been retired and refuses new signings.
    #[error("signer '{0}' is retired")]
    Retired(String),
    /// The signing call exceeded its deadline.
    #[error("signing call timed out after {timeout_ms} ms")]
    Timeout {
        /// The deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },
    /// The remote signer returned a non-transient error.
    #[error("remote signer error: {0}")]
    Remote(String),
    /// No signer is registered under the requested kid.
    #[error("unknown signer '{0}'")]
    UnknownSigner(String),
    /// The underlying cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The payload could not be canonically encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl SigningError {
    /// Whether a retry under the same idempotency key can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

impl ErrorCode for SigningError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "SIGNER_UNAVAILABLE",
            Self::Retired(_) => "SIGNER_RETIRED",
            Self::Timeout { .. } => "SIGNER_TIMEOUT",
            Self::Remote(_) => "SIGNER_REMOTE_ERROR",
            Self::UnknownSigner(_) => "SIGNER_UNKNOWN",
            Self::Crypto(e) => e.code(),
            Self::Encoding(e) => e.code(),
        }
    }
}

/// Errors from the signer registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No signer is registered under the given kid.
    #[error("signer '{0}' not found")]
    NotFound(String),
    /// The kid is already registered with different key material.
    #[error("signer '{kid}' already registered with a different public key")]
    KidConflict {
        /// The contested key id.
        kid: String,
    },
    /// An error occurred in the backing store.
    #[error("registry backend error: {0}")]
    Backend(String),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "REGISTRY_SIGNER_NOT_FOUND",
            Self::KidConflict { .. } => "REGISTRY_KID_CONFLICT",
            Self::Backend(_) => "REGISTRY_BACKEND_ERROR",
        }
    }
}

/// Errors from the audit chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The append queue is full; fail fast rather than queue unboundedly.
    #[error("audit chain is busy; retry later")]
    Busy,
    /// The chain detected an integrity violation on the append path and has
    /// halted. Operator intervention is required before further appends.
    #[error("audit chain halted: {0}")]
    Halted(ChainFailure),
    /// Two writers raced on the same chain tail; exactly one won.
    #[error("chain tail conflict: {0}")]
    Conflict(String),
    /// The requested event does not exist.
    #[error("audit event {0} not found")]
    NotFound(u64),
    /// The signing provider failed while sealing an event.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The payload could not be canonically encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// An error occurred in the backing store.
    #[error("audit store error: {0}")]
    Backend(String),
}

impl ErrorCode for ChainError {
    fn code(&self) -> &'static str {
        match self {
            Self::Busy => "CHAIN_BUSY",
            Self::Halted(_) => "CHAIN_INTEGRITY_HALTED",
            Self::Conflict(_) => "CHAIN_TAIL_CONFLICT",
            Self::NotFound(_) => "CHAIN_EVENT_NOT_FOUND",
            Self::Signing(e) => e.code(),
            Self::Encoding(e) => e.code(),
            Self::Backend(_) => "CHAIN_BACKEND_ERROR",
        }
    }
}

/// Errors from the idempotency store.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The key is bound to a different principal.
    #[error("idempotency key '{key}' is bound to another principal")]
    Conflict {
        /// The contested key.
        key: String,
    },
    /// The original submission under this key has not finished; the caller
    /// must await its completion or retry later.
    #[error("submission under key '{key}' is still in flight")]
    Pending {
        /// The in-flight key.
        key: String,
    },
    /// An error occurred in the backing store.
    #[error("idempotency backend error: {0}")]
    Backend(String),
}

impl ErrorCode for IdempotencyError {
    fn code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "IDEMPOTENCY_CONFLICT",
            Self::Pending { .. } => "IDEMPOTENCY_PENDING",
            Self::Backend(_) => "IDEMPOTENCY_BACKEND_ERROR",
        }
    }
}

/// Errors from the governance service and its state machine.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The manifest does not exist.
    #[error("manifest '{0}' not found")]
    NotFound(String),
    /// The input was malformed or failed validation.
    #[error("invalid governance request: {0}")]
    Validation(String),
    /// The requested action is not legal from the manifest's current state.
    #[error("cannot {action} a manifest in state '{from}'")]
    InvalidTransition {
        /// The manifest's current state.
        from: ManifestStatus,
        /// The action that was attempted.
        action: &'static str,
    },
    /// The approver is not in the manifest's approver set.
    #[error("approver '{approver_id}' is not listed for manifest '{manifest_id}'")]
    ApproverNotListed {
        /// The manifest in question.
        manifest_id: String,
        /// The uninvited approver.
        approver_id: String,
    },
    /// The approver's signature over the approval preimage did not verify.
    #[error("approval signature from '{approver_id}' did not verify")]
    ApprovalSignatureInvalid {
        /// The approver whose signature failed.
        approver_id: String,
    },
    /// The manifest reached an apply attempt without a signature on file.
    #[error("manifest '{0}' has no signature; refusing to apply")]
    MissingSignature(String),
    /// The idempotency key is bound to a different principal.
    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),
    /// The policy gate refused the action.
    #[error("blocked by policy '{policy_id}': {reason}")]
    PolicyDenied {
        /// The policy that fired.
        policy_id: String,
        /// Actor-safe rationale.
        reason: String,
    },
    /// The signing provider failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The audit chain failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// The signer registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// An error occurred in the backing store.
    #[error("governance backend error: {0}")]
    Backend(String),
}

impl GovernanceError {
    /// The HTTP-shaped status recorded into idempotency snapshots and
    /// returned by transport adapters.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) | Self::ApprovalSignatureInvalid { .. } => 400,
            Self::InvalidTransition { .. }
            | Self::ApproverNotListed { .. }
            | Self::MissingSignature(_)
            | Self::Idempotency(_) => 409,
            Self::PolicyDenied { .. } => 403,
            Self::Signing(e) if e.is_transient() => 503,
            Self::Chain(ChainError::Busy) => 429,
            _ => 500,
        }
    }
}

impl ErrorCode for GovernanceError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "GOVERNANCE_MANIFEST_NOT_FOUND",
            Self::Validation(_) => "GOVERNANCE_VALIDATION_FAILED",
            Self::InvalidTransition { .. } => "GOVERNANCE_INVALID_TRANSITION",
            Self::ApproverNotListed { .. } => "GOVERNANCE_APPROVER_NOT_LISTED",
            Self::ApprovalSignatureInvalid { .. } => "GOVERNANCE_APPROVAL_SIGNATURE_INVALID",
            Self::MissingSignature(_) => "GOVERNANCE_MISSING_SIGNATURE",
            Self::Idempotency(e) => e.code(),
            Self::PolicyDenied { .. } => "GOVERNANCE_POLICY_DENIED",
            Self::Signing(e) => e.code(),
            Self::Chain(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::Backend(_) => "GOVERNANCE_BACKEND_ERROR",
        }
    }
}

/// Errors from configuration loading and startup validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A recognized key held an unparseable or out-of-range value.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// The offending environment key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// `REQUIRE_KMS` is set but neither a KMS nor a proxy signer is
    /// configured; the local provider is disallowed in production.
    #[error("REQUIRE_KMS is set but no KMS or signing proxy is configured")]
    KmsRequired,
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "CONFIG_INVALID_VALUE",
            Self::KmsRequired => "CONFIG_KMS_REQUIRED",
        }
    }
}

/// The top-level kernel error, for callers that span domains.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A governance operation failed.
    #[error(transparent)]
    Governance(#[from] GovernanceError),
    /// An audit chain operation failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// A signing operation failed.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// A registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An unexpected internal error, surfaced opaquely.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorCode for KernelError {
    fn code(&self) -> &'static str {
        match self {
            Self::Governance(e) => e.code(),
            Self::Chain(e) => e.code(),
            Self::Signing(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::Internal(_) => "KERNEL_INTERNAL_ERROR",
        }
    }
}
