//! Upgrade manifests and the approvals that gate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::base64_bytes;

/// The declared blast radius of an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    /// Routine change, no customer-visible risk.
    Low,
    /// Degradation possible but recoverable.
    Medium,
    /// Customer-visible outage possible.
    High,
    /// Irreversible or platform-wide consequences.
    Critical,
}

/// The lifecycle states of a manifest.
///
/// Transitions are restricted to the governance state machine's edge set;
/// `Applied` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    /// Persisted but not yet signed.
    Draft,
    /// Canonical bytes signed by the kernel signer.
    Signed,
    /// Multisig requested; no approvals recorded yet.
    AwaitingMultisig,
    /// Some approvals recorded, threshold not met.
    MultisigPartial,
    /// Threshold met; ready to apply.
    MultisigComplete,
    /// Terminal: the upgrade was applied.
    Applied,
    /// Terminal: rejected by an approver or an operator.
    Rejected,
}

impl ManifestStatus {
    /// The stable wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Signed => "signed",
            Self::AwaitingMultisig => "awaiting_multisig",
            Self::MultisigPartial => "multisig_partial",
            Self::MultisigComplete => "multisig_complete",
            Self::Applied => "applied",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Applied | Self::Rejected)
    }
}

impl std::fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An approver's recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Counts toward the multisig threshold.
    Approved,
    /// Immediately rejects the manifest.
    Rejected,
}

/// A single approver's signed decision on a manifest.
///
/// At most one row exists per `(manifest_id, approver_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// Server-assigned row id.
    pub id: String,
    /// The manifest this approval belongs to.
    pub manifest_id: String,
    /// The approver's identity.
    pub approver_id: String,
    /// The decision taken.
    pub decision: ApprovalDecision,
    /// The approver's signature over the canonical approval preimage.
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// Free-form reviewer notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the approval was recorded.
    pub created_at: DateTime<Utc>,
}

/// An upgrade manifest moving through the governance state machine.
///
/// Manifest ids are client-chosen opaque strings; resubmission of an existing
/// id under a fresh idempotency key is a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Client-chosen manifest id.
    pub id: String,
    /// What is being upgraded (an opaque package reference).
    pub package_ref: String,
    /// Declared blast radius.
    pub impact: Impact,
    /// Structured preconditions checked by the applying service.
    pub preconditions: Value,
    /// Current state-machine position.
    pub status: ManifestStatus,
    /// Id of the kernel signature over the manifest's canonical bytes.
    /// Non-null from `signed` onward (apply readiness requires it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<String>,
    /// Distinct `approved` decisions required before apply. Zero means the
    /// manifest may be applied directly from `signed`.
    pub multisig_threshold: u32,
    /// Approvers eligible to decide on this manifest. Empty until multisig is
    /// requested.
    #[serde(default)]
    pub approver_set: Vec<String>,
    /// Approvals recorded so far, at most one per approver.
    #[serde(default)]
    pub approvals: Vec<Approval>,
    /// When the manifest was first persisted.
    pub created_at: DateTime<Utc>,
    /// When the manifest last changed state.
    pub updated_at: DateTime<Utc>,
    /// When the manifest was applied, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
}

impl Manifest {
    /// Counts distinct approvers whose recorded decision is `approved`.
    pub fn approved_count(&self) -> u32 {
        self.approvals
            .iter()
            .filter(|a| a.decision == ApprovalDecision::Approved)
            .count() as u32
    }

    /// The view of the manifest that gets canonicalized and signed: the
    /// client-supplied content, independent of lifecycle bookkeeping.
    pub fn signing_view(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "package_ref": self.package_ref,
            "impact": self.impact,
            "preconditions": self.preconditions,
        })
    }
}
