//! Manifest persistence and the governance state machine.
//!
//! Transitions live here, in one place, as functions over a mutably borrowed
//! [`Manifest`]. Stores run them inside [`ManifestStore::update`], which
//! holds the write lock for the whole closure, so concurrent approvals on
//! one manifest serialize and each one observes the previous count.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use signet_api::error::GovernanceError;
use signet_api::store::ManifestStore;
use signet_types::model::{Approval, ApprovalDecision, Manifest, ManifestStatus};

/// What recording an approval did to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalEffect {
    /// The approver had already decided; nothing changed.
    Duplicate,
    /// The approval was recorded; `complete` is true when it met the
    /// threshold.
    Recorded {
        /// Whether the threshold is now met.
        complete: bool,
    },
    /// The decision was a rejection; the manifest is now terminal.
    Rejected,
}

/// `draft → signed`, stamping the signature id.
pub fn submit_for_signing(
    manifest: &mut Manifest,
    signature_id: String,
    now: DateTime<Utc>,
) -> Result<(), GovernanceError> {
    if manifest.status != ManifestStatus::Draft {
        return Err(GovernanceError::InvalidTransition {
            from: manifest.status,
            action: "sign",
        });
    }
    manifest.status = ManifestStatus::Signed;
    manifest.signature_id = Some(signature_id);
    manifest.updated_at = now;
    Ok(())
}

/// `signed → awaiting_multisig`, persisting the threshold and approver set.
pub fn request_multisig(
    manifest: &mut Manifest,
    threshold: u32,
    approver_set: Vec<String>,
    now: DateTime<Utc>,
) -> Result<(), GovernanceError> {
    if manifest.status != ManifestStatus::Signed {
        return Err(GovernanceError::InvalidTransition {
            from: manifest.status,
            action: "request multisig for",
        });
    }
    if threshold == 0 {
        return Err(GovernanceError::Validation(
            "multisig threshold must be positive; apply a signed manifest directly instead".into(),
        ));
    }
    if (approver_set.len() as u32) < threshold {
        return Err(GovernanceError::Validation(format!(
            "threshold {} exceeds the {} listed approvers",
            threshold,
            approver_set.len()
        )));
    }
    manifest.status = ManifestStatus::AwaitingMultisig;
    manifest.multisig_threshold = threshold;
    manifest.approver_set = approver_set;
    manifest.updated_at = now;
    Ok(())
}

/// Records one approver's decision.
///
/// Duplicate decisions by the same approver are no-ops; a rejection is an
/// immediate terminal transition; an approval advances to
/// `multisig_partial` or `multisig_complete` depending on the count of
/// distinct approvers with `decision = approved`.
pub fn record_approval(
    manifest: &mut Manifest,
    approval: Approval,
    now: DateTime<Utc>,
) -> Result<ApprovalEffect, GovernanceError> {
    // A repeated decision is a no-op even if the manifest has since moved
    // on, so approver retries never surface state errors.
    if manifest
        .approvals
        .iter()
        .any(|a| a.approver_id == approval.approver_id)
    {
        return Ok(ApprovalEffect::Duplicate);
    }
    if !matches!(
        manifest.status,
        ManifestStatus::AwaitingMultisig | ManifestStatus::MultisigPartial
    ) {
        return Err(GovernanceError::InvalidTransition {
            from: manifest.status,
            action: "approve",
        });
    }
    if !manifest
        .approver_set
        .iter()
        .any(|a| a == &approval.approver_id)
    {
        return Err(GovernanceError::ApproverNotListed {
            manifest_id: manifest.id.clone(),
            approver_id: approval.approver_id,
        });
    }

    let decision = approval.decision;
    manifest.approvals.push(approval);
    manifest.updated_at = now;

    if decision == ApprovalDecision::Rejected {
        manifest.status = ManifestStatus::Rejected;
        return Ok(ApprovalEffect::Rejected);
    }

    if manifest.approved_count() >= manifest.multisig_threshold {
        manifest.status = ManifestStatus::MultisigComplete;
        Ok(ApprovalEffect::Recorded { complete: true })
    } else {
        manifest.status = ManifestStatus::MultisigPartial;
        Ok(ApprovalEffect::Recorded { complete: false })
    }
}

/// `signed (threshold 0) | multisig_complete → applied`.
///
/// Returns `true` when the manifest was already applied, so callers can
/// replay the prior response without emitting anything.
pub fn apply(manifest: &mut Manifest, now: DateTime<Utc>) -> Result<bool, GovernanceError> {
    match manifest.status {
        ManifestStatus::Applied => return Ok(true),
        ManifestStatus::Signed if manifest.multisig_threshold == 0 => {}
        ManifestStatus::MultisigComplete => {}
        from => {
            return Err(GovernanceError::InvalidTransition {
                from,
                action: "apply",
            })
        }
    }
    if manifest.signature_id.is_none() {
        return Err(GovernanceError::MissingSignature(manifest.id.clone()));
    }
    manifest.status = ManifestStatus::Applied;
    manifest.applied_at = Some(now);
    manifest.updated_at = now;
    Ok(false)
}

/// `any non-terminal → rejected`.
pub fn reject(manifest: &mut Manifest, now: DateTime<Utc>) -> Result<(), GovernanceError> {
    if manifest.status.is_terminal() {
        return Err(GovernanceError::InvalidTransition {
            from: manifest.status,
            action: "reject",
        });
    }
    manifest.status = ManifestStatus::Rejected;
    manifest.updated_at = now;
    Ok(())
}

/// An in-memory manifest table.
#[derive(Default)]
pub struct MemoryManifestStore {
    rows: RwLock<HashMap<String, Manifest>>,
}

impl MemoryManifestStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManifestStore for MemoryManifestStore {
    fn insert(&self, manifest: Manifest) -> Result<(), GovernanceError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&manifest.id) {
            return Err(GovernanceError::Validation(format!(
                "manifest '{}' already exists",
                manifest.id
            )));
        }
        rows.insert(manifest.id.clone(), manifest);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Manifest>, GovernanceError> {
        Ok(self.rows.read().get(id).cloned())
    }

    fn update(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut Manifest) -> Result<(), GovernanceError>,
    ) -> Result<Manifest, GovernanceError> {
        let mut rows = self.rows.write();
        let manifest = rows
            .get_mut(id)
            .ok_or_else(|| GovernanceError::NotFound(id.to_string()))?;
        // Mutate a copy so a failed transition leaves the row untouched.
        let mut draft = manifest.clone();
        mutate(&mut draft)?;
        *manifest = draft.clone();
        Ok(draft)
    }
}
