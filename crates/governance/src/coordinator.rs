//! The governance coordinator: submit → sign → multisig → apply.
//!
//! The coordinator owns the orchestration and the audit emissions; all state
//! transitions happen inside the manifest store's update lock, and every
//! event is appended only after the signature exists and the transition
//! committed.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use signet_api::error::{GovernanceError, IdempotencyError, SigningError};
use signet_api::policy::{PolicyDecision, PolicyGate, PolicyQuery};
use signet_api::provider::SigningProvider;
use signet_api::store::{IdempotencyStore, ManifestStore};
use signet_audit::AuditChain;
use signet_crypto::hash::sha256;
use signet_crypto::sign::verify_payload;
use signet_types::codec::canonical_json;
use signet_types::model::{
    event_type, Approval, ApprovalDecision, Impact, Manifest, ManifestStatus, Reservation,
    SignPurpose,
};

use crate::manifest::{self, ApprovalEffect};
use crate::registry::SignerRegistry;

/// A manifest submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    /// Client-chosen manifest id.
    pub id: String,
    /// What is being upgraded.
    pub package_ref: String,
    /// Declared blast radius.
    pub impact: Impact,
    /// Structured preconditions.
    pub preconditions: Value,
}

/// The response to a submission, replayable under the same idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResponse {
    /// 201 for a fresh submission, 200 for an idempotent replay.
    pub status_code: u16,
    /// The response body: `{manifest_id, status, signature_id}`.
    pub body: Value,
}

/// The response to a multisig request.
#[derive(Debug, Clone, Serialize)]
pub struct MultisigResponse {
    /// The manifest.
    pub manifest_id: String,
    /// Its state after the request (`awaiting_multisig`).
    pub status: ManifestStatus,
    /// The persisted threshold.
    pub threshold: u32,
    /// The eligible approvers.
    pub approver_set: Vec<String>,
}

/// The response to recording an approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApproveResponse {
    /// The manifest.
    pub manifest_id: String,
    /// Its state after the decision.
    pub status: ManifestStatus,
    /// Distinct approvers with `decision = approved` so far.
    pub approved_count: u32,
    /// The threshold in force.
    pub threshold: u32,
}

/// The response to an apply.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResponse {
    /// The manifest.
    pub manifest_id: String,
    /// Its state (`applied`).
    pub status: ManifestStatus,
    /// When it was applied.
    pub applied_at: Option<chrono::DateTime<Utc>>,
}

/// The governance coordinator.
pub struct GovernanceCoordinator {
    manifests: Arc<dyn ManifestStore>,
    idempotency: Arc<dyn IdempotencyStore>,
    registry: Arc<SignerRegistry>,
    provider: Arc<dyn SigningProvider>,
    chain: AuditChain,
    gate: Arc<dyn PolicyGate>,
    default_threshold: u32,
}

impl GovernanceCoordinator {
    /// Wires the coordinator over its collaborators.
    pub fn new(
        manifests: Arc<dyn ManifestStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        registry: Arc<SignerRegistry>,
        provider: Arc<dyn SigningProvider>,
        chain: AuditChain,
        gate: Arc<dyn PolicyGate>,
        default_threshold: u32,
    ) -> Self {
        Self {
            manifests,
            idempotency,
            registry,
            provider,
            chain,
            gate,
            default_threshold,
        }
    }

    /// Accepts a submission: reserve the idempotency key, persist the draft,
    /// sign its canonical bytes, transition to `signed`, and emit
    /// `manifest.submitted` + `manifest.signed`.
    pub async fn submit(
        &self,
        request: SubmitRequest,
        idempotency_key: &str,
        principal: &str,
    ) -> Result<SubmitResponse, GovernanceError> {
        match self.idempotency.reserve(idempotency_key, principal)? {
            Reservation::New => {}
            Reservation::Existing(record) => {
                return Ok(SubmitResponse {
                    status_code: 200,
                    body: record.response,
                });
            }
            Reservation::Pending => {
                return Err(IdempotencyError::Pending {
                    key: idempotency_key.to_string(),
                }
                .into())
            }
        }

        match self.submit_inner(&request, principal).await {
            Ok(body) => {
                self.idempotency
                    .finalize(idempotency_key, principal, 201, body.clone())?;
                Ok(SubmitResponse {
                    status_code: 201,
                    body,
                })
            }
            Err(e) => {
                // Release so a retry under the same key can run again; for
                // transient signer outages this is what makes the retry safe.
                let _ = self.idempotency.release(idempotency_key, principal);
                Err(e)
            }
        }
    }

    async fn submit_inner(
        &self,
        request: &SubmitRequest,
        principal: &str,
    ) -> Result<Value, GovernanceError> {
        self.registry.ensure_active(self.provider.kid())?;

        let now = Utc::now();
        let draft = Manifest {
            id: request.id.clone(),
            package_ref: request.package_ref.clone(),
            impact: request.impact,
            preconditions: request.preconditions.clone(),
            status: ManifestStatus::Draft,
            signature_id: None,
            multisig_threshold: 0,
            approver_set: Vec::new(),
            approvals: Vec::new(),
            created_at: now,
            updated_at: now,
            applied_at: None,
        };

        match self.manifests.insert(draft.clone()) {
            Ok(()) => {}
            Err(GovernanceError::Validation(_)) => {
                // A previous attempt under this key may have persisted the
                // draft and then lost its signer. Resume only if the stored
                // row is still an identical draft; anything else is a real
                // conflict.
                let existing = self
                    .manifests
                    .get(&request.id)?
                    .ok_or_else(|| GovernanceError::NotFound(request.id.clone()))?;
                if existing.status != ManifestStatus::Draft
                    || existing.signing_view() != draft.signing_view()
                {
                    return Err(GovernanceError::Validation(format!(
                        "manifest '{}' already exists",
                        request.id
                    )));
                }
            }
            Err(e) => return Err(e),
        }

        let canonical = canonical_json(&draft.signing_view())
            .map_err(|e| GovernanceError::Signing(SigningError::from(e)))?;
        let manifest_hash = hex::encode(sha256(&canonical));

        let signature = self
            .provider
            .sign_payload(&canonical, SignPurpose::Manifest)
            .await?;
        let signature_id = Uuid::new_v4().to_string();

        let manifest = self.manifests.update(&request.id, &mut |m| {
            manifest::submit_for_signing(m, signature_id.clone(), Utc::now())
        })?;

        self.chain
            .append(
                event_type::MANIFEST_SUBMITTED,
                json!({
                    "manifest_id": manifest.id,
                    "package_ref": manifest.package_ref,
                    "impact": manifest.impact,
                    "principal": principal,
                }),
                None,
            )
            .await?;
        self.chain
            .append(
                event_type::MANIFEST_SIGNED,
                json!({
                    "manifest_id": manifest.id,
                    "manifest_hash": manifest_hash,
                    "signer_kid": signature.kid,
                    "algorithm": signature.algorithm,
                }),
                Some(signature_id.clone()),
            )
            .await?;

        tracing::info!(
            manifest_id = %manifest.id,
            signer_kid = %signature.kid,
            "manifest signed"
        );
        Ok(json!({
            "manifest_id": manifest.id,
            "status": manifest.status,
            "signature_id": signature_id,
        }))
    }

    /// Requests multisig for a signed manifest, persisting the threshold and
    /// approver set and emitting `manifest.multisig_requested`.
    pub async fn request_multisig(
        &self,
        manifest_id: &str,
        threshold: Option<u32>,
        approver_set: Vec<String>,
    ) -> Result<MultisigResponse, GovernanceError> {
        let threshold = threshold.unwrap_or(self.default_threshold);
        let manifest = self.manifests.update(manifest_id, &mut |m| {
            manifest::request_multisig(m, threshold, approver_set.clone(), Utc::now())
        })?;

        self.chain
            .append(
                event_type::MANIFEST_MULTISIG_REQUESTED,
                json!({
                    "manifest_id": manifest.id,
                    "threshold": threshold,
                    "approver_set": manifest.approver_set,
                }),
                None,
            )
            .await?;

        Ok(MultisigResponse {
            manifest_id: manifest.id.clone(),
            status: manifest.status,
            threshold,
            approver_set: manifest.approver_set,
        })
    }

    /// Records one approver's signed decision.
    ///
    /// The signature must cover the canonical approval preimage
    /// `{manifest_id, manifest_hash, approver_id, decision, notes?}` under
    /// the approver's registered key. A duplicate decision by the same
    /// approver succeeds without changing anything.
    pub async fn approve(
        &self,
        manifest_id: &str,
        approver_id: &str,
        decision: ApprovalDecision,
        signature: Vec<u8>,
        notes: Option<String>,
    ) -> Result<ApproveResponse, GovernanceError> {
        let manifest = self
            .manifests
            .get(manifest_id)?
            .ok_or_else(|| GovernanceError::NotFound(manifest_id.to_string()))?;

        let preimage = approval_preimage(&manifest, approver_id, decision, notes.as_deref())?;
        self.verify_approver_signature(approver_id, &preimage, &signature)?;

        let approval = Approval {
            id: Uuid::new_v4().to_string(),
            manifest_id: manifest_id.to_string(),
            approver_id: approver_id.to_string(),
            decision,
            signature,
            notes,
            created_at: Utc::now(),
        };

        let mut effect = ApprovalEffect::Duplicate;
        let manifest = self.manifests.update(manifest_id, &mut |m| {
            effect = manifest::record_approval(m, approval.clone(), Utc::now())?;
            Ok(())
        })?;

        match effect {
            ApprovalEffect::Duplicate => {
                tracing::debug!(manifest_id, approver_id, "duplicate approval ignored");
            }
            ApprovalEffect::Recorded { complete } => {
                self.emit_approval_recorded(&manifest, approver_id, decision)
                    .await?;
                if complete {
                    self.chain
                        .append(
                            event_type::MANIFEST_MULTISIG_COMPLETE,
                            json!({
                                "manifest_id": manifest.id,
                                "approved_count": manifest.approved_count(),
                                "threshold": manifest.multisig_threshold,
                            }),
                            None,
                        )
                        .await?;
                }
            }
            ApprovalEffect::Rejected => {
                self.emit_approval_recorded(&manifest, approver_id, decision)
                    .await?;
                self.chain
                    .append(
                        event_type::MANIFEST_REJECTED,
                        json!({
                            "manifest_id": manifest.id,
                            "rejected_by": approver_id,
                        }),
                        None,
                    )
                    .await?;
            }
        }

        Ok(ApproveResponse {
            manifest_id: manifest.id.clone(),
            status: manifest.status,
            approved_count: manifest.approved_count(),
            threshold: manifest.multisig_threshold,
        })
    }

    /// Applies a manifest, consulting the policy gate when one is
    /// configured. Re-applying an applied manifest replays the prior
    /// outcome without emitting anything.
    pub async fn apply(
        &self,
        manifest_id: &str,
        actor: &str,
    ) -> Result<ApplyResponse, GovernanceError> {
        let manifest = self
            .manifests
            .get(manifest_id)?
            .ok_or_else(|| GovernanceError::NotFound(manifest_id.to_string()))?;

        if manifest.status == ManifestStatus::Applied {
            return Ok(ApplyResponse {
                manifest_id: manifest.id,
                status: ManifestStatus::Applied,
                applied_at: manifest.applied_at,
            });
        }

        let query = PolicyQuery {
            action: "manifest.apply".into(),
            actor: actor.to_string(),
            resource: manifest_id.to_string(),
            context: json!({
                "impact": manifest.impact,
                "threshold": manifest.multisig_threshold,
                "approved_count": manifest.approved_count(),
            }),
        };
        if let PolicyDecision::Deny { policy_id, reason } = self.gate.decide(&query).await? {
            self.chain
                .append(
                    event_type::MANIFEST_BLOCKED,
                    json!({
                        "manifest_id": manifest_id,
                        "actor": actor,
                        "policy_id": policy_id,
                        "reason": reason,
                    }),
                    None,
                )
                .await?;
            return Err(GovernanceError::PolicyDenied { policy_id, reason });
        }

        let mut already_applied = false;
        let manifest = self.manifests.update(manifest_id, &mut |m| {
            already_applied = manifest::apply(m, Utc::now())?;
            Ok(())
        })?;

        if !already_applied {
            self.chain
                .append(
                    event_type::MANIFEST_APPLIED,
                    json!({
                        "manifest_id": manifest.id,
                        "actor": actor,
                    }),
                    None,
                )
                .await?;
            tracing::info!(manifest_id = %manifest.id, actor, "manifest applied");
        }

        Ok(ApplyResponse {
            manifest_id: manifest.id,
            status: manifest.status,
            applied_at: manifest.applied_at,
        })
    }

    /// Rejects a non-terminal manifest by operator action.
    pub async fn reject(
        &self,
        manifest_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<(), GovernanceError> {
        let manifest = self
            .manifests
            .update(manifest_id, &mut |m| manifest::reject(m, Utc::now()))?;

        self.chain
            .append(
                event_type::MANIFEST_REJECTED,
                json!({
                    "manifest_id": manifest.id,
                    "actor": actor,
                    "reason": reason,
                }),
                None,
            )
            .await?;
        Ok(())
    }

    /// The audit chain this coordinator emits into.
    pub fn chain(&self) -> &AuditChain {
        &self.chain
    }

    fn verify_approver_signature(
        &self,
        approver_id: &str,
        preimage: &[u8],
        signature: &[u8],
    ) -> Result<(), GovernanceError> {
        let record = self
            .registry
            .get(approver_id)
            .map_err(|e| GovernanceError::Backend(e.to_string()))?
            .ok_or_else(|| {
                GovernanceError::Validation(format!(
                    "approver '{approver_id}' has no registered signer"
                ))
            })?;

        let verified =
            verify_payload(record.algorithm, &record.public_key, preimage, signature)
                .unwrap_or(false);
        if verified {
            return Ok(());
        }

        // The cached key may be stale after a rotation; re-fetch once and
        // re-verify before failing the request.
        let fresh = self
            .registry
            .get_fresh(approver_id)
            .map_err(|e| GovernanceError::Backend(e.to_string()))?;
        let verified = fresh
            .map(|record| {
                verify_payload(record.algorithm, &record.public_key, preimage, signature)
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        if verified {
            Ok(())
        } else {
            Err(GovernanceError::ApprovalSignatureInvalid {
                approver_id: approver_id.to_string(),
            })
        }
    }

    async fn emit_approval_recorded(
        &self,
        manifest: &Manifest,
        approver_id: &str,
        decision: ApprovalDecision,
    ) -> Result<(), GovernanceError> {
        self.chain
            .append(
                event_type::MANIFEST_APPROVAL_RECORDED,
                json!({
                    "manifest_id": manifest.id,
                    "approver_id": approver_id,
                    "decision": decision,
                    "approved_count": manifest.approved_count(),
                    "threshold": manifest.multisig_threshold,
                }),
                None,
            )
            .await?;
        Ok(())
    }
}

/// The canonical bytes an approver signs: the manifest's identity and
/// content hash plus the decision being taken. `notes` enters the preimage
/// only when present.
pub fn approval_preimage(
    manifest: &Manifest,
    approver_id: &str,
    decision: ApprovalDecision,
    notes: Option<&str>,
) -> Result<Vec<u8>, GovernanceError> {
    let canonical = canonical_json(&manifest.signing_view())
        .map_err(|e| GovernanceError::Signing(SigningError::from(e)))?;
    let manifest_hash = hex::encode(sha256(&canonical));

    let mut preimage = json!({
        "manifest_id": manifest.id,
        "manifest_hash": manifest_hash,
        "approver_id": approver_id,
        "decision": decision,
    });
    if let Some(notes) = notes {
        preimage["notes"] = Value::String(notes.to_string());
    }
    canonical_json(&preimage).map_err(|e| GovernanceError::Signing(SigningError::from(e)))
}
