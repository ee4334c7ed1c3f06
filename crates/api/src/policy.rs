//! The allow/deny decision point consulted before manifest application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GovernanceError;

/// What the coordinator asks the gate about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyQuery {
    /// The action being attempted, e.g. `manifest.apply`.
    pub action: String,
    /// The principal attempting it.
    pub actor: String,
    /// The resource acted on, e.g. a manifest id.
    pub resource: String,
    /// Additional structured context (impact, threshold, approvals).
    pub context: Value,
}

/// The gate's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Proceed.
    Allow,
    /// Refuse, with an attributable policy and an actor-safe rationale.
    Deny {
        /// The policy that fired.
        policy_id: String,
        /// Why it fired.
        reason: String,
    },
}

/// A pluggable policy decision point.
///
/// The coordinator consults the gate before `apply`; a deny short-circuits
/// without advancing manifest state. Deployments without a gate configured
/// use an implementation that always allows.
#[async_trait]
pub trait PolicyGate: Send + Sync {
    /// Evaluates a query within the gate's deadline.
    async fn decide(&self, query: &PolicyQuery) -> Result<PolicyDecision, GovernanceError>;
}
