//! Policy gate implementations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use signet_api::error::GovernanceError;
use signet_api::policy::{PolicyDecision, PolicyGate, PolicyQuery};

/// The gate used when no `POLICY_GATE_URL` is configured: every action is
/// allowed and nothing is consulted.
pub struct DisabledGate;

#[async_trait]
impl PolicyGate for DisabledGate {
    async fn decide(&self, _query: &PolicyQuery) -> Result<PolicyDecision, GovernanceError> {
        Ok(PolicyDecision::Allow)
    }
}

/// A gate with a fixed verdict, for tests and break-glass configuration.
pub struct StaticGate {
    decision: PolicyDecision,
}

impl StaticGate {
    /// A gate that always allows.
    pub fn allow() -> Self {
        Self {
            decision: PolicyDecision::Allow,
        }
    }

    /// A gate that always denies with the given policy id and reason.
    pub fn deny(policy_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            decision: PolicyDecision::Deny {
                policy_id: policy_id.into(),
                reason: reason.into(),
            },
        }
    }
}

#[async_trait]
impl PolicyGate for StaticGate {
    async fn decide(&self, _query: &PolicyQuery) -> Result<PolicyDecision, GovernanceError> {
        Ok(self.decision.clone())
    }
}

/// Default deadline for remote policy decisions.
const DEFAULT_DEADLINE: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
enum WireDecision {
    Allow,
    Deny {
        policy_id: String,
        reason: String,
    },
}

/// A remote policy decision point reached over HTTP.
///
/// Transport failures and timeouts surface as backend errors rather than
/// denials: an unreachable gate blocks applies without attributing the
/// refusal to a policy.
pub struct HttpPolicyGate {
    client: Client,
    url: String,
}

impl HttpPolicyGate {
    /// Builds a gate for the given decision endpoint.
    pub fn new(url: impl Into<String>) -> Result<Self, GovernanceError> {
        let client = Client::builder()
            .timeout(DEFAULT_DEADLINE)
            .build()
            .map_err(|e| GovernanceError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PolicyGate for HttpPolicyGate {
    async fn decide(&self, query: &PolicyQuery) -> Result<PolicyDecision, GovernanceError> {
        let response = self
            .client
            .post(&self.url)
            .json(query)
            .send()
            .await
            .map_err(|e| GovernanceError::Backend(format!("policy gate unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(GovernanceError::Backend(format!(
                "policy gate returned {}",
                response.status()
            )));
        }
        let decision: WireDecision = response
            .json()
            .await
            .map_err(|e| GovernanceError::Backend(format!("undecodable policy response: {e}")))?;
        Ok(match decision {
            WireDecision::Allow => PolicyDecision::Allow,
            WireDecision::Deny { policy_id, reason } => PolicyDecision::Deny { policy_id, reason },
        })
    }
}
