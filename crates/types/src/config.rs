//! The kernel's explicit runtime configuration.
//!
//! All dynamic configuration is resolved once at startup into a [`Config`]
//! record that is passed into constructors. Components never read ambient
//! environment variables themselves.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Object-lock mode for archived audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectLockMode {
    /// Privileged operators may shorten retention.
    Governance,
    /// Retention cannot be shortened by anyone.
    Compliance,
}

/// The recognized configuration surface of the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Disallow the in-process local signing provider. Startup fails unless a
    /// KMS or signing proxy is configured.
    pub require_kms: bool,
    /// Require client certificates on the signing proxy and governance
    /// endpoints.
    pub require_mtls: bool,
    /// Base URL of the signing proxy, if one is deployed.
    pub signing_proxy_url: Option<String>,
    /// Per-call deadline for signing proxy requests.
    pub signing_proxy_timeout: Duration,
    /// Retries after the first signing attempt (transient failures only).
    pub signing_proxy_max_retries: u32,
    /// Bucket receiving archived audit events, if archival is enabled.
    pub audit_archive_bucket: Option<String>,
    /// Object-lock mode applied to archived events.
    pub audit_object_lock_mode: ObjectLockMode,
    /// Retention window for idempotency records.
    pub idempotency_ttl: Duration,
    /// Threshold assigned when a multisig request does not name one.
    pub multisig_default_threshold: u32,
    /// Policy gate endpoint; `None` disables the gate entirely.
    pub policy_gate_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            require_kms: false,
            require_mtls: false,
            signing_proxy_url: None,
            signing_proxy_timeout: Duration::from_millis(3_000),
            signing_proxy_max_retries: 1,
            audit_archive_bucket: None,
            audit_object_lock_mode: ObjectLockMode::Governance,
            idempotency_ttl: Duration::from_secs(86_400),
            multisig_default_threshold: 2,
            policy_gate_url: None,
        }
    }
}

/// Minimum idempotency retention; anything shorter cannot cover realistic
/// client retry windows.
pub const IDEMPOTENCY_TTL_FLOOR_SECS: u64 = 3_600;

impl Config {
    /// Builds a config from the process environment, applying defaults for
    /// unset keys and rejecting unparseable or out-of-range values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Config::default();

        if let Some(v) = read("REQUIRE_KMS") {
            cfg.require_kms = parse_bool("REQUIRE_KMS", &v)?;
        }
        if let Some(v) = read("REQUIRE_MTLS") {
            cfg.require_mtls = parse_bool("REQUIRE_MTLS", &v)?;
        }
        cfg.signing_proxy_url = read("SIGNING_PROXY_URL");
        if let Some(v) = read("SIGNING_PROXY_TIMEOUT_MS") {
            cfg.signing_proxy_timeout =
                Duration::from_millis(parse_u64("SIGNING_PROXY_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = read("SIGNING_PROXY_MAX_RETRIES") {
            cfg.signing_proxy_max_retries =
                parse_u64("SIGNING_PROXY_MAX_RETRIES", &v)? as u32;
        }
        cfg.audit_archive_bucket = read("AUDIT_ARCHIVE_BUCKET");
        if let Some(v) = read("AUDIT_OBJECT_LOCK_MODE") {
            cfg.audit_object_lock_mode = match v.to_ascii_uppercase().as_str() {
                "GOVERNANCE" => ObjectLockMode::Governance,
                "COMPLIANCE" => ObjectLockMode::Compliance,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "AUDIT_OBJECT_LOCK_MODE",
                        reason: format!("expected GOVERNANCE or COMPLIANCE, got '{other}'"),
                    })
                }
            };
        }
        if let Some(v) = read("IDEMPOTENCY_TTL_SECONDS") {
            let secs = parse_u64("IDEMPOTENCY_TTL_SECONDS", &v)?;
            if secs < IDEMPOTENCY_TTL_FLOOR_SECS {
                return Err(ConfigError::Invalid {
                    key: "IDEMPOTENCY_TTL_SECONDS",
                    reason: format!("minimum is {IDEMPOTENCY_TTL_FLOOR_SECS}, got {secs}"),
                });
            }
            cfg.idempotency_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = read("MULTISIG_DEFAULT_THRESHOLD") {
            cfg.multisig_default_threshold =
                parse_u64("MULTISIG_DEFAULT_THRESHOLD", &v)? as u32;
        }
        cfg.policy_gate_url = read("POLICY_GATE_URL").filter(|s| !s.is_empty());

        Ok(cfg)
    }

    /// Enforces the production-signing invariant: with `require_kms` set, a
    /// deployment without a KMS or proxy signer must not start.
    pub fn validate_signing_backend(&self, kms_configured: bool) -> Result<(), ConfigError> {
        if self.require_kms && !kms_configured && self.signing_proxy_url.is_none() {
            return Err(ConfigError::KmsRequired);
        }
        Ok(())
    }
}

fn read(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_bool(key: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_u64(key: &'static str, v: &str) -> Result<u64, ConfigError> {
    v.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
