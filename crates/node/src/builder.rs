//! Assembles a running kernel from a [`Config`] and a set of stores.

use std::sync::Arc;
use std::time::Duration;

use signet_api::archive::ArchivalSink;
use signet_api::error::{ConfigError, KernelError};
use signet_api::policy::PolicyGate;
use signet_api::provider::SigningProvider;
use signet_api::store::{AuditStore, IdempotencyStore, ManifestStore};
use signet_audit::{AuditChain, ChainOptions};
use signet_crypto::provider::local::LocalProvider;
use signet_crypto::provider::proxy::ProxyProvider;
use signet_governance::{
    DisabledGate, GovernanceCoordinator, HttpPolicyGate, MemoryIdempotencyStore,
    MemoryManifestStore, MemorySignerStore, SignerRegistry,
};
use signet_types::config::Config;
use signet_types::model::SignatureAlgorithm;

/// How the kernel will produce signatures.
pub enum SigningBackend {
    /// An external signing proxy at the configured URL.
    Proxy,
    /// A caller-supplied provider (typically a KMS adapter).
    Provided(Arc<dyn SigningProvider>),
    /// An in-process dev key. Refused when `require_kms` is set.
    Local,
}

/// A fully wired kernel.
pub struct Kernel {
    /// The governance entry point.
    pub coordinator: Arc<GovernanceCoordinator>,
    /// The audit chain handle.
    pub chain: AuditChain,
    /// The signer registry.
    pub registry: Arc<SignerRegistry>,
    /// The resolved configuration.
    pub config: Config,
}

/// Builds a kernel: validates the signing backend against the config,
/// spawns the audit chain, and wires the coordinator.
///
/// The audit store is the caller's choice (durable `redb` in the binaries,
/// memory in tests), as is the archival sink feeding the configured bucket;
/// manifest and idempotency stores default to memory.
pub async fn build_kernel(
    config: Config,
    backend: SigningBackend,
    audit_store: Arc<dyn AuditStore>,
    archive: Option<Arc<dyn ArchivalSink>>,
) -> Result<Kernel, KernelError> {
    let kms_configured = matches!(backend, SigningBackend::Provided(_));
    config.validate_signing_backend(kms_configured)?;

    if config.require_mtls {
        if let Some(url) = &config.signing_proxy_url {
            if !url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    key: "SIGNING_PROXY_URL",
                    reason: "REQUIRE_MTLS demands an https proxy endpoint".into(),
                }
                .into());
            }
        }
    }

    let provider: Arc<dyn SigningProvider> = match backend {
        SigningBackend::Provided(provider) => provider,
        SigningBackend::Proxy => {
            let url = config.signing_proxy_url.clone().ok_or(ConfigError::Invalid {
                key: "SIGNING_PROXY_URL",
                reason: "proxy backend selected but no URL configured".into(),
            })?;
            let provider = ProxyProvider::discover(
                url,
                SignatureAlgorithm::Ed25519,
                config.signing_proxy_timeout,
                config.signing_proxy_max_retries,
            )
            .await?;
            tracing::info!(kid = provider.kid(), "connected to signing proxy");
            Arc::new(provider)
        }
        SigningBackend::Local => {
            tracing::warn!("using the in-process dev signer; not for production");
            Arc::new(LocalProvider::generate(SignatureAlgorithm::Ed25519)?)
        }
    };

    if config.audit_archive_bucket.is_some() && archive.is_none() {
        tracing::warn!(
            bucket = config.audit_archive_bucket.as_deref(),
            "AUDIT_ARCHIVE_BUCKET is set but no archival sink was provided; events will not be archived"
        );
    }

    let signer_store = Arc::new(MemorySignerStore::new());
    let chain = AuditChain::spawn(
        audit_store,
        Arc::clone(&provider),
        signer_store.clone(),
        ChainOptions {
            archive,
            ..ChainOptions::default()
        },
    );
    let registry = Arc::new(SignerRegistry::new(signer_store, chain.clone()));

    // Self-register the signer when its key material is exportable. Proxy
    // deployments register their kid out-of-band (the proxy never ships a
    // public key in-band).
    match provider.public_key().await {
        Ok(public_key) => {
            registry
                .register(provider.kid(), provider.algorithm(), public_key)
                .await
                .map_err(|e| KernelError::Internal(e.to_string()))?;
        }
        Err(_) => {
            tracing::warn!(
                kid = provider.kid(),
                "signer key not exportable; register it in the signer registry out-of-band"
            );
        }
    }

    let gate: Arc<dyn PolicyGate> = match &config.policy_gate_url {
        Some(url) => Arc::new(HttpPolicyGate::new(url.clone())?),
        None => Arc::new(DisabledGate),
    };

    let manifests: Arc<dyn ManifestStore> = Arc::new(MemoryManifestStore::new());
    let idempotency: Arc<dyn IdempotencyStore> = Arc::new(MemoryIdempotencyStore::new());

    let coordinator = Arc::new(GovernanceCoordinator::new(
        manifests,
        Arc::clone(&idempotency),
        Arc::clone(&registry),
        provider,
        chain.clone(),
        gate,
        config.multisig_default_threshold,
    ));

    spawn_idempotency_sweeper(idempotency, config.idempotency_ttl);

    Ok(Kernel {
        coordinator,
        chain,
        registry,
        config,
    })
}

/// Periodically drops idempotency records older than the TTL.
fn spawn_idempotency_sweeper(store: Arc<dyn IdempotencyStore>, ttl: Duration) {
    let period = (ttl / 10).max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now()
                - chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));
            match store.sweep_expired(cutoff) {
                Ok(0) => {}
                Ok(n) => tracing::debug!(swept = n, "idempotency records expired"),
                Err(e) => tracing::warn!(error = %e, "idempotency sweep failed"),
            }
        }
    });
}
