//! The signer registry service.
//!
//! Wraps a [`SignerStore`] with a process-local read cache and emits
//! `signer.registered` / `signer.retired` audit events. The cache is an
//! explicit object with a TTL: invalidations on register/retire are local to
//! this process, so distributed deployments treat reads as eventually
//! consistent and re-fetch through [`SignerRegistry::get_fresh`] when a
//! verification fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::json;

use signet_api::error::{RegistryError, SigningError};
use signet_api::store::SignerStore;
use signet_audit::AuditChain;
use signet_types::model::{event_type, SignatureAlgorithm, SignerRecord};

/// Default freshness window for cached registry reads.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

struct CacheSlot {
    fetched_at: Instant,
    record: SignerRecord,
}

/// The signer registry: `kid → {algorithm, key material}` with lifecycle.
pub struct SignerRegistry {
    store: Arc<dyn SignerStore>,
    chain: AuditChain,
    cache: RwLock<HashMap<String, CacheSlot>>,
    cache_ttl: Duration,
}

impl SignerRegistry {
    /// Builds a registry over a store, emitting lifecycle events to `chain`.
    pub fn new(store: Arc<dyn SignerStore>, chain: AuditChain) -> Self {
        Self {
            store,
            chain,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Overrides the cache TTL (tests shrink it; deployments mostly keep the
    /// default).
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Registers a signer: an idempotent upsert that refuses to rebind a kid
    /// to different key material. New registrations emit
    /// `signer.registered`.
    pub async fn register(
        &self,
        kid: &str,
        algorithm: SignatureAlgorithm,
        public_key: Vec<u8>,
    ) -> Result<SignerRecord, RegistryError> {
        if let Some(existing) = self.store.get(kid)? {
            if existing.algorithm == algorithm && existing.public_key == public_key {
                return Ok(existing);
            }
            return Err(RegistryError::KidConflict {
                kid: kid.to_string(),
            });
        }

        let record = SignerRecord {
            kid: kid.to_string(),
            algorithm,
            public_key,
            created_at: Utc::now(),
            retired_at: None,
        };
        self.store.insert(record.clone())?;
        self.cache.write().remove(kid);
        tracing::info!(kid, algorithm = %algorithm, "signer registered");

        self.emit(
            event_type::SIGNER_REGISTERED,
            json!({
                "kid": record.kid,
                "algorithm": record.algorithm,
                "public_key": b64(&record.public_key),
            }),
        )
        .await;
        Ok(record)
    }

    /// Fetches a signer, via the cache when fresh.
    pub fn get(&self, kid: &str) -> Result<Option<SignerRecord>, RegistryError> {
        {
            let cache = self.cache.read();
            if let Some(slot) = cache.get(kid) {
                if slot.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(Some(slot.record.clone()));
                }
            }
        }
        self.get_fresh(kid)
    }

    /// Fetches a signer straight from the store, refreshing the cache.
    ///
    /// Verifiers call this after a signature fails under a cached key, in
    /// case the registry entry rotated underneath them.
    pub fn get_fresh(&self, kid: &str) -> Result<Option<SignerRecord>, RegistryError> {
        let record = self.store.get(kid)?;
        let mut cache = self.cache.write();
        match &record {
            Some(record) => {
                cache.insert(
                    kid.to_string(),
                    CacheSlot {
                        fetched_at: Instant::now(),
                        record: record.clone(),
                    },
                );
            }
            None => {
                cache.remove(kid);
            }
        }
        Ok(record)
    }

    /// All signers, newest first.
    pub fn list(&self) -> Result<Vec<SignerRecord>, RegistryError> {
        self.store.list()
    }

    /// Retires a signer. The row survives forever so old chain signatures
    /// keep verifying; only new signings are refused. Emits
    /// `signer.retired`.
    pub async fn retire(&self, kid: &str) -> Result<SignerRecord, RegistryError> {
        let record = self.store.mark_retired(kid, Utc::now())?;
        self.cache.write().remove(kid);
        tracing::info!(kid, "signer retired");

        self.emit(
            event_type::SIGNER_RETIRED,
            json!({
                "kid": record.kid,
                "retired_at": record.retired_at,
            }),
        )
        .await;
        Ok(record)
    }

    /// Confirms a kid is registered and not retired, for use on signing
    /// paths.
    pub fn ensure_active(&self, kid: &str) -> Result<SignerRecord, SigningError> {
        match self.get(kid) {
            Ok(Some(record)) if record.is_active() => Ok(record),
            Ok(Some(_)) => Err(SigningError::Retired(kid.to_string())),
            Ok(None) => Err(SigningError::UnknownSigner(kid.to_string())),
            Err(e) => Err(SigningError::Unavailable(e.to_string())),
        }
    }

    async fn emit(&self, event: &str, payload: serde_json::Value) {
        // Registry mutations are already durable; a chain hiccup here is
        // logged, not propagated, mirroring the archival contract.
        if let Err(e) = self.chain.append(event, payload, None).await {
            tracing::warn!(event, error = %e, "failed to append registry lifecycle event");
        }
    }
}

fn b64(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(bytes)
}

/// An in-memory signer table.
#[derive(Default)]
pub struct MemorySignerStore {
    rows: RwLock<Vec<SignerRecord>>,
}

impl MemorySignerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignerStore for MemorySignerStore {
    fn insert(&self, record: SignerRecord) -> Result<(), RegistryError> {
        let mut rows = self.rows.write();
        if rows.iter().any(|r| r.kid == record.kid) {
            return Err(RegistryError::KidConflict { kid: record.kid });
        }
        rows.push(record);
        Ok(())
    }

    fn get(&self, kid: &str) -> Result<Option<SignerRecord>, RegistryError> {
        Ok(self.rows.read().iter().find(|r| r.kid == kid).cloned())
    }

    fn list(&self) -> Result<Vec<SignerRecord>, RegistryError> {
        let mut rows = self.rows.read().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn mark_retired(
        &self,
        kid: &str,
        at: chrono::DateTime<Utc>,
    ) -> Result<SignerRecord, RegistryError> {
        let mut rows = self.rows.write();
        let row = rows
            .iter_mut()
            .find(|r| r.kid == kid)
            .ok_or_else(|| RegistryError::NotFound(kid.to_string()))?;
        if row.retired_at.is_none() {
            row.retired_at = Some(at);
        }
        Ok(row.clone())
    }
}
