//! The audit chain: sealed appends, replay, and verification.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use signet_api::archive::ArchivalSink;
use signet_api::error::ChainError;
use signet_api::provider::SigningProvider;
use signet_api::store::{AuditStore, SignerStore};
use signet_types::codec::canonical_json;
use signet_types::model::{
    AuditEvent, ChainFailure, ChainFailureReason, ChainHead, SignPurpose,
};

use signet_crypto::hash::chain_digest;
use signet_crypto::sign::verify_digest;

use crate::archive::{archive_key, spawn_archiver};

/// The outcome of verifying a chain range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Every event in the range verified.
    Ok,
    /// Verification stopped at the first bad event.
    FailureAt(ChainFailure),
}

/// Tuning knobs for one chain.
pub struct ChainOptions {
    /// Bound on queued appends; overflow fails fast with `ChainError::Busy`.
    pub queue_depth: usize,
    /// Optional WORM sink fed out-of-band after each commit.
    pub archive: Option<Arc<dyn ArchivalSink>>,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            archive: None,
        }
    }
}

struct AppendRequest {
    event_type: String,
    payload: Value,
    reply: oneshot::Sender<Result<AuditEvent, ChainError>>,
}

/// A handle to one audit chain.
///
/// Cloning is cheap; all clones feed the same single-writer task, so exactly
/// one writer observes any given chain tail. A caller that gives up on an
/// append (dropping its reply receiver) does not abort the append: once the
/// digest is signed the commit always completes, keeping the signature
/// observable in the chain.
#[derive(Clone)]
pub struct AuditChain {
    tx: mpsc::Sender<AppendRequest>,
    store: Arc<dyn AuditStore>,
    signers: Arc<dyn SignerStore>,
}

impl AuditChain {
    /// Spawns the writer task (and the archiver, when configured) and
    /// returns the chain handle.
    pub fn spawn(
        store: Arc<dyn AuditStore>,
        provider: Arc<dyn SigningProvider>,
        signers: Arc<dyn SignerStore>,
        options: ChainOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.queue_depth.max(1));
        let archive_tx = options.archive.map(spawn_archiver);

        let writer = ChainWriter {
            store: Arc::clone(&store),
            provider,
            signers: Arc::clone(&signers),
            archive_tx,
            halted: None,
        };
        tokio::spawn(writer.run(rx));

        Self { tx, store, signers }
    }

    /// Appends one event: reads the head, seals
    /// `SHA-256(C(payload) || head.hash)` with the chain signer, and commits
    /// the new row.
    ///
    /// `manifest_sig_id`, when given, is recorded in the payload under
    /// `signature_id` so the event links the manifest signature row.
    pub async fn append(
        &self,
        event_type: &str,
        payload: Value,
        manifest_sig_id: Option<String>,
    ) -> Result<AuditEvent, ChainError> {
        let payload = match (manifest_sig_id, payload) {
            (Some(sig_id), Value::Object(mut map)) => {
                map.insert("signature_id".to_string(), Value::String(sig_id));
                Value::Object(map)
            }
            (_, payload) => payload,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = AppendRequest {
            event_type: event_type.to_string(),
            payload,
            reply: reply_tx,
        };
        self.tx.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChainError::Busy,
            mpsc::error::TrySendError::Closed(_) => {
                ChainError::Backend("chain writer stopped".into())
            }
        })?;
        reply_rx
            .await
            .map_err(|_| ChainError::Backend("chain writer dropped the request".into()))?
    }

    /// The current chain head.
    pub fn head(&self) -> Result<ChainHead, ChainError> {
        self.store.head()
    }

    /// A lazy, restartable walk of the chain starting at `from_seq`.
    pub fn stream(&self, from_seq: u64) -> EventStream {
        EventStream {
            store: Arc::clone(&self.store),
            next_seq: from_seq.max(1),
        }
    }

    /// Re-verifies the events with `from <= seq <= to`: recomputes each
    /// digest, re-checks each signature against the registry, and confirms
    /// linkage and genesis uniqueness.
    pub fn verify(&self, from: u64, to: u64) -> Result<VerifyOutcome, ChainError> {
        verify_range(self.store.as_ref(), self.signers.as_ref(), from, to)
    }
}

/// A pull-based iterator over committed events.
pub struct EventStream {
    store: Arc<dyn AuditStore>,
    next_seq: u64,
}

impl Iterator for EventStream {
    type Item = Result<AuditEvent, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.store.get(self.next_seq) {
            Ok(Some(event)) => {
                self.next_seq += 1;
                Some(Ok(event))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

struct ChainWriter {
    store: Arc<dyn AuditStore>,
    provider: Arc<dyn SigningProvider>,
    signers: Arc<dyn SignerStore>,
    archive_tx: Option<mpsc::UnboundedSender<AuditEvent>>,
    halted: Option<ChainFailure>,
}

impl ChainWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<AppendRequest>) {
        while let Some(request) = rx.recv().await {
            if let Some(failure) = &self.halted {
                let _ = request.reply.send(Err(ChainError::Halted(failure.clone())));
                continue;
            }
            let result = self.append_one(request.event_type, request.payload).await;
            if let Err(ChainError::Halted(failure)) = &result {
                self.halted = Some(failure.clone());
            }
            // The caller may have gone away; the commit above still stands.
            let _ = request.reply.send(result);
        }
    }

    async fn append_one(
        &mut self,
        event_type: String,
        payload: Value,
    ) -> Result<AuditEvent, ChainError> {
        let head = self.store.head()?;
        let canonical = canonical_json(&payload)?;
        let digest = chain_digest(&canonical, &head.hash);

        let signature = self
            .provider
            .sign_digest(&digest, SignPurpose::Audit)
            .await?;

        // Self-check the fresh signature when the signer is registered. A
        // signature that does not verify against its own digest would poison
        // every future verification, so the chain halts instead of
        // committing it.
        if let Ok(Some(signer)) = self.signers.get(&signature.kid) {
            let ok = verify_digest(
                signer.algorithm,
                &signer.public_key,
                &digest,
                &signature.sig,
            )
            .unwrap_or(false);
            if !ok {
                let failure = ChainFailure {
                    seq: head.seq + 1,
                    reason: ChainFailureReason::SignatureInvalid,
                };
                tracing::error!(seq = failure.seq, kid = %signature.kid, "audit chain halted: fresh signature failed self-check");
                return Err(ChainError::Halted(failure));
            }
        }

        let event = AuditEvent {
            seq: head.seq + 1,
            event_type,
            payload,
            prev_hash: if head.seq == 0 {
                None
            } else {
                Some(head.hash.clone())
            },
            hash: digest.to_vec(),
            signature: signature.sig,
            signer_kid: signature.kid,
            created_at: Utc::now(),
        };

        self.store.append(event.clone())?;
        tracing::debug!(seq = event.seq, event_type = %event.event_type, "audit event committed");

        if let Some(archive_tx) = &self.archive_tx {
            if archive_tx.send(event.clone()).is_err() {
                tracing::warn!(
                    seq = event.seq,
                    key = %archive_key(&event),
                    "archiver task gone; event not archived"
                );
            }
        }

        Ok(event)
    }
}

/// Verification over a store and a signer directory, independent of any
/// running writer.
pub fn verify_range(
    store: &dyn AuditStore,
    signers: &dyn SignerStore,
    from: u64,
    to: u64,
) -> Result<VerifyOutcome, ChainError> {
    let from = from.max(1);
    let mut prev: Option<AuditEvent> = if from > 1 {
        store.get(from - 1)?
    } else {
        None
    };

    for event in store.range(from, to)? {
        // 1. The stored hash must match the recomputed digest.
        let canonical = canonical_json(&event.payload)?;
        let prev_bytes = event.prev_hash.as_deref().unwrap_or(&[]);
        let digest = chain_digest(&canonical, prev_bytes);
        if digest.as_slice() != event.hash.as_slice() {
            return Ok(VerifyOutcome::FailureAt(ChainFailure {
                seq: event.seq,
                reason: ChainFailureReason::HashMismatch,
            }));
        }

        // 2. The stored signature must verify against the stored hash under
        //    the registered key.
        let signer = match signers.get(&event.signer_kid) {
            Ok(Some(signer)) => signer,
            Ok(None) => {
                return Ok(VerifyOutcome::FailureAt(ChainFailure {
                    seq: event.seq,
                    reason: ChainFailureReason::SignerUnknown,
                }))
            }
            Err(e) => return Err(ChainError::Backend(e.to_string())),
        };
        let hash: [u8; 32] = match event.hash.as_slice().try_into() {
            Ok(hash) => hash,
            Err(_) => {
                return Ok(VerifyOutcome::FailureAt(ChainFailure {
                    seq: event.seq,
                    reason: ChainFailureReason::HashMismatch,
                }))
            }
        };
        let sig_ok = verify_digest(signer.algorithm, &signer.public_key, &hash, &event.signature)
            .unwrap_or(false);
        if !sig_ok {
            return Ok(VerifyOutcome::FailureAt(ChainFailure {
                seq: event.seq,
                reason: ChainFailureReason::SignatureInvalid,
            }));
        }

        // 3. Linkage: prev_hash must equal the previous event's hash, and
        //    only seq 1 may be genesis.
        match (&event.prev_hash, &prev) {
            (None, None) if event.seq == 1 => {}
            (None, _) => {
                return Ok(VerifyOutcome::FailureAt(ChainFailure {
                    seq: event.seq,
                    reason: ChainFailureReason::DuplicateGenesis,
                }))
            }
            (Some(_), None) if event.seq == from && from > 1 => {
                // Range starts mid-chain and the predecessor row is gone;
                // nothing to link against.
            }
            (Some(p), Some(previous)) if p == &previous.hash => {}
            (Some(_), _) => {
                return Ok(VerifyOutcome::FailureAt(ChainFailure {
                    seq: event.seq,
                    reason: ChainFailureReason::PrevLinkBroken,
                }))
            }
        }

        prev = Some(event);
    }

    Ok(VerifyOutcome::Ok)
}
