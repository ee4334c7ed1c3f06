//! The kernel node binary.
//!
//! `run` starts a wired kernel and holds it until shutdown; `verify-chain`
//! is the operator tool for re-checking a durable chain after an integrity
//! halt or before a restore.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use signet_api::store::{AuditStore, SignerStore};
use signet_audit::{verify_range, MemoryAuditStore, RedbAuditStore, VerifyOutcome};
use signet_governance::MemorySignerStore;
use signet_node::{build_kernel, telemetry, SigningBackend};
use signet_types::config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about = "Signet trust kernel node", long_about = None)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the kernel and serve until interrupted.
    Run {
        /// Path to the durable audit chain database. Omit for an ephemeral
        /// in-memory chain (dev only).
        #[arg(long)]
        audit_db: Option<PathBuf>,
    },
    /// Re-verify a durable audit chain and report the first bad event.
    VerifyChain {
        /// Path to the audit chain database.
        #[arg(long)]
        audit_db: PathBuf,
        /// First sequence number to check.
        #[arg(long, default_value_t = 1)]
        from: u64,
        /// Last sequence number to check; defaults to the chain head.
        #[arg(long)]
        to: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing()?;
    let opts = Opts::parse();

    match opts.command {
        Command::Run { audit_db } => run(audit_db).await,
        Command::VerifyChain { audit_db, from, to } => verify_chain(audit_db, from, to),
    }
}

async fn run(audit_db: Option<PathBuf>) -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let audit_store: Arc<dyn AuditStore> = match &audit_db {
        Some(path) => {
            Arc::new(RedbAuditStore::open(path).context("failed to open audit chain database")?)
        }
        None => {
            tracing::warn!("no --audit-db given; using an in-memory chain");
            Arc::new(MemoryAuditStore::new())
        }
    };

    let backend = if config.signing_proxy_url.is_some() {
        SigningBackend::Proxy
    } else {
        SigningBackend::Local
    };

    let kernel = build_kernel(config, backend, audit_store, None)
        .await
        .context("kernel startup failed")?;

    let head = kernel.chain.head().map_err(anyhow::Error::from)?;
    tracing::info!(
        chain_seq = head.seq,
        signers = kernel.registry.list().map(|s| s.len()).unwrap_or(0),
        "kernel ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

fn verify_chain(audit_db: PathBuf, from: u64, to: Option<u64>) -> Result<()> {
    let store = RedbAuditStore::open(&audit_db).context("failed to open audit chain database")?;
    // Verification needs the signer directory; a detached check that only
    // recomputes hashes uses an empty one and reports the first signer as
    // unknown, so operators are expected to restore the registry first.
    // Here the registry rows are replayed from the chain itself.
    let signers = MemorySignerStore::new();
    replay_signers(&store, &signers)?;

    let head = store.head().map_err(anyhow::Error::from)?;
    let to = to.unwrap_or(head.seq);
    match verify_range(&store, &signers, from, to).map_err(anyhow::Error::from)? {
        VerifyOutcome::Ok => {
            println!("ok: events {from}..={to} verified");
            Ok(())
        }
        VerifyOutcome::FailureAt(failure) => {
            bail!("verification failed at seq {}: {}", failure.seq, failure.reason)
        }
    }
}

/// Rebuilds the signer directory from `signer.registered` events so the
/// chain is self-verifying.
fn replay_signers(store: &dyn AuditStore, signers: &dyn SignerStore) -> Result<()> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let head = store.head().map_err(anyhow::Error::from)?;
    for event in store.range(1, head.seq).map_err(anyhow::Error::from)? {
        if event.event_type != signet_types::model::event_type::SIGNER_REGISTERED {
            continue;
        }
        let kid = event.payload["kid"].as_str().unwrap_or_default().to_string();
        let algorithm = event.payload["algorithm"]
            .as_str()
            .and_then(signet_types::model::SignatureAlgorithm::parse);
        let public_key = event.payload["public_key"]
            .as_str()
            .and_then(|s| STANDARD.decode(s).ok());
        if let (Some(algorithm), Some(public_key)) = (algorithm, public_key) {
            let _ = signers.insert(signet_types::model::SignerRecord {
                kid,
                algorithm,
                public_key,
                created_at: event.created_at,
                retired_at: None,
            });
        }
    }
    Ok(())
}
