//! Kernel wiring tests: signing-backend enforcement and a full in-process
//! lifecycle over a durable chain.

use std::sync::Arc;

use serde_json::json;

use signet_api::error::{ConfigError, KernelError};
use signet_audit::{MemoryAuditStore, RedbAuditStore, VerifyOutcome};
use signet_governance::SubmitRequest;
use signet_node::{build_kernel, SigningBackend};
use signet_types::config::Config;
use signet_types::model::Impact;

#[tokio::test]
async fn require_kms_refuses_the_local_backend() {
    let config = Config {
        require_kms: true,
        ..Config::default()
    };
    let result = build_kernel(
        config,
        SigningBackend::Local,
        Arc::new(MemoryAuditStore::new()),
        None,
    )
    .await;
    assert!(matches!(
        result,
        Err(KernelError::Config(ConfigError::KmsRequired))
    ));
}

#[tokio::test]
async fn require_mtls_refuses_plaintext_proxy_endpoints() {
    let config = Config {
        require_mtls: true,
        signing_proxy_url: Some("http://signer.internal:3030".into()),
        ..Config::default()
    };
    let result = build_kernel(
        config,
        SigningBackend::Proxy,
        Arc::new(MemoryAuditStore::new()),
        None,
    )
    .await;
    assert!(matches!(
        result,
        Err(KernelError::Config(ConfigError::Invalid { .. }))
    ));
}

#[tokio::test]
async fn a_dev_kernel_runs_the_full_lifecycle_durably() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("audit.redb");

    let kernel = build_kernel(
        Config::default(),
        SigningBackend::Local,
        Arc::new(RedbAuditStore::open(&db_path).unwrap()),
        Some(Arc::new(signet_audit::MemorySink::new())),
    )
    .await
    .unwrap();

    let response = kernel
        .coordinator
        .submit(
            SubmitRequest {
                id: "m1".into(),
                package_ref: "pkg://platform/core".into(),
                impact: Impact::Low,
                preconditions: json!({}),
            },
            "k-001",
            "deployer",
        )
        .await
        .unwrap();
    assert_eq!(response.status_code, 201);

    kernel.coordinator.apply("m1", "deployer").await.unwrap();

    let head = kernel.chain.head().unwrap();
    assert!(head.seq >= 4); // signer.registered + submitted + signed + applied
    assert_eq!(kernel.chain.verify(1, head.seq).unwrap(), VerifyOutcome::Ok);

    // Replay: downstream projections rebuild from any seq.
    let replayed: Vec<_> = kernel.chain.stream(1).collect::<Result<_, _>>().unwrap();
    assert_eq!(replayed.len() as u64, head.seq);
    assert_eq!(replayed.last().unwrap().event_type, "manifest.applied");
}
