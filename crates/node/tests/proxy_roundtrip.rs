//! Drives `ProxyProvider` against an in-process daemon speaking the proxy
//! wire format, covering discovery, payload signing, digest signing, and
//! remote verification.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use warp::Filter;

use signet_api::provider::SigningProvider;
use signet_crypto::hash::sha256;
use signet_crypto::provider::local::LocalProvider;
use signet_crypto::provider::proxy::ProxyProvider;
use signet_types::model::{SignPurpose, SignatureAlgorithm};

/// Minimal wire-compliant signer routes over a local key.
fn routes(
    provider: Arc<LocalProvider>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let sign_provider = provider.clone();
    let sign = warp::path("sign")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(move |body: serde_json::Value| {
            let provider = sign_provider.clone();
            async move {
                let signature = if let Some(payload) = body["canonical_payload"].as_str() {
                    provider
                        .sign_payload(payload.as_bytes(), SignPurpose::Manifest)
                        .await
                        .unwrap()
                } else {
                    let digest: [u8; 32] = hex::decode(body["digest_hex"].as_str().unwrap())
                        .unwrap()
                        .try_into()
                        .unwrap();
                    provider
                        .sign_digest(&digest, SignPurpose::Audit)
                        .await
                        .unwrap()
                };
                Ok::<_, warp::Rejection>(warp::reply::json(&json!({
                    "signature_b64": BASE64.encode(&signature.sig),
                    "signer_kid": signature.kid,
                    "algorithm": signature.algorithm,
                })))
            }
        });

    let verify_provider = provider.clone();
    let verify = warp::path("verify")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(move |body: serde_json::Value| {
            let provider = verify_provider.clone();
            async move {
                let signature = BASE64
                    .decode(body["signature_b64"].as_str().unwrap())
                    .unwrap();
                let verified = provider
                    .verify(
                        body["canonical_payload"].as_str().unwrap().as_bytes(),
                        &signature,
                    )
                    .await
                    .unwrap();
                Ok::<_, warp::Rejection>(warp::reply::json(&json!({ "verified": verified })))
            }
        });

    let kid = provider.kid().to_string();
    let health = warp::path("health").and(warp::get()).map(move || {
        warp::reply::json(&json!({"ok": true, "signer_kid": kid}))
    });

    sign.or(verify).or(health)
}

#[tokio::test(flavor = "multi_thread")]
async fn proxy_provider_roundtrips_against_a_wire_compliant_daemon() {
    let local = Arc::new(LocalProvider::generate(SignatureAlgorithm::Ed25519).unwrap());
    let (addr, server) =
        warp::serve(routes(local.clone())).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    let base_url = format!("http://{addr}");
    let proxy = ProxyProvider::discover(
        base_url,
        SignatureAlgorithm::Ed25519,
        Duration::from_secs(2),
        1,
    )
    .await
    .unwrap();
    assert_eq!(proxy.kid(), local.kid());

    // Payload signing: remotely produced, locally verifiable.
    let payload = br#"{"id":"m1","impact":"LOW"}"#;
    let signature = proxy
        .sign_payload(payload, SignPurpose::Manifest)
        .await
        .unwrap();
    assert_eq!(signature.kid, local.kid());
    assert!(local.verify(payload, &signature.sig).await.unwrap());

    // Digest signing matches the local digest path bit-for-bit (Ed25519 is
    // deterministic).
    let digest = sha256(payload);
    let by_proxy = proxy.sign_digest(&digest, SignPurpose::Audit).await.unwrap();
    let by_local = local.sign_digest(&digest, SignPurpose::Audit).await.unwrap();
    assert_eq!(by_proxy.sig, by_local.sig);

    // Remote verification over the wire.
    assert!(proxy.verify(payload, &signature.sig).await.unwrap());
    assert!(!proxy.verify(b"tampered", &signature.sig).await.unwrap());
}
