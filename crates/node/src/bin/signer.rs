//! A standalone signing daemon speaking the kernel's proxy wire format.
//!
//! Serves `POST /sign`, `POST /verify`, and `GET /health` over an Ed25519
//! key loaded from (or generated into) a seed file. This is the reference
//! peer for `ProxyProvider` in development and integration environments;
//! production deployments front a real HSM or KMS behind the same routes.
//!
//! SECURITY: bind to loopback unless a firewall fronts the port.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::Parser;
use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::Filter;

use signet_api::provider::SigningProvider;
use signet_crypto::provider::local::LocalProvider;
use signet_node::telemetry;
use signet_types::model::SignPurpose;

#[derive(Parser, Debug)]
#[command(author, version, about = "Signet signing daemon", long_about = None)]
struct SignerOpts {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3030")]
    listen_addr: String,

    /// Path to the raw 32-byte Ed25519 seed file. Generated if missing.
    #[arg(long, default_value = "signer_key.seed")]
    key_file: PathBuf,

    /// The kid this daemon signs under.
    #[arg(long, default_value = "proxy-signer")]
    kid: String,
}

#[derive(Deserialize)]
struct SignRequest {
    canonical_payload: Option<String>,
    digest_hex: Option<String>,
    #[allow(dead_code)]
    algorithm: Option<String>,
    purpose: Option<String>,
}

#[derive(Serialize)]
struct SignResponse {
    signature_b64: String,
    signer_kid: String,
    algorithm: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    canonical_payload: Option<String>,
    digest_hex: Option<String>,
    signature_b64: String,
    #[allow(dead_code)]
    signer_kid: Option<String>,
}

#[derive(Serialize)]
struct VerifyResponse {
    verified: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn parse_purpose(tag: Option<&str>) -> SignPurpose {
    match tag {
        Some("audit") => SignPurpose::Audit,
        Some("approval") => SignPurpose::Approval,
        Some("license") => SignPurpose::License,
        _ => SignPurpose::Manifest,
    }
}

async fn handle_sign(
    provider: Arc<LocalProvider>,
    request: SignRequest,
) -> Result<warp::reply::Response, warp::Rejection> {
    use warp::reply::{json, with_status, Reply};

    let purpose = parse_purpose(request.purpose.as_deref());
    let outcome = match (&request.canonical_payload, &request.digest_hex) {
        (Some(payload), None) => provider.sign_payload(payload.as_bytes(), purpose).await,
        (None, Some(digest_hex)) => match decode_digest(digest_hex) {
            Ok(digest) => provider.sign_digest(&digest, purpose).await,
            Err(message) => {
                let body = json(&ErrorBody { error: message });
                return Ok(with_status(body, StatusCode::BAD_REQUEST).into_response());
            }
        },
        _ => {
            let body = json(&ErrorBody {
                error: "exactly one of canonical_payload or digest_hex is required".into(),
            });
            return Ok(with_status(body, StatusCode::BAD_REQUEST).into_response());
        }
    };

    match outcome {
        Ok(signature) => {
            tracing::info!(purpose = ?purpose, kid = %signature.kid, "signed request");
            let body = json(&SignResponse {
                signature_b64: BASE64.encode(&signature.sig),
                signer_kid: signature.kid,
                algorithm: signature.algorithm.as_str().to_string(),
            });
            Ok(body.into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "signing failed");
            let body = json(&ErrorBody {
                error: e.to_string(),
            });
            Ok(with_status(body, StatusCode::INTERNAL_SERVER_ERROR).into_response())
        }
    }
}

async fn handle_verify(
    provider: Arc<LocalProvider>,
    request: VerifyRequest,
) -> Result<warp::reply::Response, warp::Rejection> {
    use warp::reply::{json, with_status, Reply};

    let signature = match BASE64.decode(&request.signature_b64) {
        Ok(sig) => sig,
        Err(_) => {
            let body = json(&ErrorBody {
                error: "signature_b64 is not valid base64".into(),
            });
            return Ok(with_status(body, StatusCode::BAD_REQUEST).into_response());
        }
    };

    // Digest requests verify against the digest bytes as the signed
    // message, matching the provider's digest-signing convention.
    let payload: Vec<u8> = match (&request.canonical_payload, &request.digest_hex) {
        (Some(payload), None) => payload.as_bytes().to_vec(),
        (None, Some(digest_hex)) => match decode_digest(digest_hex) {
            Ok(digest) => {
                let verified = signet_crypto::sign::verify_digest(
                    provider.algorithm(),
                    &provider.public_key().await.unwrap_or_default(),
                    &digest,
                    &signature,
                )
                .unwrap_or(false);
                return Ok(json(&VerifyResponse { verified }).into_response());
            }
            Err(message) => {
                let body = json(&ErrorBody { error: message });
                return Ok(with_status(body, StatusCode::BAD_REQUEST).into_response());
            }
        },
        _ => {
            let body = json(&ErrorBody {
                error: "exactly one of canonical_payload or digest_hex is required".into(),
            });
            return Ok(with_status(body, StatusCode::BAD_REQUEST).into_response());
        }
    };

    let verified = provider.verify(&payload, &signature).await.unwrap_or(false);
    Ok(json(&VerifyResponse { verified }).into_response())
}

fn decode_digest(digest_hex: &str) -> Result<[u8; 32], String> {
    let bytes = hex::decode(digest_hex).map_err(|_| "digest_hex is not valid hex".to_string())?;
    bytes
        .try_into()
        .map_err(|_| "digest_hex must encode exactly 32 bytes".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing()?;
    let opts = SignerOpts::parse();

    let provider = Arc::new(
        LocalProvider::from_seed_file(&opts.key_file, opts.kid.clone())
            .context("failed to load signer key")?,
    );
    tracing::info!(kid = %opts.kid, key_file = %opts.key_file.display(), "signer key ready");

    let sign_provider = provider.clone();
    let sign = warp::path("sign")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(move |request: SignRequest| handle_sign(sign_provider.clone(), request));

    let verify_provider = provider.clone();
    let verify = warp::path("verify")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(move |request: VerifyRequest| handle_verify(verify_provider.clone(), request));

    let health_kid = opts.kid.clone();
    let health = warp::path("health").and(warp::get()).map(move || {
        warp::reply::json(&serde_json::json!({
            "ok": true,
            "signer_kid": health_kid,
        }))
    });

    let routes = sign.or(verify).or(health);
    let addr: std::net::SocketAddr = opts
        .listen_addr
        .parse()
        .context("invalid --listen-addr")?;
    tracing::info!(%addr, "signing daemon listening");
    warp::serve(routes).run(addr).await;
    Ok(())
}
