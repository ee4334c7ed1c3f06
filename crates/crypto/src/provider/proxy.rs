//! The HTTPS signing proxy provider.
//!
//! Speaks the kernel's proxy wire format: `POST /sign` with either the
//! canonical payload or a precomputed digest, `POST /verify`, and
//! `GET /health` for kid discovery. Transient failures (connect errors,
//! 5xx) are retried once with jittered backoff; 4xx responses are fatal.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use signet_api::error::SigningError;
use signet_api::provider::{ProviderSignature, SigningProvider};
use signet_types::model::{SignPurpose, SignatureAlgorithm};

use super::call_with_retry;

#[derive(Serialize)]
struct SignRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_payload: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest_hex: Option<String>,
    algorithm: &'a str,
    purpose: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    signature_b64: String,
    signer_kid: String,
    algorithm: String,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_payload: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    digest_hex: Option<String>,
    signature_b64: String,
    signer_kid: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    verified: bool,
}

#[derive(Deserialize)]
struct HealthResponse {
    ok: bool,
    signer_kid: String,
}

/// A signing provider backed by an external signer daemon.
pub struct ProxyProvider {
    client: Client,
    base_url: String,
    kid: String,
    algorithm: SignatureAlgorithm,
    timeout: Duration,
    max_retries: u32,
}

impl ProxyProvider {
    /// Builds a provider for a proxy whose kid is already known.
    pub fn new(
        base_url: impl Into<String>,
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, SigningError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SigningError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            kid: kid.into(),
            algorithm,
            timeout,
            max_retries,
        })
    }

    /// Builds a provider by asking the proxy's health endpoint for its kid.
    pub async fn discover(
        base_url: impl Into<String>,
        algorithm: SignatureAlgorithm,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, SigningError> {
        let mut provider = Self::new(base_url, String::new(), algorithm, timeout, max_retries)?;
        let health = provider.health().await?;
        provider.kid = health;
        Ok(provider)
    }

    /// Probes `GET /health`, returning the proxy's signer kid.
    pub async fn health(&self) -> Result<String, SigningError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let health: HealthResponse = decode_response(response).await?;
        if !health.ok {
            return Err(SigningError::Unavailable("proxy reports not ok".into()));
        }
        Ok(health.signer_kid)
    }

    async fn post_sign(&self, request: &SignRequest<'_>) -> Result<ProviderSignature, SigningError> {
        let url = format!("{}/sign", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let body: SignResponse = decode_response(response).await?;
        let algorithm = SignatureAlgorithm::parse(&body.algorithm)
            .ok_or_else(|| SigningError::Remote(format!("unknown algorithm '{}'", body.algorithm)))?;
        let sig = BASE64
            .decode(&body.signature_b64)
            .map_err(|e| SigningError::Remote(format!("undecodable signature: {e}")))?;
        Ok(ProviderSignature {
            kid: body.signer_kid,
            algorithm,
            sig,
        })
    }
}

#[async_trait]
impl SigningProvider for ProxyProvider {
    fn kid(&self) -> &str {
        &self.kid
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    async fn sign_payload(
        &self,
        payload: &[u8],
        purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError> {
        let canonical = std::str::from_utf8(payload)
            .map_err(|e| SigningError::Remote(format!("payload is not UTF-8: {e}")))?;
        call_with_retry(self.timeout, self.max_retries, || {
            let request = SignRequest {
                canonical_payload: Some(canonical),
                digest_hex: None,
                algorithm: self.algorithm.as_str(),
                purpose: purpose.as_str(),
            };
            async move { self.post_sign(&request).await }
        })
        .await
    }

    async fn sign_digest(
        &self,
        digest: &[u8; 32],
        purpose: SignPurpose,
    ) -> Result<ProviderSignature, SigningError> {
        let digest_hex = hex::encode(digest);
        call_with_retry(self.timeout, self.max_retries, || {
            let request = SignRequest {
                canonical_payload: None,
                digest_hex: Some(digest_hex.clone()),
                algorithm: self.algorithm.as_str(),
                purpose: purpose.as_str(),
            };
            async move { self.post_sign(&request).await }
        })
        .await
    }

    async fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        let canonical = std::str::from_utf8(payload)
            .map_err(|e| SigningError::Remote(format!("payload is not UTF-8: {e}")))?;
        let signature_b64 = BASE64.encode(signature);
        let url = format!("{}/verify", self.base_url);
        call_with_retry(self.timeout, self.max_retries, || {
            let request = VerifyRequest {
                canonical_payload: Some(canonical),
                digest_hex: None,
                signature_b64: signature_b64.clone(),
                signer_kid: &self.kid,
            };
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(map_transport_error)?;
                let body: VerifyResponse = decode_response(response).await?;
                Ok(body.verified)
            }
        })
        .await
    }

    async fn public_key(&self) -> Result<Vec<u8>, SigningError> {
        Err(SigningError::Remote(
            "the proxy does not export key material; read it from the signer registry".into(),
        ))
    }
}

fn map_transport_error(err: reqwest::Error) -> SigningError {
    if err.is_timeout() {
        SigningError::Timeout { timeout_ms: 0 }
    } else {
        SigningError::Unavailable(err.to_string())
    }
}

async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SigningError> {
    let status = response.status();
    if status.is_server_error() {
        return Err(SigningError::Unavailable(format!(
            "proxy returned {status}"
        )));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SigningError::Remote(format!("proxy returned {status}: {body}")));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| SigningError::Remote(format!("undecodable proxy response: {e}")))
}
