//! Signing provider implementations.
//!
//! Three variants stand behind [`signet_api::provider::SigningProvider`]:
//!
//! * [`local::LocalProvider`]: an in-process key pair, for development.
//! * [`proxy::ProxyProvider`]: an HTTPS signing proxy speaking the kernel's
//!   sign/verify wire format.
//! * [`kms::KmsProvider`]: a cloud KMS behind the vendor-neutral
//!   [`signet_api::provider::KmsApi`] seam.

pub mod kms;
pub mod local;
pub mod proxy;

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use signet_api::error::SigningError;

/// Upper bound on the jittered backoff before a retry.
const MAX_BACKOFF_MS: u64 = 250;

/// Runs `op` under `timeout`, retrying transient failures up to
/// `max_retries` times with jittered backoff.
///
/// Only failures classified transient by [`SigningError::is_transient`] are
/// retried; everything else surfaces immediately.
pub(crate) async fn call_with_retry<T, F, Fut>(
    timeout: Duration,
    max_retries: u32,
    op: F,
) -> Result<T, SigningError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SigningError>>,
{
    let mut attempt = 0u32;
    loop {
        let outcome = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(SigningError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_retries => {
                let backoff = rand::thread_rng().gen_range(1..=MAX_BACKOFF_MS);
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff,
                    error = %err,
                    "transient signing failure, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
