//! HMAC-SHA256 tagging for internal-trust signers.
//!
//! Tag comparison is constant-time; the `hmac` crate's `verify_slice` is the
//! only comparison path.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use signet_api::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted key length in bytes.
const MIN_KEY_LEN: usize = 32;

/// Computes an HMAC-SHA256 tag over the message.
pub fn sign(key: &[u8], message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut mac = mac_for(key)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verifies a tag in constant time.
pub fn verify(key: &[u8], message: &[u8], tag: &[u8]) -> Result<bool, CryptoError> {
    let mut mac = mac_for(key)?;
    mac.update(message);
    Ok(mac.verify_slice(tag).is_ok())
}

fn mac_for(key: &[u8]) -> Result<HmacSha256, CryptoError> {
    if key.len() < MIN_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "HMAC key must be at least {MIN_KEY_LEN} bytes"
        )));
    }
    HmacSha256::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}
