//! Defines the canonical, deterministic byte encoding for all signed state.
//!
//! This module wraps `serde_jcs`, an implementation of the JSON
//! Canonicalization Scheme (RFC 8785): object keys sorted lexicographically at
//! every depth, arrays in given order, no insignificant whitespace, numbers in
//! shortest ES6 decimal form, and minimal string escaping. By centralizing the
//! codec here in the base `types` crate, every component hashes and signs the
//! exact same bytes for the same value, which is what makes signatures and
//! chain hashes reproducible across processes and releases.

use serde::Serialize;
use serde_json::Value;

use crate::error::EncodingError;

/// Encodes any serializable value into its unique canonical byte
/// representation.
///
/// Fails with [`EncodingError`] if the value cannot be represented as
/// canonical JSON; in particular NaN and infinite floating point numbers are
/// rejected rather than silently coerced.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodingError> {
    serde_jcs::to_vec(value).map_err(|e| EncodingError::Serialize(e.to_string()))
}

/// Encodes an already-parsed JSON value into canonical bytes.
///
/// `serde_json::Value` cannot hold non-finite numbers, so this function is
/// total on its input space.
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, EncodingError> {
    canonicalize(value)
}

/// Serde adapter for byte fields carried as base64 strings on the wire.
///
/// The persistence contracts store raw bytes (`bytea`); anywhere a row is
/// rendered as JSON the byte columns travel as standard base64.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a byte vector as a base64 string.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Deserializes a base64 string into a byte vector.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional byte fields carried as base64 strings.
pub mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes an optional byte vector as a base64 string or null.
    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes a base64 string or null into an optional byte vector.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
