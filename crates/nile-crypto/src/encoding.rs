//! Base64url and compact-serialization helpers shared by JWS and JWE.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::CryptoError;

/// Base64url without padding.
pub(crate) fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode one base64url segment. Non-canonical trailing bits are rejected.
pub(crate) fn decode_segment(segment: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CryptoError::malformed(format!("invalid base64url segment: {e}")))
}

pub(crate) fn encode_json<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| CryptoError::malformed(format!("header serialization: {e}")))?;
    Ok(b64(&json))
}

pub(crate) fn decode_json<T: DeserializeOwned>(segment: &str) -> Result<T, CryptoError> {
    let bytes = decode_segment(segment)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| CryptoError::malformed(format!("invalid JSON segment: {e}")))
}

/// Split a compact token into exactly `N` dot-separated segments.
pub(crate) fn split_compact<const N: usize>(token: &str) -> Result<[&str; N], CryptoError> {
    let mut parts = [""; N];
    let mut segments = token.split('.');
    for part in &mut parts {
        *part = segments
            .next()
            .ok_or_else(|| CryptoError::malformed(format!("expected {N} segments")))?;
    }
    if segments.next().is_some() {
        return Err(CryptoError::malformed(format!("expected {N} segments")));
    }
    Ok(parts)
}
