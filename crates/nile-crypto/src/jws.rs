//! Compact JWS with ES256, ES384 and ES512.
//!
//! `BASE64URL(header) . BASE64URL(payload) . BASE64URL(r || s)`
//!
//! The protected header carries only `alg` (`ES256`, `ES384` or `ES512`),
//! taken from the signing key. Verification refuses a header algorithm that differs from
//! the verifying key's algorithm.

use serde::{Deserialize, Serialize};

use crate::{
    encoding::{b64, decode_json, decode_segment, encode_json, split_compact},
    error::CryptoError,
    handle::KeyHandle,
};

/// Protected header of a compact JWS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    /// Signature algorithm identifier
    pub alg: String,
}

/// Successfully verified token.
#[derive(Debug)]
pub struct Verified {
    /// Protected header
    pub header: JwsHeader,
    /// Signed payload
    pub payload: Vec<u8>,
}

/// Sign `payload` with a private key handle.
///
/// # Errors
///
/// - `MissingPrivateKey` if `key` is public-only
/// - `SigningFailed` if the ECDSA primitive fails
pub fn sign(payload: &[u8], key: &KeyHandle) -> Result<String, CryptoError> {
    let header = JwsHeader { alg: key.algorithm().as_str().to_string() };
    let signing_input = format!("{}.{}", encode_json(&header)?, b64(payload));
    let signature = key.sign(signing_input.as_bytes())?;

    Ok(format!("{signing_input}.{}", b64(&signature)))
}

/// Verify a compact JWS and return its payload.
///
/// # Errors
///
/// - `MalformedToken` if the token is not three base64url segments with a
///   JSON header
/// - `UnsupportedAlgorithm` if the header names an algorithm other than the
///   key's
/// - `SignatureInvalid` if the signature does not verify
pub fn verify(token: &str, key: &KeyHandle) -> Result<Verified, CryptoError> {
    let [header_b64, payload_b64, signature_b64] = split_compact::<3>(token)?;

    let header: JwsHeader = decode_json(header_b64)?;
    if header.alg != key.algorithm().as_str() {
        return Err(CryptoError::UnsupportedAlgorithm(header.alg));
    }

    let payload = decode_segment(payload_b64)?;
    let signature = decode_segment(signature_b64)?;

    // Signing input is the encoded segments as received, not a re-encoding
    let signing_input_len = header_b64.len() + 1 + payload_b64.len();
    key.verify(token[..signing_input_len].as_bytes(), &signature)?;

    Ok(Verified { header, payload })
}

/// Extract the payload of a compact JWS without verifying it.
///
/// Checks only the structure: three base64url segments, with a non-empty
/// header and signature. The result is untrusted until [`verify`] succeeds.
pub fn unverified_payload(token: &str) -> Result<Vec<u8>, CryptoError> {
    let [header_b64, payload_b64, signature_b64] = split_compact::<3>(token)?;
    if header_b64.is_empty() || signature_b64.is_empty() {
        return Err(CryptoError::malformed("empty header or signature segment"));
    }
    decode_segment(header_b64)?;
    decode_segment(signature_b64)?;
    decode_segment(payload_b64)
}
