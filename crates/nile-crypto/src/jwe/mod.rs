//! Compact JWE with ECDH-ES+A256KW key agreement.
//!
//! Token layout:
//!
//! ```text
//! BASE64URL(header) . BASE64URL(wrapped CEK) . BASE64URL(IV) . BASE64URL(ciphertext) . BASE64URL(tag)
//! ```
//!
//! The header carries the sender's ephemeral public key (`epk`). The ASCII
//! bytes of the encoded header are the additional authenticated data, so any
//! header edit breaks the tag.

mod content;
mod kdf;

pub use content::ContentEncryption;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    encoding::{b64, decode_json, decode_segment, encode_json, split_compact},
    error::CryptoError,
    handle::KeyHandle,
    jwk::KeyDescription,
};

/// Key management algorithm written into every header.
pub const KEY_AGREEMENT_ALGORITHM: &str = "ECDH-ES+A256KW";

/// Protected header of a compact JWE.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
    /// Key management algorithm
    pub alg: String,
    /// Content encryption algorithm
    pub enc: ContentEncryption,
    /// Sender's ephemeral public key
    pub epk: KeyDescription,
}

/// Successfully decrypted token.
#[derive(Debug)]
pub struct Decrypted {
    /// Protected header
    pub header: JweHeader,
    /// Recovered plaintext
    pub plaintext: Vec<u8>,
}

/// Encrypt `plaintext` to `recipient`'s public key.
///
/// `fill` supplies randomness for the ephemeral key, content key and IV.
///
/// # Errors
///
/// - `KeyGeneration` if `fill` never yields a valid ephemeral scalar
/// - `EncryptionFailed` if a primitive rejects its input
pub fn encrypt(
    plaintext: &[u8],
    recipient: &KeyHandle,
    enc: ContentEncryption,
    mut fill: impl FnMut(&mut [u8]),
) -> Result<String, CryptoError> {
    let (shared, epk) = recipient.agree_ephemeral(&mut fill)?;
    let kek = kdf::derive_wrapping_key(&shared, KEY_AGREEMENT_ALGORITHM);

    let mut cek = Zeroizing::new(vec![0u8; enc.key_len()]);
    fill(cek.as_mut_slice());
    let mut iv = vec![0u8; enc.iv_len()];
    fill(iv.as_mut_slice());

    let header = JweHeader { alg: KEY_AGREEMENT_ALGORITHM.to_string(), enc, epk };
    let encoded_header = encode_json(&header)?;

    let wrapped = kdf::wrap_key(&kek, &cek)?;
    let (ciphertext, tag) = enc.seal(&cek, &iv, encoded_header.as_bytes(), plaintext)?;

    Ok(format!(
        "{encoded_header}.{}.{}.{}.{}",
        b64(&wrapped),
        b64(&iv),
        b64(&ciphertext),
        b64(&tag)
    ))
}

/// Decrypt a compact JWE with the recipient's private key.
///
/// # Errors
///
/// - `MalformedToken` if the token is not five base64url segments with a
///   valid header
/// - `UnsupportedAlgorithm` if `alg` is not ECDH-ES+A256KW
/// - `InvalidKey` if the ephemeral key is not a valid point
/// - `MissingPrivateKey` if `key` is public-only
/// - `DecryptionFailed` if key unwrap or authentication fails
pub fn decrypt(token: &str, key: &KeyHandle) -> Result<Decrypted, CryptoError> {
    let [header_b64, wrapped_b64, iv_b64, ciphertext_b64, tag_b64] = split_compact::<5>(token)?;

    let header: JweHeader = decode_json(header_b64)?;
    if header.alg != KEY_AGREEMENT_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(header.alg));
    }

    let wrapped = decode_segment(wrapped_b64)?;
    let iv = decode_segment(iv_b64)?;
    let ciphertext = decode_segment(ciphertext_b64)?;
    let tag = decode_segment(tag_b64)?;

    let ephemeral = KeyHandle::parse(&header.epk)?;
    let shared = key.agree_static(&ephemeral)?;
    let kek = kdf::derive_wrapping_key(&shared, KEY_AGREEMENT_ALGORITHM);

    let cek = kdf::unwrap_key(&kek, &wrapped)?;
    if cek.len() != header.enc.key_len() {
        return Err(CryptoError::decryption("content key length does not match enc"));
    }

    let plaintext = header.enc.open(&cek, &iv, header_b64.as_bytes(), &ciphertext, &tag)?;
    Ok(Decrypted { header, plaintext })
}
