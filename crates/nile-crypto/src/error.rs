//! Error types for JOSE operations.

use thiserror::Error;

/// Errors produced by the JOSE building blocks.
///
/// Variants carry a human-readable `reason` for logs. Callers in the protocol
/// layer map these onto their own taxonomy; nothing here is shown to a remote
/// peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key description is malformed (bad encoding, point not on curve, etc.)
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What was wrong with the key
        reason: String,
    },

    /// Algorithm, curve or key type is not one we implement
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Operation needs a private key but the handle only holds a public key
    #[error("private key required")]
    MissingPrivateKey,

    /// Compact token does not have the expected shape
    #[error("malformed token: {reason}")]
    MalformedToken {
        /// Which part of the token failed to parse
        reason: String,
    },

    /// Signature does not verify under the given key
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Signing primitive rejected the key or message
    #[error("signing failed: {reason}")]
    SigningFailed {
        /// Primitive error description
        reason: String,
    },

    /// Encryption primitive failed
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Primitive error description
        reason: String,
    },

    /// Authentication tag, key unwrap or padding check failed
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Which check failed
        reason: String,
    },

    /// Random source repeatedly produced unusable scalars
    #[error("key generation failed: {reason}")]
    KeyGeneration {
        /// Why no key could be produced
        reason: String,
    },
}

impl CryptoError {
    pub(crate) fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey { reason: reason.into() }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedToken { reason: reason.into() }
    }

    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed { reason: reason.into() }
    }
}
