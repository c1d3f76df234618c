//! Incoming pipeline: verify the sender, then decrypt with the own key.
//!
//! Also validates key announcements for phonebook registration.

use std::sync::Arc;

use nile_crypto::{
    KeyDescription, KeyHandle,
    jwe::{self, Decrypted},
    jws::{self, Verified},
};

use crate::{
    announcement::{KeyAnnouncement, UnverifiedAnnouncement, VerifiedKey},
    env::Environment,
    error::NileError,
    key_manager::{KeyManager, KeyRole},
};

/// Verifies and decrypts envelopes addressed to the own identity.
pub struct Decoder<E: Environment> {
    keys: Arc<KeyManager>,
    env: E,
}

impl<E: Environment> Decoder<E> {
    /// Create a decoder over the own key material.
    pub fn new(keys: Arc<KeyManager>, env: E) -> Self {
        Self { keys, env }
    }

    /// Verify a compact JWS against the claimed signer's key.
    ///
    /// # Errors
    ///
    /// - `KeyParse` if `claimed_key` is malformed or unsupported
    /// - `SignatureInvalid` on any structural or signature mismatch, including
    ///   a header `alg` that differs from the key's
    pub async fn verify(
        &self,
        token: &str,
        claimed_key: &KeyDescription,
    ) -> Result<Verified, NileError> {
        let key = KeyHandle::parse(claimed_key)
            .map_err(|e| NileError::KeyParse { reason: e.to_string() })?;

        jws::verify(token, &key).map_err(|e| NileError::SignatureInvalid { reason: e.to_string() })
    }

    /// Decrypt a compact JWE with the own private key.
    ///
    /// # Errors
    ///
    /// - `KeyParse` if the own private key is unusable
    /// - `DecryptionFailed` on tag mismatch, wrong recipient or corruption
    pub async fn decrypt(&self, token: &str) -> Result<Decrypted, NileError> {
        let key = self.keys.key_handle(KeyRole::Private).await?;

        jwe::decrypt(token, key).map_err(|e| NileError::DecryptionFailed { reason: e.to_string() })
    }

    /// Verify the envelope against `claimed_key`, then decrypt its payload.
    pub async fn decode(
        &self,
        envelope: &str,
        claimed_key: &KeyDescription,
    ) -> Result<Vec<u8>, NileError> {
        let verified = self.verify(envelope, claimed_key).await?;
        let inner = std::str::from_utf8(&verified.payload).map_err(|_| {
            NileError::DecryptionFailed { reason: "signed payload is not a compact JWE".into() }
        })?;

        let decrypted = self.decrypt(inner).await?;
        tracing::debug!(len = decrypted.plaintext.len(), enc = %decrypted.header.enc, "decoded envelope");
        Ok(decrypted.plaintext)
    }

    /// Validate a signed key announcement.
    ///
    /// The key inside the announcement is trusted only after it verifies its
    /// own signature, the expiry has not passed, and the declared thumbprint
    /// matches the key.
    ///
    /// # Errors
    ///
    /// - `MalformedAnnouncement` if the token or its payload is not a complete
    ///   announcement, including an `exp` of zero
    /// - `KeyParse` / `SignatureInvalid` from signature verification
    /// - `ExpiredAnnouncement` if `exp` is in the past or was altered
    /// - `ThumbprintMismatch` if the thumbprint does not match the key
    pub async fn validate_key_announcement(
        &self,
        announcement: &str,
    ) -> Result<VerifiedKey, NileError> {
        let malformed = |reason: String| NileError::MalformedAnnouncement { reason };

        let unverified_payload =
            jws::unverified_payload(announcement).map_err(|e| malformed(e.to_string()))?;
        let claimed: UnverifiedAnnouncement = serde_json::from_slice(&unverified_payload)
            .map_err(|e| malformed(format!("payload: {e}")))?;
        let (Some(claimed_key), Some(claimed_exp)) = (claimed.key, claimed.exp) else {
            return Err(malformed("missing key or exp".to_string()));
        };
        if claimed_exp == 0 {
            return Err(malformed("exp must be non-zero".to_string()));
        }

        let verified = self.verify(announcement, &claimed_key).await?;
        let announced: KeyAnnouncement = serde_json::from_slice(&verified.payload)
            .map_err(|e| malformed(format!("verified payload: {e}")))?;

        let now = self.env.wall_clock_millis();
        if announced.exp != claimed_exp {
            return Err(NileError::ExpiredAnnouncement {
                reason: "expiry differs from the claimed expiry".to_string(),
            });
        }
        if announced.exp < now {
            return Err(NileError::ExpiredAnnouncement {
                reason: format!("expired at {} (now {now})", announced.exp),
            });
        }

        if claimed.thumbprint.as_deref() != Some(announced.thumbprint.as_str()) {
            return Err(NileError::ThumbprintMismatch {
                reason: "declared thumbprint differs from the claimed thumbprint".to_string(),
            });
        }
        let computed = announced
            .key
            .thumbprint()
            .map_err(|e| NileError::KeyParse { reason: e.to_string() })?;
        if computed != announced.thumbprint {
            return Err(NileError::ThumbprintMismatch {
                reason: format!("declared {}, computed {computed}", announced.thumbprint),
            });
        }

        Ok(VerifiedKey { key: announced.key.to_public(), thumbprint: computed })
    }
}
