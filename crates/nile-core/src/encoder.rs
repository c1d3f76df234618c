//! Outgoing pipeline: encrypt to the recipient, then sign as the sender.

use std::{sync::Arc, time::Duration};

use nile_crypto::{ContentEncryption, KeyDescription, KeyHandle, jwe, jws};

use crate::{
    announcement::KeyAnnouncement,
    env::Environment,
    error::NileError,
    key_manager::{KeyManager, KeyRole},
};

/// Default lifetime of a key announcement.
pub const DEFAULT_ANNOUNCEMENT_TTL: Duration = Duration::from_secs(120);

/// Produces envelopes and key announcements for the own identity.
pub struct Encoder<E: Environment> {
    keys: Arc<KeyManager>,
    env: E,
    content_encryption: ContentEncryption,
    announcement_ttl: Duration,
}

impl<E: Environment> Encoder<E> {
    /// Create an encoder with `A256CBC-HS512` and a two minute announcement
    /// lifetime.
    pub fn new(keys: Arc<KeyManager>, env: E) -> Self {
        Self {
            keys,
            env,
            content_encryption: ContentEncryption::default(),
            announcement_ttl: DEFAULT_ANNOUNCEMENT_TTL,
        }
    }

    /// Use `enc` for content encryption.
    #[must_use]
    pub fn with_content_encryption(mut self, enc: ContentEncryption) -> Self {
        self.content_encryption = enc;
        self
    }

    /// Use `ttl` as the announcement lifetime.
    #[must_use]
    pub fn with_announcement_ttl(mut self, ttl: Duration) -> Self {
        self.announcement_ttl = ttl;
        self
    }

    /// Configured content encryption.
    pub fn content_encryption(&self) -> ContentEncryption {
        self.content_encryption
    }

    /// Encrypt `plaintext` to `recipient_key` as a compact JWE.
    ///
    /// # Errors
    ///
    /// - `RecipientKey` if the recipient key is malformed or unsupported
    /// - `EncryptionFailed` if the primitive fails
    pub async fn encrypt(
        &self,
        plaintext: &[u8],
        recipient_key: &KeyDescription,
    ) -> Result<String, NileError> {
        let recipient = KeyHandle::parse(recipient_key)
            .map_err(|e| NileError::RecipientKey { reason: e.to_string() })?;

        let token = jwe::encrypt(plaintext, &recipient, self.content_encryption, |buf| {
            self.env.random_bytes(buf);
        })
        .map_err(|e| NileError::EncryptionFailed { reason: e.to_string() })?;

        tracing::debug!(enc = %self.content_encryption, len = plaintext.len(), "encrypted payload");
        Ok(token)
    }

    /// Sign `payload` with the own private key as a compact JWS.
    ///
    /// # Errors
    ///
    /// - `Signing` if the private key cannot be parsed or cannot sign
    pub async fn sign(&self, payload: &[u8]) -> Result<String, NileError> {
        let key = self
            .keys
            .key_handle(KeyRole::Private)
            .await
            .map_err(|e| NileError::Signing { reason: e.to_string() })?;

        jws::sign(payload, key).map_err(|e| NileError::Signing { reason: e.to_string() })
    }

    /// Encrypt `plaintext` to the recipient, then sign the JWE.
    pub async fn encode(
        &self,
        plaintext: &[u8],
        recipient_key: &KeyDescription,
    ) -> Result<String, NileError> {
        let encrypted = self.encrypt(plaintext, recipient_key).await?;
        self.sign(encrypted.as_bytes()).await
    }

    /// Signed announcement of the own public key, valid for the configured
    /// lifetime from now.
    pub async fn make_key_announcement(&self) -> Result<String, NileError> {
        let info = self.keys.key_info(KeyRole::Public).await?;
        let ttl_millis = u64::try_from(self.announcement_ttl.as_millis()).unwrap_or(u64::MAX);

        let announcement = KeyAnnouncement {
            key: info.description.to_public(),
            thumbprint: info.thumbprint.to_string(),
            exp: self.env.wall_clock_millis().saturating_add(ttl_millis),
        };
        let payload =
            serde_json::to_vec(&announcement).map_err(|e| NileError::serialization(&e))?;

        tracing::debug!(thumbprint = %announcement.thumbprint, exp = announcement.exp, "key announcement");
        self.sign(&payload).await
    }
}
