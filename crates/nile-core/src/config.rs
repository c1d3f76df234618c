//! Facade configuration.

use std::{path::Path, time::Duration};

use nile_crypto::{ContentEncryption, KeyPair};

use crate::{encoder::DEFAULT_ANNOUNCEMENT_TTL, error::NileError};

/// Configuration for a [`Nile`](crate::Nile) instance.
#[derive(Clone, Debug)]
pub struct NileConfig {
    /// Directory identifier of this party
    pub id: String,
    /// Own key pair
    pub key_pair: KeyPair,
    /// Content encryption for outgoing envelopes
    pub content_encryption: ContentEncryption,
    /// Lifetime of the own key announcement
    pub announcement_ttl: Duration,
}

impl NileConfig {
    /// Configuration with default content encryption (`A256CBC-HS512`) and a
    /// two minute announcement lifetime.
    pub fn new(id: impl Into<String>, key_pair: KeyPair) -> Self {
        Self {
            id: id.into(),
            key_pair,
            content_encryption: ContentEncryption::default(),
            announcement_ttl: DEFAULT_ANNOUNCEMENT_TTL,
        }
    }

    /// Load the key pair from a file written by `nile-keygen`.
    ///
    /// # Errors
    ///
    /// - `Config` if the file cannot be read or is not a key-pair document
    pub fn from_key_file(id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, NileError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| NileError::Config {
            reason: format!("reading {}: {e}", path.display()),
        })?;
        let key_pair = KeyPair::from_json(&json).map_err(|e| NileError::Config {
            reason: format!("parsing {}: {e}", path.display()),
        })?;

        Ok(Self::new(id, key_pair))
    }

    /// Use `enc` for outgoing envelopes.
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
}
