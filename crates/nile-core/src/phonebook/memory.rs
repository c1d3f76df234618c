//! In-memory phonebook.
//!
//! Reference backend: entries live in a `HashMap` behind an `RwLock`. No
//! eviction, no persistence. Re-registering an id replaces its entry without
//! any continuity check against the previous key.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]
#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use super::{Phonebook, PhonebookEntry};
use crate::{decoder::Decoder, env::Environment, error::PhonebookError};

/// In-memory identity directory.
///
/// Thread-safe via `Arc<RwLock<_>>`. Clone shares the same underlying map.
/// The lock is never held across an `.await`: announcements are validated
/// first and the insert happens in one write-locked step.
pub struct InMemoryPhonebook<E: Environment> {
    decoder: Arc<Decoder<E>>,
    entries: Arc<RwLock<HashMap<String, PhonebookEntry>>>,
}

impl<E: Environment> Clone for InMemoryPhonebook<E> {
    fn clone(&self) -> Self {
        Self { decoder: Arc::clone(&self.decoder), entries: Arc::clone(&self.entries) }
    }
}

impl<E: Environment> InMemoryPhonebook<E> {
    /// Create an empty phonebook that validates announcements with `decoder`.
    pub fn new(decoder: Arc<Decoder<E>>) -> Self {
        Self { decoder, entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Number of registered identities.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn len(&self) -> usize {
        self.entries.read().expect("InMemoryPhonebook lock poisoned").len()
    }

    /// Whether no identity is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().expect("InMemoryPhonebook lock poisoned").contains_key(id)
    }
}

#[async_trait]
impl<E: Environment> Phonebook for InMemoryPhonebook<E> {
    async fn register(&self, id: &str, announcement: &str) -> Result<bool, PhonebookError> {
        if id.is_empty() || announcement.is_empty() {
            return Err(PhonebookError::InvalidRequest {
                reason: "id and announcement are required".to_string(),
            });
        }

        let verified = match self.decoder.validate_key_announcement(announcement).await {
            Ok(verified) => verified,
            Err(err) => {
                tracing::warn!(%id, %err, "rejected key announcement");
                return Ok(false);
            },
        };

        let entry = verified.bind(id);
        tracing::info!(%id, thumbprint = %entry.thumbprint, "registered key");

        let previous = self
            .entries
            .write()
            .expect("InMemoryPhonebook lock poisoned")
            .insert(id.to_string(), entry);
        if previous.is_some() {
            tracing::debug!(%id, "replaced existing entry");
        }

        Ok(true)
    }

    async fn get(&self, id: &str) -> Result<Option<PhonebookEntry>, PhonebookError> {
        Ok(self.entries.read().expect("InMemoryPhonebook lock poisoned").get(id).cloned())
    }
}
