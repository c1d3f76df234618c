//! Identity directory abstraction.
//!
//! A phonebook maps identifiers to public keys. Keys enter it only through a
//! signed key announcement, so a backend can accept a peer it has never seen
//! (trust on first use) without trusting the transport that delivered the
//! announcement.

mod memory;

use async_trait::async_trait;
pub use memory::InMemoryPhonebook;
use nile_crypto::KeyDescription;
use serde::{Deserialize, Serialize};

use crate::error::PhonebookError;

/// Directory record for one identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonebookEntry {
    /// Directory identifier
    pub id: String,
    /// Public key (never carries `d`)
    pub key: KeyDescription,
    /// RFC 7638 thumbprint of `key`
    pub thumbprint: String,
}

/// Identity directory backend.
///
/// Object-safe so a facade can hold an `Arc<dyn Phonebook>`.
///
/// # Invariants
///
/// - `register` returns `Ok(true)` only after the announcement validated and
///   the entry is visible to `get`
/// - Validation failures are `Ok(false)`, never `Err`
/// - `get` reports absence as `Ok(None)`
#[async_trait]
pub trait Phonebook: Send + Sync {
    /// Validate `announcement` and store the announced key under `id`.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `id` or `announcement` is empty
    /// - `Unavailable` if the backend cannot be reached
    async fn register(&self, id: &str, announcement: &str) -> Result<bool, PhonebookError>;

    /// Look up the entry for `id`.
    async fn get(&self, id: &str) -> Result<Option<PhonebookEntry>, PhonebookError>;
}
