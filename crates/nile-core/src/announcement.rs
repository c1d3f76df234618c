//! Self-certifying key announcements.
//!
//! An announcement is the JSON payload `{"key", "thumbprint", "exp"}`, signed
//! as a compact JWS with the private half of `key`. A phonebook accepts it on
//! first sight (trust on first use) once the signature, expiry and thumbprint
//! all check out.

use nile_crypto::KeyDescription;
use serde::{Deserialize, Serialize};

use crate::phonebook::PhonebookEntry;

/// Signed payload of a key announcement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAnnouncement {
    /// Announced public key
    pub key: KeyDescription,
    /// RFC 7638 thumbprint of `key`
    pub thumbprint: String,
    /// Expiry, milliseconds since the Unix epoch
    pub exp: u64,
}

/// Announcement fields as read before the signature is checked.
///
/// Every field is optional so a missing member can be reported as a
/// malformed announcement rather than a generic parse error.
#[derive(Debug, Deserialize)]
pub(crate) struct UnverifiedAnnouncement {
    pub(crate) key: Option<KeyDescription>,
    pub(crate) thumbprint: Option<String>,
    pub(crate) exp: Option<u64>,
}

/// Public key proven by a valid announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedKey {
    /// Public key (never carries `d`)
    pub key: KeyDescription,
    /// RFC 7638 thumbprint of `key`
    pub thumbprint: String,
}

impl VerifiedKey {
    /// Bind the key to a directory identifier.
    pub fn bind(self, id: impl Into<String>) -> PhonebookEntry {
        PhonebookEntry { id: id.into(), key: self.key, thumbprint: self.thumbprint }
    }
}
