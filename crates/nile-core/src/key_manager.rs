//! Own key material with compute-once caches.
//!
//! The `KeyManager` holds the public and private key descriptions of one
//! identity. Parsing a description into a [`KeyHandle`] and computing its
//! RFC 7638 thumbprint each happen at most once per role; concurrent first
//! callers wait on the same computation.

use nile_crypto::{KeyDescription, KeyHandle, KeyPair};
use tokio::sync::OnceCell;

use crate::error::NileError;

/// Which half of the own key pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Public key: announced to the phonebook
    Public,
    /// Private key: signs outgoing and decrypts incoming envelopes
    Private,
}

/// Everything derived from one key description.
#[derive(Clone, Copy, Debug)]
pub struct KeyInfo<'a> {
    /// Description as configured
    pub description: &'a KeyDescription,
    /// Parsed key
    pub handle: &'a KeyHandle,
    /// RFC 7638 thumbprint
    pub thumbprint: &'a str,
}

/// Both halves of the own key pair.
#[derive(Clone, Copy, Debug)]
pub struct KeyPairInfo<'a> {
    /// Public half
    pub public: KeyInfo<'a>,
    /// Private half
    pub private: KeyInfo<'a>,
}

struct RoleSlot {
    description: KeyDescription,
    handle: OnceCell<KeyHandle>,
    thumbprint: OnceCell<String>,
}

impl RoleSlot {
    fn new(description: KeyDescription) -> Self {
        Self { description, handle: OnceCell::new(), thumbprint: OnceCell::new() }
    }
}

/// Caches parsed handles and thumbprints for the own key pair.
///
/// No network or directory access. Caches live as long as the instance.
pub struct KeyManager {
    public: RoleSlot,
    private: RoleSlot,
}

impl KeyManager {
    /// Create a key manager from a public and a private key description.
    ///
    /// Nothing is parsed until first use.
    pub fn new(public_key: KeyDescription, private_key: KeyDescription) -> Self {
        Self { public: RoleSlot::new(public_key), private: RoleSlot::new(private_key) }
    }

    /// Create a key manager from a generated or loaded key pair.
    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self::new(key_pair.public_key, key_pair.private_key)
    }

    /// Key description for `role`, as configured.
    pub fn description(&self, role: KeyRole) -> &KeyDescription {
        &self.slot(role).description
    }

    /// Parsed key handle for `role`, computed on first call.
    ///
    /// # Errors
    ///
    /// - `KeyParse` if the description is malformed, unsupported, or (for the
    ///   private role) carries no private scalar
    pub async fn key_handle(&self, role: KeyRole) -> Result<&KeyHandle, NileError> {
        let slot = self.slot(role);
        slot.handle
            .get_or_try_init(|| async move {
                let handle = KeyHandle::parse(&slot.description)
                    .map_err(|e| NileError::KeyParse { reason: e.to_string() })?;
                if role == KeyRole::Private && !handle.has_private() {
                    return Err(NileError::KeyParse {
                        reason: "private key description has no private scalar".to_string(),
                    });
                }
                tracing::debug!(?role, alg = %handle.algorithm(), "parsed key handle");
                Ok(handle)
            })
            .await
    }

    /// RFC 7638 thumbprint for `role`, computed on first call.
    ///
    /// The thumbprint of the private key equals that of its public half.
    pub async fn thumbprint(&self, role: KeyRole) -> Result<&str, NileError> {
        let slot = self.slot(role);
        let thumbprint = slot
            .thumbprint
            .get_or_try_init(|| async move {
                slot.description
                    .thumbprint()
                    .map_err(|e| NileError::KeyParse { reason: e.to_string() })
            })
            .await?;
        Ok(thumbprint.as_str())
    }

    /// Description, handle and thumbprint for `role`.
    ///
    /// Handle parsing and thumbprint computation run concurrently.
    pub async fn key_info(&self, role: KeyRole) -> Result<KeyInfo<'_>, NileError> {
        let (handle, thumbprint) = tokio::try_join!(self.key_handle(role), self.thumbprint(role))?;
        Ok(KeyInfo { description: self.description(role), handle, thumbprint })
    }

    /// [`KeyInfo`] for both roles.
    pub async fn key_pair_info(&self) -> Result<KeyPairInfo<'_>, NileError> {
        let (public, private) =
            tokio::try_join!(self.key_info(KeyRole::Public), self.key_info(KeyRole::Private))?;
        Ok(KeyPairInfo { public, private })
    }

    fn slot(&self, role: KeyRole) -> &RoleSlot {
        match role {
            KeyRole::Public => &self.public,
            KeyRole::Private => &self.private,
        }
    }
}
