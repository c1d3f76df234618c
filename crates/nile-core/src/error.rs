//! Error types for the Nile protocol.
//!
//! `NileError` is the taxonomy surfaced by the facade and the pipeline
//! components. Primitive failures from `nile_crypto` are mapped into the
//! variant owned by the step that hit them. There is no blanket
//! `From<CryptoError>`.
//!
//! `PhonebookError` covers directory backend problems only. Announcement
//! validation failures never reach callers of `Phonebook::register` as
//! errors.

use thiserror::Error;

/// Errors produced by the Nile pipeline and facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NileError {
    /// Own or claimed key description could not be parsed
    #[error("key parse failed: {reason}")]
    KeyParse {
        /// Why the key was rejected
        reason: String,
    },

    /// Recipient's key is malformed or unsupported
    #[error("invalid recipient key: {reason}")]
    RecipientKey {
        /// Why the key was rejected
        reason: String,
    },

    /// Content encryption failed after the recipient key was accepted
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Primitive error description
        reason: String,
    },

    /// Own private key cannot sign
    #[error("signing failed: {reason}")]
    Signing {
        /// Primitive error description
        reason: String,
    },

    /// Signature or envelope structure does not verify
    #[error("signature verification failed: {reason}")]
    SignatureInvalid {
        /// Which check failed
        reason: String,
    },

    /// Envelope could not be decrypted with the own private key
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Which check failed
        reason: String,
    },

    /// Key announcement is not a well-formed signed announcement
    #[error("malformed key announcement: {reason}")]
    MalformedAnnouncement {
        /// Which part failed to parse
        reason: String,
    },

    /// Key announcement expired or its expiry was altered
    #[error("expired key announcement: {reason}")]
    ExpiredAnnouncement {
        /// Expiry detail
        reason: String,
    },

    /// Declared thumbprint does not match the announced key
    #[error("thumbprint mismatch: {reason}")]
    ThumbprintMismatch {
        /// Which comparison failed
        reason: String,
    },

    /// No phonebook entry for the recipient
    #[error("unknown recipient: {id}")]
    UnknownRecipient {
        /// Recipient identifier
        id: String,
    },

    /// No phonebook entry for the sender
    #[error("unknown sender: {id}")]
    UnknownSender {
        /// Sender identifier
        id: String,
    },

    /// Own key announcement was not accepted by the phonebook
    #[error("bootstrap failed: {reason}")]
    BootstrapFailed {
        /// Registration outcome
        reason: String,
    },

    /// Message could not be converted to or from JSON
    #[error("serialization error: {reason}")]
    Serialization {
        /// serde_json error description
        reason: String,
    },

    /// Phonebook backend failed during a lookup
    #[error("phonebook error: {0}")]
    Phonebook(#[from] PhonebookError),

    /// Configuration could not be loaded
    #[error("configuration error: {reason}")]
    Config {
        /// What went wrong
        reason: String,
    },
}

impl NileError {
    /// Returns true if repeating the same call may succeed.
    ///
    /// A failed bootstrap leaves the facade unready and is retried on the next
    /// call; an unavailable backend may recover. Everything else is a property
    /// of the inputs and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BootstrapFailed { .. } => true,
            Self::Phonebook(err) => err.is_transient(),
            _ => false,
        }
    }

    pub(crate) fn serialization(err: &serde_json::Error) -> Self {
        Self::Serialization { reason: err.to_string() }
    }
}

/// Errors from a phonebook backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhonebookError {
    /// Request is missing a required field
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// Which field was missing
        reason: String,
    },

    /// Backend cannot be reached or failed internally
    #[error("phonebook unavailable: {reason}")]
    Unavailable {
        /// Backend error description
        reason: String,
    },
}

impl PhonebookError {
    /// Returns true if the backend may recover.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(NileError::BootstrapFailed { reason: "rejected".into() }.is_retryable());
        assert!(
            NileError::Phonebook(PhonebookError::Unavailable { reason: "down".into() })
                .is_retryable()
        );
        assert!(
            !NileError::Phonebook(PhonebookError::InvalidRequest { reason: "empty id".into() })
                .is_retryable()
        );
        assert!(!NileError::UnknownRecipient { id: "bob".into() }.is_retryable());
        assert!(!NileError::SignatureInvalid { reason: "bad".into() }.is_retryable());
    }

    #[test]
    fn phonebook_errors_convert() {
        let err: NileError = PhonebookError::Unavailable { reason: "timeout".into() }.into();
        assert_eq!(err.to_string(), "phonebook error: phonebook unavailable: timeout");
    }
}
