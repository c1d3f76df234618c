//! Nile protocol core.
//!
//! Authenticated, confidential messages between two parties that share
//! nothing but each other's identifiers. Each message is encrypted to the
//! recipient's public key and the ciphertext is signed with the sender's
//! private key. Public keys are resolved through a [`Phonebook`], which learns
//! them from self-signed key announcements.
//!
//! # Components
//!
//! - [`KeyManager`]: own key pair with compute-once handles and thumbprints
//! - [`Encoder`]: encrypt-then-sign, key announcements
//! - [`Decoder`]: verify-then-decrypt, announcement validation
//! - [`Phonebook`] / [`InMemoryPhonebook`]: identity directory
//! - [`Nile`]: facade with lazy one-time registration
//!
//! # Example
//!
//! ```no_run
//! use nile_core::{Nile, NileConfig, RequestMessage, SystemEnv};
//!
//! # async fn run() -> Result<(), nile_core::NileError> {
//! let config = NileConfig::from_key_file("T", "keypair.json")?;
//! let nile = Nile::new(config, SystemEnv::new());
//!
//! let envelope = nile.prepare_message(&RequestMessage::new("GET", "/hello"), "T").await?;
//! let request: RequestMessage = nile.handle_message(&envelope, "T").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod announcement;
mod config;
mod decoder;
mod encoder;
pub mod env;
mod error;
mod key_manager;
mod message;
mod nile;
pub mod phonebook;
mod system_env;

pub use announcement::{KeyAnnouncement, VerifiedKey};
pub use config::NileConfig;
pub use decoder::Decoder;
pub use encoder::{DEFAULT_ANNOUNCEMENT_TTL, Encoder};
pub use env::Environment;
pub use error::{NileError, PhonebookError};
pub use key_manager::{KeyInfo, KeyManager, KeyPairInfo, KeyRole};
pub use message::{FieldMap, FieldValue, RequestMessage};
pub use nile::Nile;
pub use nile_crypto::{
    ContentEncryption, KeyDescription, KeyPair, SignatureAlgorithm,
    jwe::Decrypted,
    jws::Verified,
};
pub use phonebook::{InMemoryPhonebook, Phonebook, PhonebookEntry};
pub use system_env::SystemEnv;
