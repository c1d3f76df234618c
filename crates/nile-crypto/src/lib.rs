//! Nile JOSE Primitives
//!
//! Building blocks for the Nile envelope protocol: EC key descriptions in JWK
//! form, compact JWS signatures and compact JWE encryption. Pure functions;
//! callers provide random bytes so tests can run deterministically.
//!
//! # Envelope
//!
//! Nile messages are encrypted to the recipient first and the ciphertext is
//! then signed by the sender:
//!
//! ```text
//! payload
//!    │
//!    ▼
//! JWE (ECDH-ES+A256KW, recipient's public key)
//!    │
//!    ▼
//! JWS (ES256 / ES384 / ES512, sender's private key)
//! ```
//!
//! # Keys
//!
//! - Only EC keys on P-256, P-384 and P-521 are accepted; the curve fixes the
//!   signature algorithm
//! - [`KeyHandle::parse`] validates that the point is on the curve and that a
//!   private scalar matches its public point
//! - Thumbprints follow RFC 7638 (SHA-256, base64url, no padding)
//!
//! # Security
//!
//! - JWS verification refuses a header `alg` that differs from the key's
//! - JWE authenticates the encoded protected header as AAD
//! - CBC-HMAC checks the tag before removing padding
//! - Private scalars and content keys are zeroized on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod encoding;
mod error;
mod handle;
pub mod jwe;
mod jwk;
pub mod jws;

pub use error::CryptoError;
pub use handle::KeyHandle;
pub use jwe::ContentEncryption;
pub use jwk::{Curve, KEY_TYPE_EC, KeyDescription, KeyPair, SignatureAlgorithm};
