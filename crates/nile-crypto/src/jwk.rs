//! Key descriptions in JWK form and RFC 7638 thumbprints.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{encoding::b64, error::CryptoError, handle::KeyHandle};

/// JWK key type for elliptic-curve keys.
pub const KEY_TYPE_EC: &str = "EC";

/// Signature algorithm a key is used with.
///
/// The curve determines the algorithm: P-256 signs with ES256, P-384 with
/// ES384, P-521 with ES512.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// ECDSA over P-256 with SHA-256
    #[serde(rename = "ES256")]
    Es256,
    /// ECDSA over P-384 with SHA-384
    #[serde(rename = "ES384")]
    Es384,
    /// ECDSA over P-521 with SHA-512
    #[serde(rename = "ES512")]
    Es512,
}

impl SignatureAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [Self; 3] = [Self::Es256, Self::Es384, Self::Es512];

    /// JOSE algorithm identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
        }
    }

    /// Curve the algorithm is defined over.
    pub fn curve(self) -> Curve {
        match self {
            Self::Es256 => Curve::P256,
            Self::Es384 => Curve::P384,
            Self::Es512 => Curve::P521,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256" => Ok(Self::Es256),
            "ES384" => Ok(Self::Es384),
            "ES512" => Ok(Self::Es512),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Supported NIST curves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Curve {
    /// NIST P-256 (secp256r1)
    P256,
    /// NIST P-384 (secp384r1)
    P384,
    /// NIST P-521 (secp521r1)
    P521,
}

impl Curve {
    /// JWK `crv` value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Length in bytes of a coordinate or scalar on this curve.
    pub fn field_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    /// Signature algorithm used with keys on this curve.
    pub fn algorithm(self) -> SignatureAlgorithm {
        match self {
            Self::P256 => SignatureAlgorithm::Es256,
            Self::P384 => SignatureAlgorithm::Es384,
            Self::P521 => SignatureAlgorithm::Es512,
        }
    }
}

impl FromStr for Curve {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P-256" => Ok(Self::P256),
            "P-384" => Ok(Self::P384),
            "P-521" => Ok(Self::P521),
            other => Err(CryptoError::UnsupportedAlgorithm(format!("curve {other}"))),
        }
    }
}

/// An elliptic-curve key in JWK form.
///
/// A public description carries `x`/`y`; a private one additionally carries
/// the scalar `d`, which is zeroized on drop and never printed by `Debug`.
/// Members other than the ones below are ignored on input.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescription {
    /// Key type, always `EC` for supported keys
    pub kty: String,
    /// Curve name (`P-256`, `P-384` or `P-521`)
    pub crv: String,
    /// Base64url affine x coordinate
    pub x: String,
    /// Base64url affine y coordinate
    pub y: String,
    /// Base64url private scalar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// Declared signature algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl KeyDescription {
    /// Parse a JWK from JSON text.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::invalid_key(format!("key description: {e}")))
    }

    /// Whether the description carries a private scalar.
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Copy of this description without the private scalar.
    pub fn to_public(&self) -> Self {
        Self {
            kty: self.kty.clone(),
            crv: self.crv.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
            d: None,
            alg: self.alg.clone(),
        }
    }

    /// Curve named by `crv`, provided the key type is `EC`.
    pub fn curve(&self) -> Result<Curve, CryptoError> {
        if self.kty != KEY_TYPE_EC {
            return Err(CryptoError::UnsupportedAlgorithm(format!("key type {}", self.kty)));
        }
        self.crv.parse()
    }

    /// Signature algorithm for this key.
    ///
    /// Derived from the curve. A declared `alg` must agree with it.
    pub fn algorithm(&self) -> Result<SignatureAlgorithm, CryptoError> {
        let derived = self.curve()?.algorithm();
        match self.alg.as_deref() {
            None => Ok(derived),
            Some(declared) => {
                let declared: SignatureAlgorithm = declared.parse()?;
                if declared == derived {
                    Ok(derived)
                } else {
                    Err(CryptoError::UnsupportedAlgorithm(format!(
                        "{declared} cannot be used with curve {}",
                        self.crv
                    )))
                }
            },
        }
    }

    /// RFC 7638 thumbprint (SHA-256, base64url).
    ///
    /// Depends only on `crv`, `kty`, `x` and `y`, so a private key and its
    /// public half share a thumbprint.
    pub fn thumbprint(&self) -> Result<String, CryptoError> {
        self.curve()?;
        let canonical = self.canonical_members()?;
        Ok(b64(&Sha256::digest(canonical.as_bytes())))
    }

    /// Required members in lexicographic order, no whitespace.
    fn canonical_members(&self) -> Result<String, CryptoError> {
        let members: BTreeMap<&str, &str> = BTreeMap::from([
            ("crv", self.crv.as_str()),
            ("kty", self.kty.as_str()),
            ("x", self.x.as_str()),
            ("y", self.y.as_str()),
        ]);
        serde_json::to_string(&members)
            .map_err(|e| CryptoError::invalid_key(format!("thumbprint members: {e}")))
    }
}

impl fmt::Debug for KeyDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDescription")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("d", &self.d.as_ref().map(|_| "<redacted>"))
            .field("alg", &self.alg)
            .finish()
    }
}

impl Drop for KeyDescription {
    fn drop(&mut self) {
        if let Some(d) = self.d.as_mut() {
            d.zeroize();
        }
    }
}

/// A public/private key description pair, as written by the key generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    /// Private key (includes `d`)
    pub private_key: KeyDescription,
    /// Public key
    pub public_key: KeyDescription,
}

impl KeyPair {
    /// Generate a fresh key pair for `algorithm`.
    ///
    /// `fill` must write cryptographically secure random bytes. Both halves
    /// are tagged with the algorithm identifier.
    pub fn generate(
        algorithm: SignatureAlgorithm,
        fill: impl FnMut(&mut [u8]),
    ) -> Result<Self, CryptoError> {
        let handle = KeyHandle::generate(algorithm, fill)?;
        let tag = Some(algorithm.as_str().to_string());

        let mut public_key = handle.public_description();
        public_key.alg.clone_from(&tag);
        let mut private_key = handle.private_description().ok_or(CryptoError::MissingPrivateKey)?;
        private_key.alg = tag;

        Ok(Self { private_key, public_key })
    }

    /// Parse the key-pair JSON format.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::invalid_key(format!("key pair: {e}")))
    }

    /// Serialize to the key-pair JSON format.
    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CryptoError::invalid_key(format!("key pair: {e}")))
    }
}
