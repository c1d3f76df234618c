//! Parsed, usable keys.
//!
//! A [`KeyHandle`] is the provider-side form of a [`KeyDescription`]: a
//! validated curve point and, for private keys, the matching scalar. Parsing
//! checks that coordinates have the curve's length, that the point lies on the
//! curve and that a private scalar actually belongs to the point.

use std::fmt;

use p256::{
    ecdsa::signature::{Signer, Verifier},
    elliptic_curve::sec1::ToEncodedPoint,
};
use zeroize::Zeroizing;

use crate::{
    encoding::{b64, decode_segment},
    error::CryptoError,
    jwk::{Curve, KEY_TYPE_EC, KeyDescription, SignatureAlgorithm},
};

/// Attempts at drawing a valid scalar before giving up.
///
/// A uniformly random scalar (after masking the unused P-521 bits) is out of
/// range with probability below 2^-32, so exhausting this bound means the
/// random source is broken.
const MAX_SCALAR_ATTEMPTS: usize = 8;

/// Uncompressed SEC1 point tag.
const SEC1_UNCOMPRESSED: u8 = 0x04;

/// A usable elliptic-curve key.
pub struct KeyHandle {
    algorithm: SignatureAlgorithm,
    key: CurveKey,
}

enum CurveKey {
    P256 { public: p256::PublicKey, secret: Option<p256::SecretKey> },
    P384 { public: p384::PublicKey, secret: Option<p384::SecretKey> },
    P521 { public: p521::PublicKey, secret: Option<p521::SecretKey> },
}

impl KeyHandle {
    /// Parse a key description.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlgorithm`: key type, curve or declared `alg` not supported
    /// - `InvalidKey`: bad encoding, point off the curve, or a private scalar
    ///   that does not match the public point
    pub fn parse(description: &KeyDescription) -> Result<Self, CryptoError> {
        let algorithm = description.algorithm()?;
        let curve = algorithm.curve();

        let x = decode_field(curve, &description.x, "x")?;
        let y = decode_field(curve, &description.y, "y")?;
        let mut point = Vec::with_capacity(1 + 2 * curve.field_len());
        point.push(SEC1_UNCOMPRESSED);
        point.extend_from_slice(&x);
        point.extend_from_slice(&y);

        let scalar = description.d.as_deref().map(|d| decode_field(curve, d, "d")).transpose()?;

        let key = match curve {
            Curve::P256 => {
                let public = p256::PublicKey::from_sec1_bytes(&point)
                    .map_err(|_| CryptoError::invalid_key("point is not on P-256"))?;
                let secret = match scalar {
                    Some(bytes) => {
                        let secret = p256::SecretKey::from_slice(&bytes)
                            .map_err(|_| CryptoError::invalid_key("private scalar out of range"))?;
                        if secret.public_key() != public {
                            return Err(CryptoError::invalid_key(
                                "private scalar does not match public point",
                            ));
                        }
                        Some(secret)
                    },
                    None => None,
                };
                CurveKey::P256 { public, secret }
            },
            Curve::P384 => {
                let public = p384::PublicKey::from_sec1_bytes(&point)
                    .map_err(|_| CryptoError::invalid_key("point is not on P-384"))?;
                let secret = match scalar {
                    Some(bytes) => {
                        let secret = p384::SecretKey::from_slice(&bytes)
                            .map_err(|_| CryptoError::invalid_key("private scalar out of range"))?;
                        if secret.public_key() != public {
                            return Err(CryptoError::invalid_key(
                                "private scalar does not match public point",
                            ));
                        }
                        Some(secret)
                    },
                    None => None,
                };
                CurveKey::P384 { public, secret }
            },
            Curve::P521 => {
                let public = p521::PublicKey::from_sec1_bytes(&point)
                    .map_err(|_| CryptoError::invalid_key("point is not on P-521"))?;
                let secret = match scalar {
                    Some(bytes) => {
                        let secret = p521::SecretKey::from_slice(&bytes)
                            .map_err(|_| CryptoError::invalid_key("private scalar out of range"))?;
                        if secret.public_key() != public {
                            return Err(CryptoError::invalid_key(
                                "private scalar does not match public point",
                            ));
                        }
                        Some(secret)
                    },
                    None => None,
                };
                CurveKey::P521 { public, secret }
            },
        };

        Ok(Self { algorithm, key })
    }

    /// Generate a new private key handle from caller-provided randomness.
    pub fn generate(
        algorithm: SignatureAlgorithm,
        mut fill: impl FnMut(&mut [u8]),
    ) -> Result<Self, CryptoError> {
        let key = match algorithm.curve() {
            Curve::P256 => {
                let secret = random_p256(&mut fill)?;
                CurveKey::P256 { public: secret.public_key(), secret: Some(secret) }
            },
            Curve::P384 => {
                let secret = random_p384(&mut fill)?;
                CurveKey::P384 { public: secret.public_key(), secret: Some(secret) }
            },
            Curve::P521 => {
                let secret = random_p521(&mut fill)?;
                CurveKey::P521 { public: secret.public_key(), secret: Some(secret) }
            },
        };
        Ok(Self { algorithm, key })
    }

    /// Signature algorithm of this key.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Curve of this key.
    pub fn curve(&self) -> Curve {
        self.algorithm.curve()
    }

    /// Whether the handle can sign and decrypt.
    pub fn has_private(&self) -> bool {
        match &self.key {
            CurveKey::P256 { secret, .. } => secret.is_some(),
            CurveKey::P384 { secret, .. } => secret.is_some(),
            CurveKey::P521 { secret, .. } => secret.is_some(),
        }
    }

    /// Public JWK for this key, without `alg`.
    pub fn public_description(&self) -> KeyDescription {
        let point = match &self.key {
            CurveKey::P256 { public, .. } => public.to_encoded_point(false).as_bytes().to_vec(),
            CurveKey::P384 { public, .. } => public.to_encoded_point(false).as_bytes().to_vec(),
            CurveKey::P521 { public, .. } => public.to_encoded_point(false).as_bytes().to_vec(),
        };
        describe_point(self.curve(), &point)
    }

    /// Private JWK for this key, without `alg`. `None` for public handles.
    pub fn private_description(&self) -> Option<KeyDescription> {
        let scalar: Zeroizing<Vec<u8>> = match &self.key {
            CurveKey::P256 { secret: Some(secret), .. } => Zeroizing::new(secret.to_bytes().to_vec()),
            CurveKey::P384 { secret: Some(secret), .. } => Zeroizing::new(secret.to_bytes().to_vec()),
            CurveKey::P521 { secret: Some(secret), .. } => Zeroizing::new(secret.to_bytes().to_vec()),
            _ => return None,
        };
        let mut description = self.public_description();
        description.d = Some(b64(&scalar));
        Some(description)
    }

    /// Fixed-width `r || s` ECDSA signature over `message`.
    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signing_failed = |e: p256::ecdsa::Error| CryptoError::SigningFailed { reason: e.to_string() };
        match &self.key {
            CurveKey::P256 { secret: Some(secret), .. } => {
                let signing_key = p256::ecdsa::SigningKey::from(secret);
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(message).map_err(signing_failed)?;
                Ok(signature.to_bytes().to_vec())
            },
            CurveKey::P384 { secret: Some(secret), .. } => {
                let signing_key = p384::ecdsa::SigningKey::from(secret);
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(message).map_err(signing_failed)?;
                Ok(signature.to_bytes().to_vec())
            },
            CurveKey::P521 { secret: Some(secret), .. } => {
                let signing_key =
                    p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).map_err(signing_failed)?;
                let signature: p521::ecdsa::Signature =
                    signing_key.try_sign(message).map_err(signing_failed)?;
                Ok(signature.to_bytes().to_vec())
            },
            _ => Err(CryptoError::MissingPrivateKey),
        }
    }

    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        match &self.key {
            CurveKey::P256 { public, .. } => {
                let signature = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::SignatureInvalid)?;
                p256::ecdsa::VerifyingKey::from(public)
                    .verify(message, &signature)
                    .map_err(|_| CryptoError::SignatureInvalid)
            },
            CurveKey::P384 { public, .. } => {
                let signature = p384::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::SignatureInvalid)?;
                p384::ecdsa::VerifyingKey::from(public)
                    .verify(message, &signature)
                    .map_err(|_| CryptoError::SignatureInvalid)
            },
            CurveKey::P521 { public, .. } => {
                let signature = p521::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::SignatureInvalid)?;
                p521::ecdsa::VerifyingKey::from_sec1_bytes(
                    public.to_encoded_point(false).as_bytes(),
                )
                .map_err(|_| CryptoError::SignatureInvalid)?
                .verify(message, &signature)
                .map_err(|_| CryptoError::SignatureInvalid)
            },
        }
    }

    /// Sender side of ECDH-ES: fresh ephemeral key against this public key.
    ///
    /// Returns the shared secret `Z` and the ephemeral public key to publish.
    pub(crate) fn agree_ephemeral(
        &self,
        fill: &mut impl FnMut(&mut [u8]),
    ) -> Result<(Zeroizing<Vec<u8>>, KeyDescription), CryptoError> {
        match &self.key {
            CurveKey::P256 { public, .. } => {
                let ephemeral = random_p256(fill)?;
                let shared =
                    p256::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), public.as_affine());
                let epk = describe_point(
                    Curve::P256,
                    ephemeral.public_key().to_encoded_point(false).as_bytes(),
                );
                Ok((Zeroizing::new(shared.raw_secret_bytes().to_vec()), epk))
            },
            CurveKey::P384 { public, .. } => {
                let ephemeral = random_p384(fill)?;
                let shared =
                    p384::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), public.as_affine());
                let epk = describe_point(
                    Curve::P384,
                    ephemeral.public_key().to_encoded_point(false).as_bytes(),
                );
                Ok((Zeroizing::new(shared.raw_secret_bytes().to_vec()), epk))
            },
            CurveKey::P521 { public, .. } => {
                let ephemeral = random_p521(fill)?;
                let shared =
                    p521::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), public.as_affine());
                let epk = describe_point(
                    Curve::P521,
                    ephemeral.public_key().to_encoded_point(false).as_bytes(),
                );
                Ok((Zeroizing::new(shared.raw_secret_bytes().to_vec()), epk))
            },
        }
    }

    /// Recipient side of ECDH-ES: own private key against the sender's
    /// ephemeral public key.
    pub(crate) fn agree_static(
        &self,
        ephemeral: &KeyHandle,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match (&self.key, &ephemeral.key) {
            (CurveKey::P256 { secret: Some(secret), .. }, CurveKey::P256 { public, .. }) => {
                let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            },
            (CurveKey::P384 { secret: Some(secret), .. }, CurveKey::P384 { public, .. }) => {
                let shared = p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            },
            (CurveKey::P521 { secret: Some(secret), .. }, CurveKey::P521 { public, .. }) => {
                let shared = p521::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            },
            (
                CurveKey::P256 { secret: None, .. }
                | CurveKey::P384 { secret: None, .. }
                | CurveKey::P521 { secret: None, .. },
                _,
            ) => {
                Err(CryptoError::MissingPrivateKey)
            },
            _ => Err(CryptoError::decryption("ephemeral key is on a different curve")),
        }
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("algorithm", &self.algorithm)
            .field("private", &self.has_private())
            .finish_non_exhaustive()
    }
}

fn decode_field(curve: Curve, value: &str, name: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let bytes = Zeroizing::new(
        decode_segment(value).map_err(|_| CryptoError::invalid_key(format!("{name} is not base64url")))?,
    );
    if bytes.len() != curve.field_len() {
        return Err(CryptoError::invalid_key(format!(
            "{name} must be {} bytes for {}, got {}",
            curve.field_len(),
            curve.as_str(),
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Build a public JWK from an uncompressed SEC1 point.
fn describe_point(curve: Curve, point: &[u8]) -> KeyDescription {
    let n = curve.field_len();
    KeyDescription {
        kty: KEY_TYPE_EC.to_string(),
        crv: curve.as_str().to_string(),
        x: b64(&point[1..=n]),
        y: b64(&point[n + 1..]),
        d: None,
        alg: None,
    }
}

fn random_p256(fill: &mut impl FnMut(&mut [u8])) -> Result<p256::SecretKey, CryptoError> {
    let mut bytes = Zeroizing::new([0u8; 32]);
    for _ in 0..MAX_SCALAR_ATTEMPTS {
        fill(bytes.as_mut_slice());
        if let Ok(secret) = p256::SecretKey::from_slice(bytes.as_slice()) {
            return Ok(secret);
        }
    }
    Err(CryptoError::KeyGeneration { reason: "random source yields no valid P-256 scalar".into() })
}

fn random_p384(fill: &mut impl FnMut(&mut [u8])) -> Result<p384::SecretKey, CryptoError> {
    let mut bytes = Zeroizing::new([0u8; 48]);
    for _ in 0..MAX_SCALAR_ATTEMPTS {
        fill(bytes.as_mut_slice());
        if let Ok(secret) = p384::SecretKey::from_slice(bytes.as_slice()) {
            return Ok(secret);
        }
    }
    Err(CryptoError::KeyGeneration { reason: "random source yields no valid P-384 scalar".into() })
}

/// Bits of the leading scalar byte that can be set below the P-521 order.
const P521_LEADING_BYTE_MASK: u8 = 0x01;

fn random_p521(fill: &mut impl FnMut(&mut [u8])) -> Result<p521::SecretKey, CryptoError> {
    let mut bytes = Zeroizing::new([0u8; 66]);
    for _ in 0..MAX_SCALAR_ATTEMPTS {
        fill(bytes.as_mut_slice());
        // 528 random bits would exceed the order almost always
        bytes[0] &= P521_LEADING_BYTE_MASK;
        if let Ok(secret) = p521::SecretKey::from_slice(bytes.as_slice()) {
            return Ok(secret);
        }
    }
    Err(CryptoError::KeyGeneration { reason: "random source yields no valid P-521 scalar".into() })
}

#[cfg(test)]
mod tests {
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::jwk::KeyPair;

    fn key_pair(algorithm: SignatureAlgorithm, seed: u64) -> KeyPair {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        KeyPair::generate(algorithm, |buf: &mut [u8]| rng.fill_bytes(buf)).unwrap()
    }

    #[test]
    fn parse_generated_pair() {
        for algorithm in SignatureAlgorithm::ALL {
            let pair = key_pair(algorithm, 7);

            let private = KeyHandle::parse(&pair.private_key).unwrap();
            let public = KeyHandle::parse(&pair.public_key).unwrap();

            assert!(private.has_private());
            assert!(!public.has_private());
            assert_eq!(private.algorithm(), algorithm);

            let mut expected = pair.public_key.clone();
            expected.alg = None;
            assert_eq!(public.public_description(), expected);
            assert!(public.private_description().is_none());
        }
    }

    #[test]
    fn sign_and_verify() {
        let pair = key_pair(SignatureAlgorithm::Es256, 8);
        let private = KeyHandle::parse(&pair.private_key).unwrap();
        let public = KeyHandle::parse(&pair.public_key).unwrap();

        let signature = private.sign(b"message").unwrap();
        assert_eq!(signature.len(), 64);
        public.verify(b"message", &signature).unwrap();
        assert_eq!(public.verify(b"other", &signature), Err(CryptoError::SignatureInvalid));
    }

    #[test]
    fn public_handle_cannot_sign() {
        let pair = key_pair(SignatureAlgorithm::Es384, 9);
        let public = KeyHandle::parse(&pair.public_key).unwrap();

        assert_eq!(public.sign(b"message"), Err(CryptoError::MissingPrivateKey));
    }

    #[test]
    fn mismatched_private_scalar_rejected() {
        let a = key_pair(SignatureAlgorithm::Es256, 10);
        let b = key_pair(SignatureAlgorithm::Es256, 11);

        let mut franken = a.public_key.clone();
        franken.d.clone_from(&b.private_key.d);

        assert!(matches!(KeyHandle::parse(&franken), Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn point_off_curve_rejected() {
        let mut key = key_pair(SignatureAlgorithm::Es256, 12).public_key;
        key.y = key.x.clone();

        assert!(matches!(KeyHandle::parse(&key), Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn wrong_coordinate_length_rejected() {
        let p256 = key_pair(SignatureAlgorithm::Es256, 13).public_key;
        let mut key = key_pair(SignatureAlgorithm::Es384, 13).public_key;
        key.x.clone_from(&p256.x);

        assert!(matches!(KeyHandle::parse(&key), Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn ecdh_agrees_on_both_sides() {
        let pair = key_pair(SignatureAlgorithm::Es384, 14);
        let recipient_public = KeyHandle::parse(&pair.public_key).unwrap();
        let recipient_private = KeyHandle::parse(&pair.private_key).unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let mut fill = |buf: &mut [u8]| rng.fill_bytes(buf);
        let (sender_z, epk) = recipient_public.agree_ephemeral(&mut fill).unwrap();

        let epk = KeyHandle::parse(&epk).unwrap();
        let recipient_z = recipient_private.agree_static(&epk).unwrap();

        assert_eq!(sender_z, recipient_z);
        assert_eq!(sender_z.len(), 48);
    }

    #[test]
    fn p521_keys_sign_verify_and_agree() {
        let pair = key_pair(SignatureAlgorithm::Es512, 15);
        assert_eq!(Curve::P521.field_len(), 66);
        assert_eq!(decode_segment(&pair.public_key.x).unwrap().len(), 66);
        assert_eq!(decode_segment(pair.private_key.d.as_deref().unwrap()).unwrap().len(), 66);

        let private = KeyHandle::parse(&pair.private_key).unwrap();
        let public = KeyHandle::parse(&pair.public_key).unwrap();
        assert_eq!(public.curve(), Curve::P521);

        let signature = private.sign(b"message").unwrap();
        assert_eq!(signature.len(), 132);
        public.verify(b"message", &signature).unwrap();
        assert_eq!(public.verify(b"other", &signature), Err(CryptoError::SignatureInvalid));

        let mut rng = ChaCha20Rng::seed_from_u64(16);
        let mut fill = |buf: &mut [u8]| rng.fill_bytes(buf);
        let (sender_z, epk) = public.agree_ephemeral(&mut fill).unwrap();
        let recipient_z = private.agree_static(&KeyHandle::parse(&epk).unwrap()).unwrap();
        assert_eq!(sender_z, recipient_z);
        assert_eq!(sender_z.len(), 66);
    }

    #[test]
    fn p521_signature_does_not_verify_under_p384_key() {
        let p521 = KeyHandle::parse(&key_pair(SignatureAlgorithm::Es512, 17).private_key).unwrap();
        let p384 = KeyHandle::parse(&key_pair(SignatureAlgorithm::Es384, 17).public_key).unwrap();

        let signature = p521.sign(b"message").unwrap();
        assert_eq!(p384.verify(b"message", &signature), Err(CryptoError::SignatureInvalid));
    }

    #[test]
    fn broken_random_source_is_reported() {
        // All-zero scalars are never valid
        let result = KeyHandle::generate(SignatureAlgorithm::Es256, |buf: &mut [u8]| buf.fill(0));
        assert!(matches!(result, Err(CryptoError::KeyGeneration { .. })));
    }
}
