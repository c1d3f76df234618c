//! ECDH-ES key derivation and AES key wrap (RFC 7518 section 4.6).

use aes_kw::KekAes256;
use aes_gcm::aead::generic_array::GenericArray;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Wrapping key size for A256KW (32 bytes)
pub(crate) const WRAPPING_KEY_LEN: usize = 32;

/// Concat KDF (NIST SP 800-56A) with SHA-256, one round.
///
/// `OtherInfo` is `AlgorithmID || PartyUInfo || PartyVInfo || SuppPubInfo`,
/// each length-prefixed with a big-endian u32. PartyUInfo and PartyVInfo are
/// empty.
pub(crate) fn derive_wrapping_key(
    shared_secret: &[u8],
    algorithm: &str,
) -> Zeroizing<[u8; WRAPPING_KEY_LEN]> {
    let mut hasher = Sha256::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(shared_secret);
    hasher.update(length_prefixed(algorithm.as_bytes()));
    hasher.update(0u32.to_be_bytes());
    hasher.update(0u32.to_be_bytes());
    hasher.update(((WRAPPING_KEY_LEN * 8) as u32).to_be_bytes());

    let mut key = Zeroizing::new([0u8; WRAPPING_KEY_LEN]);
    key.copy_from_slice(&hasher.finalize());
    key
}

pub(crate) fn wrap_key(kek: &[u8; WRAPPING_KEY_LEN], cek: &[u8]) -> Result<Vec<u8>, CryptoError> {
    KekAes256::new(GenericArray::from_slice(kek))
        .wrap_vec(cek)
        .map_err(|e| CryptoError::EncryptionFailed { reason: format!("key wrap: {e}") })
}

pub(crate) fn unwrap_key(
    kek: &[u8; WRAPPING_KEY_LEN],
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    KekAes256::new(GenericArray::from_slice(kek))
        .unwrap_vec(wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::decryption("key unwrap integrity check failed"))
}

fn length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic_and_bound_to_algorithm() {
        let z = [7u8; 32];
        let a = derive_wrapping_key(&z, "ECDH-ES+A256KW");
        let b = derive_wrapping_key(&z, "ECDH-ES+A256KW");
        let c = derive_wrapping_key(&z, "ECDH-ES+A128KW");

        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let kek = [3u8; WRAPPING_KEY_LEN];
        let cek = [9u8; 64];

        let wrapped = wrap_key(&kek, &cek).unwrap();
        assert_eq!(wrapped.len(), cek.len() + 8);
        assert_eq!(unwrap_key(&kek, &wrapped).unwrap().as_slice(), &cek);
    }

    #[test]
    fn unwrap_with_wrong_kek_fails() {
        let wrapped = wrap_key(&[3u8; WRAPPING_KEY_LEN], &[9u8; 32]).unwrap();

        assert!(matches!(
            unwrap_key(&[4u8; WRAPPING_KEY_LEN], &wrapped),
            Err(CryptoError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn rfc3394_known_answer() {
        // RFC 3394 section 4.6: 256 bits of key data with a 256-bit KEK
        let kek: [u8; 32] = core::array::from_fn(|i| i as u8);
        let data = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
            0x0C, 0x0D, 0x0E, 0x0F,
        ];
        let expected = [
            0x28, 0xC9, 0xF4, 0x04, 0xC4, 0xB8, 0x10, 0xF4, 0xCB, 0xCC, 0xB3, 0x5C, 0xFB, 0x87,
            0xF8, 0x26, 0x3F, 0x57, 0x86, 0xE2, 0xD8, 0x0E, 0xD3, 0x26, 0xCB, 0xC7, 0xF0, 0xE7,
            0x1A, 0x99, 0xF4, 0x3B, 0xFB, 0x98, 0x8B, 0x9B, 0x7A, 0x02, 0xDD, 0x21,
        ];

        assert_eq!(wrap_key(&kek, &data).unwrap(), expected);
    }
}
