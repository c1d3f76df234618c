//! Content encryption algorithms (RFC 7518 section 5).
//!
//! Two families:
//! - `AxxxGCM`: AES-GCM, 96-bit IV, 128-bit tag
//! - `AxxxCBC-HSyyy`: AES-CBC with PKCS#7 padding, authenticated by a
//!   truncated HMAC over `AAD || IV || ciphertext || AL`. The content key is
//!   `MAC_KEY || ENC_KEY`.

use std::{fmt, str::FromStr};

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::{
    Aes128Gcm, Aes256Gcm, AesGcm,
    aead::{Aead, AeadCore, KeyInit, Payload, consts::U12, generic_array::GenericArray},
};
use cbc::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};

use crate::error::CryptoError;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// GCM authentication tag size (16 bytes)
const GCM_TAG_SIZE: usize = 16;

/// Authenticated content-encryption algorithm (JWE `enc`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentEncryption {
    /// AES-128-GCM
    #[serde(rename = "A128GCM")]
    A128Gcm,
    /// AES-192-GCM
    #[serde(rename = "A192GCM")]
    A192Gcm,
    /// AES-256-GCM
    #[serde(rename = "A256GCM")]
    A256Gcm,
    /// AES-128-CBC with HMAC-SHA-256
    #[serde(rename = "A128CBC-HS256")]
    A128CbcHs256,
    /// AES-192-CBC with HMAC-SHA-384
    #[serde(rename = "A192CBC-HS384")]
    A192CbcHs384,
    /// AES-256-CBC with HMAC-SHA-512
    #[default]
    #[serde(rename = "A256CBC-HS512")]
    A256CbcHs512,
}

impl ContentEncryption {
    /// Every supported algorithm.
    pub const ALL: [Self; 6] = [
        Self::A128Gcm,
        Self::A192Gcm,
        Self::A256Gcm,
        Self::A128CbcHs256,
        Self::A192CbcHs384,
        Self::A256CbcHs512,
    ];

    /// JOSE identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A128Gcm => "A128GCM",
            Self::A192Gcm => "A192GCM",
            Self::A256Gcm => "A256GCM",
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A192CbcHs384 => "A192CBC-HS384",
            Self::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    /// Content key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::A128Gcm => 16,
            Self::A192Gcm => 24,
            Self::A256Gcm | Self::A128CbcHs256 => 32,
            Self::A192CbcHs384 => 48,
            Self::A256CbcHs512 => 64,
        }
    }

    /// Initialization vector length in bytes.
    pub fn iv_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A192Gcm | Self::A256Gcm => 12,
            Self::A128CbcHs256 | Self::A192CbcHs384 | Self::A256CbcHs512 => 16,
        }
    }

    /// Authentication tag length in bytes.
    pub fn tag_len(self) -> usize {
        match self {
            Self::A128Gcm | Self::A192Gcm | Self::A256Gcm | Self::A128CbcHs256 => 16,
            Self::A192CbcHs384 => 24,
            Self::A256CbcHs512 => 32,
        }
    }

    /// Encrypt `plaintext`, authenticating `aad`. Returns `(ciphertext, tag)`.
    pub fn seal(
        self,
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        self.check_lengths(cek, iv).map_err(|reason| CryptoError::EncryptionFailed { reason })?;
        match self {
            Self::A128Gcm => gcm_seal::<Aes128Gcm>(cek, iv, aad, plaintext),
            Self::A192Gcm => gcm_seal::<Aes192Gcm>(cek, iv, aad, plaintext),
            Self::A256Gcm => gcm_seal::<Aes256Gcm>(cek, iv, aad, plaintext),
            Self::A128CbcHs256 => cbc_hs_seal::<Aes128, Hmac<Sha256>>(cek, iv, aad, plaintext, 16),
            Self::A192CbcHs384 => cbc_hs_seal::<Aes192, Hmac<Sha384>>(cek, iv, aad, plaintext, 24),
            Self::A256CbcHs512 => cbc_hs_seal::<Aes256, Hmac<Sha512>>(cek, iv, aad, plaintext, 32),
        }
    }

    /// Verify the tag and decrypt.
    ///
    /// # Errors
    ///
    /// - `DecryptionFailed`: wrong key, tampered AAD/IV/ciphertext/tag, or bad
    ///   padding
    pub fn open(
        self,
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.check_lengths(cek, iv).map_err(|reason| CryptoError::DecryptionFailed { reason })?;
        if tag.len() != self.tag_len() {
            return Err(CryptoError::decryption(format!(
                "tag must be {} bytes, got {}",
                self.tag_len(),
                tag.len()
            )));
        }
        match self {
            Self::A128Gcm => gcm_open::<Aes128Gcm>(cek, iv, aad, ciphertext, tag),
            Self::A192Gcm => gcm_open::<Aes192Gcm>(cek, iv, aad, ciphertext, tag),
            Self::A256Gcm => gcm_open::<Aes256Gcm>(cek, iv, aad, ciphertext, tag),
            Self::A128CbcHs256 => cbc_hs_open::<Aes128, Hmac<Sha256>>(cek, iv, aad, ciphertext, tag),
            Self::A192CbcHs384 => cbc_hs_open::<Aes192, Hmac<Sha384>>(cek, iv, aad, ciphertext, tag),
            Self::A256CbcHs512 => cbc_hs_open::<Aes256, Hmac<Sha512>>(cek, iv, aad, ciphertext, tag),
        }
    }

    fn check_lengths(self, cek: &[u8], iv: &[u8]) -> Result<(), String> {
        if cek.len() != self.key_len() {
            return Err(format!("{} needs a {}-byte key, got {}", self, self.key_len(), cek.len()));
        }
        if iv.len() != self.iv_len() {
            return Err(format!("{} needs a {}-byte IV, got {}", self, self.iv_len(), iv.len()));
        }
        Ok(())
    }
}

impl fmt::Display for ContentEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncryption {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|enc| enc.as_str() == s)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

fn gcm_seal<C>(
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), CryptoError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher = C::new_from_slice(cek)
        .map_err(|_| CryptoError::EncryptionFailed { reason: "invalid key length".into() })?;
    let mut sealed = cipher
        .encrypt(GenericArray::from_slice(iv), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::EncryptionFailed { reason: "AES-GCM seal".into() })?;

    let tag = sealed.split_off(sealed.len() - GCM_TAG_SIZE);
    Ok((sealed, tag))
}

fn gcm_open<C>(
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, CryptoError>
where
    C: KeyInit + Aead + AeadCore<NonceSize = U12>,
{
    let cipher =
        C::new_from_slice(cek).map_err(|_| CryptoError::decryption("invalid key length"))?;
    let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(GenericArray::from_slice(iv), Payload { msg: &sealed, aad })
        .map_err(|_| CryptoError::decryption("authentication failed"))
}

fn cbc_hs_seal<C, M>(
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    tag_len: usize,
) -> Result<(Vec<u8>, Vec<u8>), CryptoError>
where
    C: BlockEncryptMut + BlockDecryptMut + BlockCipher,
    cbc::Encryptor<C>: KeyIvInit + BlockEncryptMut,
    M: Mac + hmac::digest::KeyInit,
{
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
    let ciphertext = cbc::Encryptor::<C>::new_from_slices(enc_key, iv)
        .map_err(|_| CryptoError::EncryptionFailed { reason: "invalid AES-CBC key".into() })?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mac = cbc_hs_mac::<M>(mac_key, aad, iv, &ciphertext)?;
    let tag = mac.finalize().into_bytes()[..tag_len].to_vec();
    Ok((ciphertext, tag))
}

fn cbc_hs_open<C, M>(
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, CryptoError>
where
    C: BlockEncryptMut + BlockDecryptMut + BlockCipher,
    cbc::Decryptor<C>: KeyIvInit + BlockDecryptMut,
    M: Mac + hmac::digest::KeyInit,
{
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

    // Authenticate before touching the padding
    cbc_hs_mac::<M>(mac_key, aad, iv, ciphertext)?
        .verify_truncated_left(tag)
        .map_err(|_| CryptoError::decryption("authentication failed"))?;

    cbc::Decryptor::<C>::new_from_slices(enc_key, iv)
        .map_err(|_| CryptoError::decryption("invalid AES-CBC key"))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::decryption("invalid padding"))
}

fn cbc_hs_mac<M>(mac_key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<M, CryptoError>
where
    M: Mac + hmac::digest::KeyInit,
{
    let mut mac = <M as Mac>::new_from_slice(mac_key)
        .map_err(|_| CryptoError::EncryptionFailed { reason: "invalid MAC key".into() })?;
    let aad_bits = (aad.len() as u64) * 8;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&aad_bits.to_be_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(enc: ContentEncryption) -> (Vec<u8>, Vec<u8>) {
        let cek = (0..enc.key_len()).map(|i| i as u8).collect();
        let iv = vec![0xA5; enc.iv_len()];
        (cek, iv)
    }

    #[test]
    fn seal_open_roundtrip_all_algorithms() {
        for enc in ContentEncryption::ALL {
            let (cek, iv) = material(enc);

            let (ciphertext, tag) = enc.seal(&cek, &iv, b"header", b"hello nile").unwrap();
            assert_eq!(tag.len(), enc.tag_len(), "{enc}");

            let plaintext = enc.open(&cek, &iv, b"header", &ciphertext, &tag).unwrap();
            assert_eq!(plaintext, b"hello nile", "{enc}");
        }
    }

    #[test]
    fn aad_is_authenticated() {
        for enc in ContentEncryption::ALL {
            let (cek, iv) = material(enc);
            let (ciphertext, tag) = enc.seal(&cek, &iv, b"header", b"payload").unwrap();

            let result = enc.open(&cek, &iv, b"HEADER", &ciphertext, &tag);
            assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })), "{enc}");
        }
    }

    #[test]
    fn tampered_ciphertext_fails() {
        for enc in ContentEncryption::ALL {
            let (cek, iv) = material(enc);
            let (mut ciphertext, tag) = enc.seal(&cek, &iv, b"", b"some plaintext").unwrap();
            ciphertext[0] ^= 0x01;

            assert!(enc.open(&cek, &iv, b"", &ciphertext, &tag).is_err(), "{enc}");
        }
    }

    #[test]
    fn truncated_tag_rejected() {
        let enc = ContentEncryption::A256CbcHs512;
        let (cek, iv) = material(enc);
        let (ciphertext, tag) = enc.seal(&cek, &iv, b"", b"payload").unwrap();

        assert!(enc.open(&cek, &iv, b"", &ciphertext, &tag[..16]).is_err());
    }

    #[test]
    fn wrong_key_length_rejected() {
        let enc = ContentEncryption::A128Gcm;
        let iv = vec![0; enc.iv_len()];

        assert!(matches!(
            enc.seal(&[0; 32], &iv, b"", b"x"),
            Err(CryptoError::EncryptionFailed { .. })
        ));
    }

    #[test]
    fn identifiers_roundtrip_through_from_str() {
        for enc in ContentEncryption::ALL {
            assert_eq!(enc.as_str().parse::<ContentEncryption>().unwrap(), enc);
        }
        assert!("A256KW".parse::<ContentEncryption>().is_err());
        assert_eq!(ContentEncryption::default(), ContentEncryption::A256CbcHs512);
    }

    #[test]
    fn cbc_ciphertext_is_block_padded() {
        let enc = ContentEncryption::A128CbcHs256;
        let (cek, iv) = material(enc);

        let (ciphertext, _) = enc.seal(&cek, &iv, b"", &[0u8; 16]).unwrap();
        // Full block of plaintext gets a full block of padding
        assert_eq!(ciphertext.len(), 32);
    }
}
