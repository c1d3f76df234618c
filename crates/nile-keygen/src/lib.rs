//! Key-pair file generation.
//!
//! Writes `keypair_<epoch-millis>.json` containing
//! `{"privateKey": <JWK>, "publicKey": <JWK>}`, both tagged with `alg`. The
//! file is the input of `NileConfig::from_key_file`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use nile_core::Environment;
use nile_crypto::{CryptoError, KeyPair, SignatureAlgorithm};
use thiserror::Error;

/// Errors while generating or writing a key pair.
#[derive(Error, Debug)]
pub enum KeygenError {
    /// Key generation or serialization failed
    #[error("key generation failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Output file could not be written
    #[error("writing {path}: {source}")]
    Io {
        /// Target file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// File name for a key pair generated at `millis`.
pub fn key_file_name(millis: u64) -> String {
    format!("keypair_{millis}.json")
}

/// Generate a key pair for `algorithm` and write it under `out_dir`.
///
/// Returns the path of the new file.
pub fn write_key_pair(
    algorithm: SignatureAlgorithm,
    out_dir: &Path,
    env: &impl Environment,
) -> Result<PathBuf, KeygenError> {
    let pair = KeyPair::generate(algorithm, |buf: &mut [u8]| env.random_bytes(buf))?;
    let path = out_dir.join(key_file_name(env.wall_clock_millis()));

    std::fs::write(&path, pair.to_json()?)
        .map_err(|source| KeygenError::Io { path: path.clone(), source })?;

    tracing::info!(%algorithm, path = %path.display(), "key pair written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use nile_core::{NileConfig, SystemEnv};

    use super::*;

    #[test]
    fn written_file_loads_as_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_key_pair(SignatureAlgorithm::Es384, dir.path(), &SystemEnv::new()).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("keypair_") && name.ends_with(".json"));

        let config = NileConfig::from_key_file("T", &path).unwrap();
        assert_eq!(config.key_pair.private_key.alg.as_deref(), Some("ES384"));
        assert_eq!(config.key_pair.public_key.alg.as_deref(), Some("ES384"));
        assert!(config.key_pair.private_key.is_private());
        assert!(!config.key_pair.public_key.is_private());
    }

    #[test]
    fn file_uses_camel_case_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_key_pair(SignatureAlgorithm::Es256, dir.path(), &SystemEnv::new()).unwrap();

        let json = std::fs::read_to_string(path).unwrap();
        assert!(json.contains("\"privateKey\""));
        assert!(json.contains("\"publicKey\""));
        assert!(json.contains("\"P-256\""));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let result = write_key_pair(SignatureAlgorithm::Es256, &missing, &SystemEnv::new());
        assert!(matches!(result, Err(KeygenError::Io { .. })));
    }

    #[test]
    fn file_name_format() {
        assert_eq!(key_file_name(1_700_000_000_123), "keypair_1700000000123.json");
    }
}
