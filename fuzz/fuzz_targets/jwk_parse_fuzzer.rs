//! Fuzz target for key description parsing
//!
//! Feeds arbitrary JSON text through `KeyDescription::from_json`,
//! `KeyPair::from_json` and `KeyHandle::parse`.
//!
//! # Invariants
//!
//! - Parsing never panics
//! - A handle that parses re-describes itself with the same thumbprint

#![no_main]

use libfuzzer_sys::fuzz_target;
use nile_crypto::{KeyDescription, KeyHandle, KeyPair};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return };

    let _ = KeyPair::from_json(text);

    let Ok(description) = KeyDescription::from_json(text) else { return };
    let thumbprint = description.thumbprint();
    if let Ok(handle) = KeyHandle::parse(&description) {
        let redescribed = handle.public_description();
        assert_eq!(redescribed.thumbprint().ok(), thumbprint.ok());
    }
});
