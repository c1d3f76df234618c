//! Fuzz target for compact JWE decryption
//!
//! # Strategy
//!
//! - Arbitrary token text against a fixed recipient
//! - Valid tokens for every content encryption with one byte replaced
//!
//! # Invariants
//!
//! - `decrypt` never panics
//! - An unmodified token always decrypts to its plaintext
//! - A modified token never decrypts to a different plaintext

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nile_crypto::{jwe, ContentEncryption, KeyHandle, KeyPair, SignatureAlgorithm};

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(String),
    Mutated { enc: u8, seed: [u8; 32], plaintext: Vec<u8>, position: usize, byte: u8 },
}

fn seeded_fill(seed: [u8; 32]) -> impl FnMut(&mut [u8]) {
    let mut counter = 0u8;
    move |buf: &mut [u8]| {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = seed[i % seed.len()] ^ counter;
        }
        counter = counter.wrapping_add(1);
    }
}

fuzz_target!(|input: Input| {
    match input {
        Input::Raw(token) => {
            let Ok(pair) = KeyPair::generate(SignatureAlgorithm::Es256, seeded_fill([3; 32])) else {
                return;
            };
            if let Ok(key) = KeyHandle::parse(&pair.private_key) {
                let _ = jwe::decrypt(&token, &key);
            }
        },
        Input::Mutated { enc, seed, plaintext, position, byte } => {
            let enc = ContentEncryption::ALL[usize::from(enc) % ContentEncryption::ALL.len()];
            let Ok(pair) = KeyPair::generate(SignatureAlgorithm::Es256, seeded_fill(seed)) else {
                return;
            };
            let private = KeyHandle::parse(&pair.private_key).expect("generated key parses");
            let public = KeyHandle::parse(&pair.public_key).expect("generated key parses");

            let Ok(token) = jwe::encrypt(&plaintext, &public, enc, seeded_fill(seed)) else {
                return;
            };
            let decrypted = jwe::decrypt(&token, &private).expect("fresh token decrypts");
            assert_eq!(decrypted.plaintext, plaintext);

            let mut bytes = token.into_bytes();
            let index = position % bytes.len();
            bytes[index] = byte;
            if let Ok(mutated) = String::from_utf8(bytes) {
                if let Ok(decrypted) = jwe::decrypt(&mutated, &private) {
                    assert_eq!(decrypted.plaintext, plaintext, "forged plaintext accepted");
                }
            }
        },
    }
});
