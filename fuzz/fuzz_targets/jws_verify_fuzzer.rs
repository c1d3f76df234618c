//! Fuzz target for compact JWS verification
//!
//! # Strategy
//!
//! - Arbitrary token text
//! - Valid tokens with one byte replaced
//! - Every curve
//!
//! # Invariants
//!
//! - `verify` and `unverified_payload` never panic
//! - An unmodified token always verifies and yields its payload
//! - A modified token never verifies to a different payload

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nile_crypto::{jws, KeyHandle, KeyPair, SignatureAlgorithm};

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(String),
    Mutated { alg: u8, seed: [u8; 32], payload: Vec<u8>, position: usize, byte: u8 },
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
            let _ = jws::unverified_payload(&token);
            let pair = KeyPair::generate(SignatureAlgorithm::Es256, seeded_fill([7; 32]));
            if let Ok(pair) = pair {
                if let Ok(key) = KeyHandle::parse(&pair.public_key) {
                    let _ = jws::verify(&token, &key);
                }
            }
        },
        Input::Mutated { alg, seed, payload, position, byte } => {
            let algorithm =
                SignatureAlgorithm::ALL[usize::from(alg) % SignatureAlgorithm::ALL.len()];
            let Ok(pair) = KeyPair::generate(algorithm, seeded_fill(seed)) else { return };
            let private = KeyHandle::parse(&pair.private_key).expect("generated key parses");
            let public = KeyHandle::parse(&pair.public_key).expect("generated key parses");

            let token = jws::sign(&payload, &private).expect("signing succeeds");
            let verified = jws::verify(&token, &public).expect("fresh token verifies");
            assert_eq!(verified.payload, payload);

            let mut bytes = token.into_bytes();
            let index = position % bytes.len();
            bytes[index] = byte;
            if let Ok(mutated) = String::from_utf8(bytes) {
                if let Ok(verified) = jws::verify(&mutated, &public) {
                    assert_eq!(verified.payload, payload, "forged payload verified");
                }
            }
        },
    }
});
