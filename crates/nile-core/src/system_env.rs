//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` reads the real wall clock and draws randomness from the OS
//! (getrandom). Behavior is not reproducible; use a seeded environment in
//! tests.

use crate::env::Environment;

/// Production environment using the system clock and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux, `BCryptGenRandom` on Windows). Suitable for
/// ephemeral ECDH keys, content keys and IVs.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without working randomness no envelope can be
/// encrypted safely, so there is nothing sensible to fall back to.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_millis() as u64
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot encrypt securely");
    }
}
