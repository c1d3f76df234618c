//! Shared test fixtures: a deterministic environment and an instrumented
//! phonebook.

#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use nile_core::{Environment, KeyPair, Phonebook, PhonebookEntry, PhonebookError, SignatureAlgorithm};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// 2024-01-01T00:00:00Z
pub const START_MILLIS: u64 = 1_704_067_200_000;

/// Seeded RNG and a clock that only moves when told to.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock: Arc<AtomicU64>,
}

impl SimEnv {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicU64::new(START_MILLIS)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: u64) {
        self.clock.store(millis, Ordering::SeqCst);
    }

    /// 32-bit words drawn from the RNG so far.
    pub fn random_draws(&self) -> u128 {
        self.rng.lock().unwrap().get_word_pos()
    }

    pub fn key_pair(&self, algorithm: SignatureAlgorithm) -> KeyPair {
        KeyPair::generate(algorithm, |buf: &mut [u8]| self.random_bytes(buf)).unwrap()
    }
}

impl Environment for SimEnv {
    fn wall_clock_millis(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap().fill_bytes(buffer);
    }
}

/// What the next `register` calls should do instead of delegating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Return `Ok(false)` without delegating
    Reject,
    /// Return `Err(Unavailable)` without delegating
    Unavailable,
}

/// Wraps a phonebook, counting registrations and injecting faults.
pub struct CountingPhonebook {
    inner: Arc<dyn Phonebook>,
    registrations: AtomicUsize,
    faults: Mutex<Vec<Fault>>,
    register_delay: Duration,
}

impl CountingPhonebook {
    pub fn new(inner: Arc<dyn Phonebook>) -> Self {
        Self {
            inner,
            registrations: AtomicUsize::new(0),
            faults: Mutex::new(Vec::new()),
            register_delay: Duration::ZERO,
        }
    }

    /// Hold each registration open for `delay` so concurrent callers overlap.
    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    /// Queue a fault for the next registration.
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().unwrap().push(fault);
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Phonebook for CountingPhonebook {
    async fn register(&self, id: &str, announcement: &str) -> Result<bool, PhonebookError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if !self.register_delay.is_zero() {
            tokio::time::sleep(self.register_delay).await;
        }

        let fault = {
            let mut faults = self.faults.lock().unwrap();
            if faults.is_empty() { None } else { Some(faults.remove(0)) }
        };
        match fault {
            Some(Fault::Reject) => Ok(false),
            Some(Fault::Unavailable) => {
                Err(PhonebookError::Unavailable { reason: "injected outage".to_string() })
            },
            None => self.inner.register(id, announcement).await,
        }
    }

    async fn get(&self, id: &str) -> Result<Option<PhonebookEntry>, PhonebookError> {
        self.inner.get(id).await
    }
}
