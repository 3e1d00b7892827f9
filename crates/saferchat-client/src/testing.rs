//! Shared fixtures for unit tests.

use std::{
    future::Future,
    sync::{Arc, Mutex, OnceLock},
    time::{Duration, Instant},
};

use rand::{RngCore, SeedableRng, rngs::OsRng};
use rand_chacha::ChaCha20Rng;
use saferchat_core::Environment;
use saferchat_crypto::{CryptoEngine, PublicKeyHandle};

use crate::roster::Candidate;

/// Pre-generated keypairs. Key generation dominates test time, so every test
/// in the crate shares these.
pub(crate) struct Keys {
    pub alice: CryptoEngine,
    pub bob: CryptoEngine,
    pub carol: CryptoEngine,
}

pub(crate) fn keys() -> &'static Keys {
    static KEYS: OnceLock<Keys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = ChaCha20Rng::seed_from_u64(0xc0ffee);
        Keys {
            alice: CryptoEngine::generate(&mut rng).unwrap(),
            bob: CryptoEngine::generate(&mut rng).unwrap(),
            carol: CryptoEngine::generate(&mut rng).unwrap(),
        }
    })
}

/// Wire text of an engine's public key.
pub(crate) fn wire_key(engine: &CryptoEngine) -> String {
    engine.export_public_key().as_text().to_string()
}

/// Public key as a peer would see it after import.
pub(crate) fn handle(engine: &CryptoEngine) -> PublicKeyHandle {
    CryptoEngine::import_public_key(&wire_key(engine)).unwrap()
}

pub(crate) fn candidate(name: &str, engine: &CryptoEngine) -> Candidate {
    Candidate { name: name.to_string(), public_key: handle(engine), encoded_key: wire_key(engine) }
}

/// Environment with a hand-advanced clock. `sleep` advances it instantly.
#[derive(Clone)]
pub(crate) struct ManualEnv {
    now: Arc<Mutex<Instant>>,
}

impl ManualEnv {
    pub fn new() -> Self {
        Self { now: Arc::new(Mutex::new(Instant::now())) }
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
    }
}

impl Environment for ManualEnv {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }
}
