//! Environment abstraction: time, sleeping and randomness.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use rand::{CryptoRng, RngCore, rngs::OsRng};

/// Source of time and randomness for state machines and runtimes.
///
/// Production uses [`SystemEnv`]. Simulation supplies a seeded RNG so runs
/// are reproducible.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with cryptographically secure random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }
}

/// Production environment: tokio clock and OS randomness.
///
/// Time is read through tokio so that a paused test runtime also pauses the
/// session's notion of time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }
}

/// Adapts an [`Environment`] into an RNG for the crypto layer.
///
/// Marked [`CryptoRng`]: every `Environment` must draw from a CSPRNG, seeded
/// or not.
#[derive(Debug)]
pub struct EnvRng<'a, E> {
    env: &'a E,
}

impl<'a, E: Environment> EnvRng<'a, E> {
    /// Borrow `env` as an RNG.
    pub fn new(env: &'a E) -> Self {
        Self { env }
    }
}

impl<E: Environment> RngCore for EnvRng<'_, E> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.env.random_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        self.env.random_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.env.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.env.random_bytes(dest);
        Ok(())
    }
}

impl<E: Environment> CryptoRng for EnvRng<'_, E> {}
