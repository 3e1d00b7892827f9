//! Shared keypairs.
//!
//! RSA key generation dominates simulation time, so tests draw session
//! keypairs from a small pool generated once per test binary.

use std::sync::OnceLock;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use saferchat_crypto::CryptoEngine;

const POOL_SIZE: usize = 4;

fn pool() -> &'static [CryptoEngine] {
    static POOL: OnceLock<Vec<CryptoEngine>> = OnceLock::new();
    POOL.get_or_init(|| {
        let mut rng = ChaCha20Rng::seed_from_u64(0x5afe_c4a7);
        (0..POOL_SIZE).filter_map(|_| CryptoEngine::generate(&mut rng).ok()).collect()
    })
}

/// Keypair number `index`, wrapping around the pool.
///
/// Distinct indices below the pool size give distinct keys.
///
/// # Panics
///
/// If key generation failed for the whole pool.
pub fn engine(index: usize) -> CryptoEngine {
    let pool = pool();
    assert!(!pool.is_empty(), "key generation unavailable");
    pool[index % pool.len()].clone()
}
