//! Channel secret digest.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the UTF-8 bytes of `secret`.
///
/// Unsalted. The relay admits a joiner by comparing this value with the one
/// the channel was opened with, so equal secrets must give equal digests.
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
