//! Crypto error types.

use thiserror::Error;

/// Errors from key handling and message encryption.
///
/// Only [`CryptoError::CryptoUnavailable`] is fatal to a session. The others
/// concern a single peer or a single message and are skipped by callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key generation could not be performed.
    #[error("cryptographic provider unavailable: {0}")]
    CryptoUnavailable(String),

    /// A peer-supplied public key is not valid base64 SPKI for RSA-OAEP of
    /// sufficient strength.
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    /// Plaintext does not fit in a single OAEP block for this recipient.
    /// Checked before any encryption is attempted.
    #[error("plaintext too large: {len} bytes (max {max})")]
    PlaintextTooLarge {
        /// UTF-8 length of the rejected plaintext.
        len: usize,
        /// Capacity of the recipient key.
        max: usize,
    },

    /// The encryption backend failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Ciphertext is malformed, not addressed to our key, or not UTF-8.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
}

impl CryptoError {
    /// Whether the error only affects one peer or message.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::CryptoUnavailable(_))
    }
}
