//! Session keypair and the encryption boundary.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey, rand_core::CryptoRngCore};
use sha2::Sha256;

use crate::{
    digest,
    error::CryptoError,
    keys::{MIN_KEY_BITS, PortableKey, PublicKeyHandle},
};

/// The session's RSA-OAEP keypair.
///
/// The private half has no accessor. `RsaPrivateKey` zeroizes its limbs on
/// drop.
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
    public: PublicKeyHandle,
    portable: PortableKey,
}

impl KeyPair {
    /// Generate a fresh 2048-bit keypair.
    ///
    /// # Errors
    ///
    /// [`CryptoError::CryptoUnavailable`] if key generation or export fails.
    pub fn generate<R>(rng: &mut R) -> Result<Self, CryptoError>
    where
        R: CryptoRngCore + ?Sized,
    {
        let private = RsaPrivateKey::new(rng, MIN_KEY_BITS)
            .map_err(|e| CryptoError::CryptoUnavailable(format!("key generation: {e}")))?;
        let public_key = RsaPublicKey::from(&private);
        let portable = PortableKey::export(&public_key)?;
        let public = PublicKeyHandle::from_portable(public_key, &portable);

        Ok(Self { private, public, portable })
    }

    /// Canonical export of the public half.
    pub fn export_public(&self) -> &PortableKey {
        &self.portable
    }

    /// Public half as a recipient handle.
    pub fn public(&self) -> &PublicKeyHandle {
        &self.public
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("fingerprint", &self.portable.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Owner of the session keypair and the only place plaintext is produced
/// from ciphertext.
///
/// Created once per session. Every operation that needs randomness takes the
/// RNG as a parameter.
#[derive(Debug, Clone)]
pub struct CryptoEngine {
    keys: KeyPair,
}

impl CryptoEngine {
    /// Generate the session keypair.
    ///
    /// # Errors
    ///
    /// [`CryptoError::CryptoUnavailable`]; fatal to the session.
    pub fn generate<R>(rng: &mut R) -> Result<Self, CryptoError>
    where
        R: CryptoRngCore + ?Sized,
    {
        Ok(Self { keys: KeyPair::generate(rng)? })
    }

    /// Public key to advertise to peers.
    pub fn export_public_key(&self) -> &PortableKey {
        self.keys.export_public()
    }

    /// Own public key as a recipient handle.
    pub fn public_key(&self) -> &PublicKeyHandle {
        self.keys.public()
    }

    /// Decode a peer's base64 public key.
    ///
    /// # Errors
    ///
    /// [`CryptoError::MalformedKey`]; the peer must not be added to a roster.
    pub fn import_public_key(text: &str) -> Result<PublicKeyHandle, CryptoError> {
        PublicKeyHandle::import(text)
    }

    /// Encrypt `plaintext` for `recipient`.
    ///
    /// Non-deterministic: two calls with the same input yield different
    /// ciphertexts.
    pub fn encrypt<R>(
        &self,
        rng: &mut R,
        plaintext: &str,
        recipient: &PublicKeyHandle,
    ) -> Result<String, CryptoError>
    where
        R: CryptoRngCore,
    {
        recipient.encrypt(rng, plaintext)
    }

    /// Decrypt base64 ciphertext addressed to this session's key.
    ///
    /// # Errors
    ///
    /// [`CryptoError::DecryptionFailed`] if the text is not base64, the
    /// ciphertext was produced for another key or has been tampered with, or
    /// the plaintext is not UTF-8.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let bytes = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| CryptoError::DecryptionFailed(format!("base64: {e}")))?;
        let plaintext = self
            .keys
            .private
            .decrypt(Oaep::new::<Sha256>(), &bytes)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::DecryptionFailed("plaintext is not UTF-8".to_string()))
    }

    /// Hex SHA-256 of a channel secret. See [`digest::digest`].
    pub fn digest(secret: &str) -> String {
        digest::digest(secret)
    }

    /// Largest plaintext this session's own key can carry. Used as the
    /// message limit when no recipient is present.
    pub fn max_plaintext_len(&self) -> usize {
        self.keys.public().max_plaintext_len()
    }
}
