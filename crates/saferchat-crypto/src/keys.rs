//! Public key encoding and recipient handles.
//!
//! Public keys travel as base64 of their SubjectPublicKeyInfo DER encoding,
//! the same format WebCrypto exports as `spki`.

use std::{fmt, sync::Arc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{
    Oaep, RsaPublicKey,
    pkcs8::{DecodePublicKey, EncodePublicKey},
    rand_core::CryptoRngCore,
    traits::PublicKeyParts,
};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Minimum accepted RSA modulus size in bits.
pub const MIN_KEY_BITS: usize = 2048;

/// Output length of the OAEP hash (SHA-256).
const OAEP_HASH_LEN: usize = 32;

/// Short identifier of a public key: the first 8 bytes of SHA-256 over its
/// SPKI DER encoding.
///
/// Safe to log and to show to users for out-of-band comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 8]);

impl Fingerprint {
    fn of(der: &[u8]) -> Self {
        let hash = Sha256::digest(der);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash[..8]);
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chunk) in self.0.chunks(2).enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", hex::encode(chunk))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

/// Canonical export of a public key: SPKI DER bytes and their base64 text.
#[derive(Clone, PartialEq, Eq)]
pub struct PortableKey {
    der: Vec<u8>,
    text: String,
    fingerprint: Fingerprint,
}

impl PortableKey {
    pub(crate) fn export(key: &RsaPublicKey) -> Result<Self, CryptoError> {
        let der = key
            .to_public_key_der()
            .map_err(|e| CryptoError::CryptoUnavailable(format!("spki export: {e}")))?
            .as_bytes()
            .to_vec();
        let text = STANDARD.encode(&der);
        let fingerprint = Fingerprint::of(&der);
        Ok(Self { der, text, fingerprint })
    }

    /// SPKI DER bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.der
    }

    /// Base64 text as sent on the wire.
    pub fn as_text(&self) -> &str {
        &self.text
    }

    /// Key fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl fmt::Debug for PortableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableKey").field("fingerprint", &self.fingerprint).finish()
    }
}

/// A decoded recipient key, usable for encryption only.
///
/// Cheap to clone, so callers can snapshot a recipient's key before starting
/// an encryption and stay unaffected by later roster changes.
#[derive(Clone)]
pub struct PublicKeyHandle {
    key: Arc<RsaPublicKey>,
    fingerprint: Fingerprint,
}

impl PublicKeyHandle {
    pub(crate) fn from_portable(key: RsaPublicKey, portable: &PortableKey) -> Self {
        Self { key: Arc::new(key), fingerprint: portable.fingerprint() }
    }

    /// Decode a peer-supplied base64 SPKI public key.
    ///
    /// # Errors
    ///
    /// [`CryptoError::MalformedKey`] if the text is not base64, the bytes are
    /// not an RSA SPKI structure, or the modulus is below [`MIN_KEY_BITS`].
    pub fn import(text: &str) -> Result<Self, CryptoError> {
        let der = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::MalformedKey(format!("base64: {e}")))?;
        let key = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::MalformedKey(format!("spki: {e}")))?;

        let bits = key.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::MalformedKey(format!(
                "{bits}-bit modulus below minimum of {MIN_KEY_BITS}"
            )));
        }

        Ok(Self { key: Arc::new(key), fingerprint: Fingerprint::of(&der) })
    }

    /// Largest plaintext, in bytes, that fits one OAEP block under this key.
    pub fn max_plaintext_len(&self) -> usize {
        self.key.size().saturating_sub(2 * OAEP_HASH_LEN + 2)
    }

    /// Encrypt the UTF-8 bytes of `plaintext` and return base64 ciphertext.
    ///
    /// # Errors
    ///
    /// [`CryptoError::PlaintextTooLarge`] before touching the backend if the
    /// plaintext exceeds [`Self::max_plaintext_len`];
    /// [`CryptoError::EncryptionFailed`] if the backend fails.
    pub fn encrypt<R>(&self, rng: &mut R, plaintext: &str) -> Result<String, CryptoError>
    where
        R: CryptoRngCore,
    {
        let max = self.max_plaintext_len();
        if plaintext.len() > max {
            return Err(CryptoError::PlaintextTooLarge { len: plaintext.len(), max });
        }

        let ciphertext = self
            .key
            .encrypt(rng, Oaep::new::<Sha256>(), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(STANDARD.encode(ciphertext))
    }

    /// Key fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl PartialEq for PublicKeyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PublicKeyHandle {}

impl fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyHandle").field("fingerprint", &self.fingerprint).finish()
    }
}
