//! Per-recipient message encryption for saferchat.
//!
//! Every participant holds one static RSA-OAEP (2048-bit, SHA-256) keypair for
//! the lifetime of a session and advertises the public half to the channel.
//! Outgoing text is encrypted separately under each recipient's public key, so
//! the relay only ever sees opaque ciphertext addressed to a single reader.
//!
//! The channel secret never leaves the client either: admission is checked by
//! comparing the hex SHA-256 [`digest`] of the secret.
//!
//! # Security
//!
//! The private key lives inside [`KeyPair`] and is never exposed, serialized
//! or printed; `Debug` output shows only the public key [`Fingerprint`].
//! OAEP encryption draws fresh randomness on every call, so identical
//! plaintexts never produce identical ciphertexts. There is no forward
//! secrecy: keys are static per session.
//!
//! All randomness is supplied by the caller, which keeps the engine
//! deterministic under a seeded RNG in simulation.

pub mod digest;
pub mod engine;
pub mod error;
pub mod keys;

pub use digest::digest;
pub use engine::{CryptoEngine, KeyPair};
pub use error::CryptoError;
pub use keys::{Fingerprint, MIN_KEY_BITS, PortableKey, PublicKeyHandle};
pub use rsa::rand_core::CryptoRngCore;
