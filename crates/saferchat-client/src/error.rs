//! Session error types.

use saferchat_core::ConnectionError;
use saferchat_crypto::CryptoError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors returned by [`crate::Session`].
///
/// Faults caused by peers or the network (bad keys, undecryptable messages,
/// dropped connections) are absorbed by the session and never surface here.
/// These are the caller's errors, plus the fatal crypto failure at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Crypto failure. Only `CryptoUnavailable` reaches the caller, from
    /// session construction.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Liveness state machine rejected a transition.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Operation requires an admitted channel.
    #[error("not joined to a channel")]
    NotJoined,

    /// The channel is being resumed after a dropped connection; text is
    /// refused rather than sent into a dead link.
    #[error("connection lost, message not sent (reconnecting)")]
    Reconnecting,

    /// Operation not valid in the current state.
    #[error("invalid state {state:?} for {operation}")]
    InvalidState {
        /// State at the time of the call.
        state: SessionState,
        /// Rejected operation.
        operation: &'static str,
    },

    /// Join parameters are unusable.
    #[error("invalid join request: {0}")]
    InvalidJoin(String),

    /// Message exceeds what a single encryption can carry for every current
    /// recipient.
    #[error("message too long: {len} bytes (max {max})")]
    MessageTooLong {
        /// UTF-8 length of the message.
        len: usize,
        /// Smallest recipient capacity.
        max: usize,
    },
}

impl SessionError {
    /// Whether the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::CryptoUnavailable(_)))
    }
}
