//! Runtime errors.

use saferchat_client::SessionError;
use thiserror::Error;

/// Reasons the runtime stopped.
#[derive(Debug, Error)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// The session hit a fatal error.
    #[error("session failed: {0}")]
    Session(#[from] SessionError),

    /// The driver failed.
    #[error("driver failed: {0}")]
    Driver(#[source] E),
}
