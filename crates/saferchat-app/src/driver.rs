//! Driver trait for abstracting user I/O.
//!
//! The [`Driver`] trait decouples the runtime from a specific frontend. Each
//! frontend implements it to read user requests and present notices, while
//! the generic [`crate::Runtime`] handles all orchestration.

use std::future::Future;

use saferchat_client::{Notice, SessionError};

use crate::AppAction;

/// Abstracts user I/O for the runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`crate::Runtime`] handles orchestration logic. This ensures the same
/// orchestration code runs in the terminal client and in simulation.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next user request.
    ///
    /// Returns `None` once input is exhausted, which stops the runtime. Must
    /// be cancel-safe: the runtime races it against relay frames and timers.
    fn next_action(
        &mut self,
    ) -> impl Future<Output = Result<Option<AppAction>, Self::Error>> + Send;

    /// Present a notice from the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the frontend can no longer display output.
    fn publish(&mut self, notice: Notice) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Tell the user a request was refused locally, for example a message
    /// that is too long or a send outside a channel.
    fn report(
        &mut self,
        error: &SessionError,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
