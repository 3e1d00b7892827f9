//! User actions
//!
//! Requests produced by a frontend for the runtime to execute.

use saferchat_client::JoinRequest;

/// Requests produced by a [`crate::Driver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Join a channel.
    Join(JoinRequest),

    /// Send a chat message to the channel.
    SendMessage {
        /// Plaintext.
        text: String,
    },

    /// Leave the channel.
    Leave,

    /// Quit the application.
    Quit,
}
