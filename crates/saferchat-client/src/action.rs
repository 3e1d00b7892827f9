//! Outputs of the session state machine.

use saferchat_proto::Frame;

use crate::{log::LogEntry, roster::PeerSummary};

/// Actions for the runtime to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a connection to the relay. Never emitted while one is open or
    /// being opened.
    Connect,

    /// Send a frame on the open connection.
    Send(Frame),

    /// Hand a domain notice to the UI.
    Publish(Notice),
}

/// Domain events for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A new log entry was appended.
    Entry(LogEntry),

    /// The roster changed. Carries the complete current roster.
    Roster(Vec<PeerSummary>),

    /// The relay admitted us.
    Joined {
        /// Channel name.
        channel: String,
        /// Admission restored membership after a reconnect.
        resumed: bool,
    },

    /// The relay refused the last command.
    Rejected {
        /// Reason given by the relay.
        reason: String,
    },

    /// The relay became unreachable. A reconnect is scheduled.
    ConnectionLost {
        /// Human-readable cause.
        cause: String,
    },

    /// The connection is back after a loss.
    ConnectionRestored,

    /// We left the channel.
    Left {
        /// Channel name.
        channel: String,
    },
}
