//! Relay to client events.

use serde::{Deserialize, Serialize};

use super::{PeerInfo, PeerRef};

/// Events pushed by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum RelayEvent {
    /// Admission succeeded. Carries the complete roster at join time, which
    /// the client treats as a resynchronization point.
    ChannelJoined {
        /// Participants already in the channel (excluding the joiner).
        peers: Vec<PeerInfo>,
    },

    /// A participant joined after our admission.
    PeerJoined {
        /// The new participant.
        who: PeerInfo,
    },

    /// A ciphertext addressed to this client.
    MessageReceived {
        /// Sender as named by the relay.
        from: PeerRef,
        /// Base64 ciphertext under our public key.
        message: String,
    },

    /// A participant left the channel.
    PeerLeft {
        /// The departed participant.
        who: PeerRef,
    },

    /// The last command was refused (wrong secret digest, name taken, ...).
    CommandRejected {
        /// Human-readable reason.
        reason: String,
    },
}

impl RelayEvent {
    /// Wire `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelJoined { .. } => "channelJoined",
            Self::PeerJoined { .. } => "peerJoined",
            Self::MessageReceived { .. } => "messageReceived",
            Self::PeerLeft { .. } => "peerLeft",
            Self::CommandRejected { .. } => "commandRejected",
        }
    }

    /// Whether `tag` names a known event type.
    pub fn is_known_kind(tag: &str) -> bool {
        matches!(
            tag,
            "channelJoined" | "peerJoined" | "messageReceived" | "peerLeft" | "commandRejected"
        )
    }
}
