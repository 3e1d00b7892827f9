//! Client to relay commands.

use serde::{Deserialize, Serialize};

use super::PeerInfo;

/// Commands a client sends to the relay.
///
/// # Protocol Flow
///
/// 1. Client sends `JoinChannel` with the digest of the channel secret
/// 2. Relay answers with `channelJoined` or `commandRejected`
/// 3. Client fans out `SendMessage`, one per recipient, each encrypted under
///    that recipient's key
/// 4. Client sends `LeaveChannel` when the user logs out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientCommand {
    /// Request admission to a channel.
    #[serde(rename = "joinChannel")]
    JoinChannel {
        /// Channel name.
        channel: String,
        /// Hex SHA-256 digest of the channel secret. The secret itself is
        /// never transmitted.
        secret: String,
        /// Local identity advertised to the other participants.
        name: PeerInfo,
    },

    /// Deliver a ciphertext to a single recipient.
    #[serde(rename = "sendMessage")]
    SendMessage {
        /// Recipient display name.
        to: String,
        /// Base64 ciphertext encrypted under the recipient's public key.
        message: String,
    },

    /// Leave the current channel.
    #[serde(rename = "leftChannel", alias = "leaveChannel")]
    LeaveChannel {},
}

impl ClientCommand {
    /// Wire `type` tag of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinChannel { .. } => "joinChannel",
            Self::SendMessage { .. } => "sendMessage",
            Self::LeaveChannel {} => "leftChannel",
        }
    }

    /// Whether `tag` names a known command type.
    pub fn is_known_kind(tag: &str) -> bool {
        matches!(tag, "joinChannel" | "sendMessage" | "leftChannel" | "leaveChannel")
    }
}
