//! Typed frame payloads.
//!
//! - [`command`]: frames sent by a client to the relay
//! - [`event`]: frames pushed by the relay to a client

pub mod command;
pub mod event;

use serde::{Deserialize, Serialize};

pub use command::ClientCommand;
pub use event::RelayEvent;

/// A participant as advertised on the wire: display name plus the base64
/// SPKI encoding of their public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Display name, unique within the channel.
    pub name: String,
    /// Base64 text encoding of the participant's public key.
    pub key: String,
}

/// A participant referenced by name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    /// Display name.
    pub name: String,
}
