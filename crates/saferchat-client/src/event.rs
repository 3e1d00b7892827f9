//! Inputs to the session state machine.

use std::fmt;

use saferchat_proto::RelayEvent;

/// Parameters of a join request as typed by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Display name to announce.
    pub nickname: String,
    /// Channel to join.
    pub channel: String,
    /// Channel secret. Only its digest leaves the client.
    pub secret: String,
}

impl JoinRequest {
    /// Build a request.
    pub fn new(
        nickname: impl Into<String>,
        channel: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self { nickname: nickname.into(), channel: channel.into(), secret: secret.into() }
    }
}

impl fmt::Debug for JoinRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinRequest")
            .field("nickname", &self.nickname)
            .field("channel", &self.channel)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Events delivered to [`crate::Session::handle`], one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User asked to join a channel.
    Join(JoinRequest),

    /// User typed a chat message.
    SendText {
        /// Plaintext.
        text: String,
    },

    /// User asked to leave the channel.
    Leave,

    /// The runtime opened the connection requested by
    /// [`crate::SessionAction::Connect`].
    Connected,

    /// Raw frame from the relay, not yet decoded.
    FrameReceived {
        /// Frame text.
        text: String,
    },

    /// Decoded relay event.
    Relay(RelayEvent),

    /// Connection failed, either while opening or while open.
    TransportError {
        /// Human-readable cause.
        cause: String,
    },

    /// Connection closed by the peer.
    TransportClosed,
}

impl From<RelayEvent> for SessionEvent {
    fn from(event: RelayEvent) -> Self {
        Self::Relay(event)
    }
}
