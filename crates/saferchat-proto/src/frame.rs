//! Frame codec.
//!
//! Encodes outbound client frames and decodes inbound relay frames. Decoding
//! always goes through the same three steps: size check, JSON object parse,
//! `type` tag lookup against the known set. Only then is the object handed to
//! serde for the typed payload, so an unknown tag is reported as
//! [`ProtocolError::UnknownType`] rather than as a generic shape error.

use serde_json::{Map, Value};

use crate::{
    errors::{ProtocolError, Result},
    payloads::{ClientCommand, RelayEvent},
};

/// Largest frame accepted by the decoder, in bytes.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Keepalive encoding: an empty object with no `type` tag.
const KEEPALIVE: &str = "{}";

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A typed command.
    Command(ClientCommand),
    /// Liveness signal with no semantic payload.
    Keepalive,
}

impl Frame {
    /// Serialize to the JSON wire format.
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::Command(command) => Ok(serde_json::to_string(command)?),
            Self::Keepalive => Ok(KEEPALIVE.to_string()),
        }
    }

    /// Parse a client frame. Used by the relay side.
    ///
    /// An object with no `type` tag is a keepalive, whatever else it holds.
    pub fn decode(text: &str) -> Result<Self> {
        let object = parse_object(text)?;
        match type_tag(&object)? {
            None => Ok(Self::Keepalive),
            Some(tag) if ClientCommand::is_known_kind(tag) => {
                Ok(Self::Command(serde_json::from_value(Value::Object(object))?))
            },
            Some(tag) => Err(ProtocolError::UnknownType(tag.to_string())),
        }
    }

    /// Wire tag for logging. Keepalives have none on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(command) => command.kind(),
            Self::Keepalive => "keepalive",
        }
    }
}

impl From<ClientCommand> for Frame {
    fn from(command: ClientCommand) -> Self {
        Self::Command(command)
    }
}

impl RelayEvent {
    /// Parse a relay frame.
    pub fn decode(text: &str) -> Result<Self> {
        let object = parse_object(text)?;
        match type_tag(&object)? {
            None => Err(ProtocolError::MissingType),
            Some(tag) if Self::is_known_kind(tag) => {
                Ok(serde_json::from_value(Value::Object(object))?)
            },
            Some(tag) => Err(ProtocolError::UnknownType(tag.to_string())),
        }
    }

    /// Serialize to the JSON wire format. Used by the relay side.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: text.len(), max: MAX_FRAME_SIZE });
    }
    Ok(serde_json::from_str(text)?)
}

fn type_tag(object: &Map<String, Value>) -> Result<Option<&str>> {
    match object.get("type") {
        None => Ok(None),
        Some(Value::String(tag)) => Ok(Some(tag)),
        Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{PeerInfo, PeerRef};

    #[test]
    fn join_channel_wire_shape() {
        let frame = Frame::Command(ClientCommand::JoinChannel {
            channel: "lobby".into(),
            secret: "abc123".into(),
            name: PeerInfo { name: "alice".into(), key: "S0VZ".into() },
        });

        insta::assert_snapshot!(
            frame.encode().unwrap(),
            @r#"{"type":"joinChannel","data":{"channel":"lobby","secret":"abc123","name":{"name":"alice","key":"S0VZ"}}}"#
        );
    }

    #[test]
    fn send_message_wire_shape() {
        let frame =
            Frame::from(ClientCommand::SendMessage { to: "bob".into(), message: "Y2lw".into() });

        insta::assert_snapshot!(
            frame.encode().unwrap(),
            @r#"{"type":"sendMessage","data":{"to":"bob","message":"Y2lw"}}"#
        );
    }

    #[test]
    fn leave_channel_wire_shape() {
        let frame = Frame::from(ClientCommand::LeaveChannel {});
        insta::assert_snapshot!(frame.encode().unwrap(), @r#"{"type":"leftChannel","data":{}}"#);
    }

    #[test]
    fn keepalive_is_untyped_empty_object() {
        assert_eq!(Frame::Keepalive.encode().unwrap(), "{}");
        assert_eq!(Frame::decode("{}").unwrap(), Frame::Keepalive);
    }

    #[test]
    fn leave_channel_alias_accepted() {
        let frame = Frame::decode(r#"{"type":"leaveChannel","data":{}}"#).unwrap();
        assert_eq!(frame, Frame::Command(ClientCommand::LeaveChannel {}));
    }

    #[test]
    fn decode_channel_joined() {
        let text = r#"{"type":"channelJoined","data":{"peers":[{"name":"bob","key":"AAAA"}]}}"#;
        let event = RelayEvent::decode(text).unwrap();
        assert_eq!(
            event,
            RelayEvent::ChannelJoined {
                peers: vec![PeerInfo { name: "bob".into(), key: "AAAA".into() }]
            }
        );
    }

    #[test]
    fn decode_message_received() {
        let text = r#"{"type":"messageReceived","data":{"from":{"name":"bob"},"message":"Y2lw"}}"#;
        let event = RelayEvent::decode(text).unwrap();
        assert_eq!(
            event,
            RelayEvent::MessageReceived { from: PeerRef { name: "bob".into() }, message: "Y2lw".into() }
        );
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let result = RelayEvent::decode(r#"{"type":"renameChannel","data":{}}"#);
        assert!(matches!(result, Err(ProtocolError::UnknownType(tag)) if tag == "renameChannel"));
    }

    #[test]
    fn decode_rejects_untyped_relay_frame() {
        assert!(matches!(RelayEvent::decode("{}"), Err(ProtocolError::MissingType)));
    }

    #[test]
    fn decode_rejects_non_string_tag() {
        assert!(matches!(
            RelayEvent::decode(r#"{"type":7,"data":{}}"#),
            Err(ProtocolError::UnknownType(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let result = RelayEvent::decode(r#"{"type":"peerJoined","data":{"who":{"name":"bob"}}}"#);
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let text = format!(r#"{{"type":"commandRejected","data":{{"reason":"{}"}}}}"#, "x".repeat(MAX_FRAME_SIZE));
        assert!(matches!(RelayEvent::decode(&text), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn decode_rejects_non_object() {
        assert!(matches!(RelayEvent::decode("[1,2]"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Frame::decode("null"), Err(ProtocolError::Malformed(_))));
    }
}
