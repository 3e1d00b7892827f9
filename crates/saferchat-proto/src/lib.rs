//! Wire format for the saferchat relay protocol.
//!
//! Every frame is a single JSON object of the shape `{ "type": ..., "data": ... }`
//! exchanged over a persistent duplex connection. The relay never looks inside
//! message payloads: ciphertext travels as opaque base64 text, and the channel
//! secret is only ever sent as its digest.
//!
//! Frames are decoded exactly once, at the transport boundary, into closed
//! tagged unions ([`ClientCommand`] for client to relay, [`RelayEvent`] for
//! relay to client). Nothing downstream re-interprets raw JSON.
//!
//! The single untyped frame is the keepalive: an empty `{}` object with no
//! `type`, modelled as [`Frame::Keepalive`].
//!
//! # Security
//!
//! Decoding enforces a 1 MiB frame limit before any JSON parsing happens, and
//! rejects unknown frame types instead of guessing at their shape.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod frame;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::{Frame, MAX_FRAME_SIZE};
pub use payloads::{ClientCommand, PeerInfo, PeerRef, RelayEvent};
