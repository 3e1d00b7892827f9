//! saferchat session layer
//!
//! The protocol brain of a chat client: an action-based state machine that
//! turns user requests and relay frames into outbound frames and UI notices.
//!
//! # Architecture
//!
//! [`Session`] is pure. It never touches the network or the clock directly;
//! time and randomness come from an [`saferchat_core::Environment`], and
//! every transition returns [`SessionAction`]s for a runtime to execute. The
//! same session runs unchanged against a WebSocket relay and against the
//! in-memory relay used in simulation.
//!
//! # Components
//!
//! - [`Session`]: Join, admission, roster, messaging, keepalive, reconnect
//! - [`Roster`]: Peers keyed by name with locally assigned ids
//! - [`MessageLog`]: Ordered, append-only log of presence and text entries
//! - [`Notice`]: Domain events for the UI
//! - `WsTransport`: WebSocket transport (feature `transport`)

pub mod action;
pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod roster;
pub mod session;
#[cfg(test)]
mod testing;
#[cfg(feature = "transport")]
pub mod ws;

pub use action::{Notice, SessionAction};
pub use config::SessionConfig;
pub use error::SessionError;
pub use event::{JoinRequest, SessionEvent};
pub use log::{EntryKind, LogEntry, MessageLog, Sender};
pub use roster::{LOCAL_PEER_ID, Peer, PeerSummary, Roster};
pub use session::{Session, SessionState};
#[cfg(feature = "transport")]
pub use ws::{WsConnection, WsTransport};
