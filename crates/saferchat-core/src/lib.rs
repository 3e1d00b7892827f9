//! saferchat core abstractions
//!
//! Everything a session needs from the outside world, expressed as traits
//! and pure state machines so the same protocol code runs against a real
//! WebSocket relay in production and an in-memory relay under virtual time in
//! tests.
//!
//! # Architecture
//!
//! State machines in this workspace never read the clock, draw randomness or
//! touch a socket on their own. Time and randomness come from an
//! [`Environment`], bytes move through a [`Transport`], and state transitions
//! return declarative actions that a runtime executes.
//!
//! # Components
//!
//! - [`connection`]: Liveness state machine (keepalive and reconnect deadlines)
//! - [`mod@env`]: Environment abstraction (time, sleep, RNG)
//! - [`transport`]: Transport abstraction and the single-connection [`Link`]
//! - [`error`]: Transport and connection error types

pub mod connection;
pub mod env;
pub mod error;
pub mod transport;

pub use connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState};
pub use env::{EnvRng, Environment, SystemEnv};
pub use error::{ConnectionError, TransportError};
pub use transport::{Link, Transport, TransportConnection, TransportEvent};
