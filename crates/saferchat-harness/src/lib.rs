//! Deterministic simulation harness for saferchat.
//!
//! In-memory implementations of the Environment and Transport traits, plus a
//! relay that enforces the same admission and routing rules as the real one.
//! Combined with tokio's paused clock, whole sessions (keepalives,
//! reconnects, multi-client conversations) run instantly and reproducibly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod scripted_driver;
pub mod sim_env;
pub mod sim_relay;
pub mod sim_transport;

pub use fixtures::engine;
pub use scripted_driver::{DriverHandle, ScriptedDriver};
pub use sim_env::SimEnv;
pub use sim_relay::{RelayStats, SimRelay};
pub use sim_transport::{SimConnection, SimTransport};
