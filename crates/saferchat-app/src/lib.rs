//! Application layer for saferchat
//!
//! A generic runtime that drives a [`saferchat_client::Session`] against a
//! [`saferchat_core::Transport`] and a user-facing [`Driver`]. The same loop
//! runs in the terminal client and in simulation.
//!
//! # Components
//!
//! - [`AppAction`]: Requests coming from the user
//! - [`Driver`]: Trait for platform-specific user I/O
//! - [`Runtime`]: Orchestration loop executing session actions

mod action;
mod driver;
mod error;
mod runtime;

pub use action::AppAction;
pub use driver::Driver;
pub use error::RuntimeError;
pub use runtime::Runtime;
