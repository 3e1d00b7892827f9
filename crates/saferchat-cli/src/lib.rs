//! Terminal client for saferchat
//!
//! A thin shell over [`saferchat_app::Driver`] that reads slash commands from
//! standard input and prints session notices as lines. All orchestration
//! logic lives in the generic [`saferchat_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod render;
pub mod terminal;

pub use commands::Command;
pub use saferchat_app::{AppAction, Driver, Runtime};
pub use terminal::{TerminalDriver, TerminalError};
