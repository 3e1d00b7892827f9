//! Transport and connection errors.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Failures at the transport boundary. All of them are recoverable: the
/// session marks the connection down and schedules a reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not open a connection to the relay.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the connection failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// An outbound frame could not be serialized.
    #[error("frame encoding failed: {0}")]
    Encode(#[from] saferchat_proto::ProtocolError),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the liveness state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Operation not valid in the current state.
    #[error("invalid state {state:?} for {operation}")]
    InvalidState {
        /// State at the time of the call.
        state: ConnectionState,
        /// Rejected operation.
        operation: String,
    },
}
