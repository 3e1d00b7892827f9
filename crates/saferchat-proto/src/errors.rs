//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds [`crate::MAX_FRAME_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the rejected frame in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Frame is not valid JSON or does not match the shape of its type.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame is a JSON object without a `type` tag where one is required.
    #[error("frame has no type tag")]
    MissingType,

    /// Frame carries a `type` tag this protocol version does not know.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
}
