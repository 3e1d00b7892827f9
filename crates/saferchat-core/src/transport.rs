//! Transport abstraction for a persistent duplex text connection.
//!
//! Abstracts over transports that carry discrete text frames in both
//! directions (like WebSocket). Production uses tokio-tungstenite, tests use
//! an in-memory relay.

use async_trait::async_trait;
use saferchat_proto::Frame;
use tracing::{debug, info};

use crate::error::TransportError;

/// Factory for connections to a relay endpoint.
///
/// The transport never retries; reconnection policy belongs to the session.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Type representing one live connection.
    type Connection: TransportConnection;

    /// Connect to a remote endpoint.
    ///
    /// Resolves once the connection is open and ready to carry frames.
    async fn connect(&self, endpoint: &str) -> Result<Self::Connection, TransportError>;
}

/// Events observed on the inbound side of a connection.
///
/// `Error` and `Closed` are terminal: no frame follows either of them on the
/// same connection.
#[derive(Debug)]
pub enum TransportEvent {
    /// One raw text frame, in network order.
    FrameReceived(String),
    /// The connection failed.
    Error(TransportError),
    /// The connection was closed.
    Closed,
}

/// A single open duplex connection.
#[async_trait]
pub trait TransportConnection: Send + 'static {
    /// Write one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next inbound event.
    ///
    /// Must be cancel-safe: a runtime races this against timers and user
    /// input, and dropping the future must not lose a frame.
    async fn recv(&mut self) -> TransportEvent;

    /// Close the connection, releasing all of its resources.
    async fn close(&mut self);
}

/// The session's one and only connection slot.
///
/// Wraps a [`Transport`] and holds at most one open connection. `connect` is
/// idempotent, and because every operation takes `&mut self` two connects
/// can never race to open two connections.
pub struct Link<T: Transport> {
    transport: T,
    endpoint: String,
    connection: Option<T::Connection>,
}

impl<T: Transport> Link<T> {
    /// Create a link with no open connection.
    pub fn new(transport: T, endpoint: impl Into<String>) -> Self {
        Self { transport, endpoint: endpoint.into(), connection: None }
    }

    /// Relay endpoint this link connects to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a connection is currently open.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Open a connection unless one is already open.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            debug!(endpoint = %self.endpoint, "connect: reusing open connection");
            return Ok(());
        }

        let connection = self.transport.connect(&self.endpoint).await?;
        info!(endpoint = %self.endpoint, "connection opened");
        self.connection = Some(connection);
        Ok(())
    }

    /// Encode and send `frame`.
    ///
    /// Frames sent while no connection is open are dropped. A failed write
    /// tears the connection down and returns the error.
    pub async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let Some(connection) = self.connection.as_mut() else {
            debug!(kind = frame.kind(), "dropping frame: no open connection");
            return Ok(());
        };

        let text = frame.encode()?;
        if let Err(e) = connection.send(text).await {
            self.connection = None;
            return Err(e);
        }

        debug!(kind = frame.kind(), "frame sent");
        Ok(())
    }

    /// Next inbound event.
    ///
    /// Pends forever while no connection is open. After a terminal event the
    /// connection slot is released, so the next [`Self::connect`] opens a
    /// fresh connection.
    pub async fn recv(&mut self) -> TransportEvent {
        let Some(connection) = self.connection.as_mut() else {
            return std::future::pending().await;
        };

        let event = connection.recv().await;
        if matches!(event, TransportEvent::Error(_) | TransportEvent::Closed) {
            self.connection = None;
        }
        event
    }

    /// Close the open connection, if any.
    pub async fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
            info!(endpoint = %self.endpoint, "connection closed");
        }
    }
}
