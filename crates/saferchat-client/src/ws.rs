//! WebSocket transport.
//!
//! Carries each frame as one WebSocket text message. Control messages (ping,
//! pong) are handled by tungstenite and never reach the session.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use saferchat_core::{Transport, TransportConnection, TransportError, TransportEvent};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::debug;

/// Transport that dials `ws://` relay URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Create a WebSocket transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self, endpoint: &str) -> Result<WsConnection, TransportError> {
        let (stream, response) =
            connect_async(endpoint).await.map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(endpoint, status = %response.status(), "websocket handshake complete");
        Ok(WsConnection { stream })
    }
}

/// One open WebSocket connection.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await.map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::FrameReceived(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return TransportEvent::FrameReceived(text),
                    Err(_) => debug!("dropping non-UTF-8 binary message"),
                },
                Some(Ok(Message::Close(_))) | None => return TransportEvent::Closed,
                Some(Ok(_)) => {},
                Some(Err(e)) => return TransportEvent::Error(TransportError::Receive(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}
