//! In-memory transport backed by a [`SimRelay`].

use async_trait::async_trait;
use saferchat_core::{Transport, TransportConnection, TransportError, TransportEvent};
use tokio::sync::mpsc;
use tracing::debug;

use crate::sim_relay::{ConnectionId, SimRelay};

/// Transport whose connections all lead to one [`SimRelay`]. The endpoint
/// string is ignored.
#[derive(Clone)]
pub struct SimTransport {
    relay: SimRelay,
}

impl SimTransport {
    /// Transport connecting to `relay`.
    pub fn new(relay: &SimRelay) -> Self {
        Self { relay: relay.clone() }
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Connection = SimConnection;

    async fn connect(&self, endpoint: &str) -> Result<SimConnection, TransportError> {
        let (id, inbound) = self.relay.attach()?;
        debug!(endpoint, connection = id, "simulated connection open");
        Ok(SimConnection { id, relay: self.relay.clone(), inbound, closed: false })
    }
}

/// One simulated connection.
pub struct SimConnection {
    id: ConnectionId,
    relay: SimRelay,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    closed: bool,
}

impl SimConnection {
    /// Relay-side id of this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

#[async_trait]
impl TransportConnection for SimConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.relay.receive(self.id, &text)
    }

    async fn recv(&mut self) -> TransportEvent {
        self.inbound.recv().await.unwrap_or(TransportEvent::Closed)
    }

    async fn close(&mut self) {
        if !std::mem::replace(&mut self.closed, true) {
            self.relay.detach(self.id);
        }
    }
}

impl Drop for SimConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.relay.detach(self.id);
        }
    }
}
