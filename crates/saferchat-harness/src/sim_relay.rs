//! In-memory relay.
//!
//! Implements the relay side of the protocol: channels are created by their
//! first joiner and guarded by the secret digest that joiner presented, names
//! are unique per channel, and messages are routed to exactly one addressee.
//! Every connection gets an id; frames a client sends are processed
//! synchronously under one lock, so event order is deterministic.
//!
//! Faults are injected from the test: refuse the next connection attempts,
//! or reset a client's connection as if the network dropped it.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use saferchat_core::{TransportError, TransportEvent};
use saferchat_proto::{ClientCommand, Frame, PeerInfo, PeerRef, RelayEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Id of one relay connection.
pub type ConnectionId = u64;

/// Counters for assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Connections accepted.
    pub connections: usize,
    /// Connection attempts refused by fault injection.
    pub refused: usize,
    /// Keepalive frames received.
    pub keepalives: usize,
    /// `joinChannel` commands received.
    pub joins: usize,
    /// `messageReceived` events delivered.
    pub messages_routed: usize,
    /// `commandRejected` events sent.
    pub rejections: usize,
    /// Frames that failed to decode.
    pub undecodable: usize,
}

struct Client {
    outbox: mpsc::UnboundedSender<TransportEvent>,
    member: Option<Member>,
}

struct Member {
    channel: String,
    info: PeerInfo,
}

struct Channel {
    digest: String,
    members: Vec<ConnectionId>,
}

#[derive(Default)]
struct RelayState {
    next_id: ConnectionId,
    clients: BTreeMap<ConnectionId, Client>,
    channels: BTreeMap<String, Channel>,
    refuse_next: usize,
    stats: RelayStats,
}

/// Shared handle to an in-memory relay. Clones refer to the same relay.
#[derive(Clone, Default)]
pub struct SimRelay {
    state: Arc<Mutex<RelayState>>,
}

impl SimRelay {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_connections(&self, count: usize) {
        self.lock().refuse_next = count;
    }

    /// Reset the connection of the member called `name`, as if the network
    /// dropped it. Other members see `peerLeft`. Returns whether a member
    /// was found.
    pub fn drop_member(&self, name: &str) -> bool {
        let mut state = self.lock();
        let id = state
            .clients
            .iter()
            .find(|(_, c)| c.member.as_ref().is_some_and(|m| m.info.name == name))
            .map(|(id, _)| *id);

        let Some(id) = id else {
            return false;
        };
        state.reset(id);
        true
    }

    /// Reset every open connection.
    pub fn drop_all(&self) {
        let mut state = self.lock();
        let ids: Vec<_> = state.clients.keys().copied().collect();
        for id in ids {
            state.reset(id);
        }
    }

    /// Names in `channel`, in join order.
    pub fn members(&self, channel: &str) -> Vec<String> {
        let state = self.lock();
        state
            .channels
            .get(channel)
            .map(|ch| {
                ch.members
                    .iter()
                    .filter_map(|id| state.clients.get(id))
                    .filter_map(|c| c.member.as_ref().map(|m| m.info.name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.lock().clients.len()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> RelayStats {
        self.lock().stats.clone()
    }

    /// Accept a new connection.
    pub(crate) fn attach(
        &self,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<TransportEvent>), TransportError> {
        let mut state = self.lock();
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            state.stats.refused += 1;
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let id = state.next_id;
        state.next_id += 1;
        let (outbox, inbound) = mpsc::unbounded_channel();
        state.clients.insert(id, Client { outbox, member: None });
        state.stats.connections += 1;
        debug!(connection = id, "relay accepted connection");
        Ok((id, inbound))
    }

    /// Process one frame from connection `id`.
    pub(crate) fn receive(&self, id: ConnectionId, text: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.clients.contains_key(&id) {
            return Err(TransportError::Send("connection closed".to_string()));
        }

        match Frame::decode(text) {
            Ok(Frame::Keepalive) => state.stats.keepalives += 1,
            Ok(Frame::Command(command)) => state.command(id, command),
            Err(e) => {
                debug!(connection = id, error = %e, "relay dropped undecodable frame");
                state.stats.undecodable += 1;
            },
        }
        Ok(())
    }

    /// Connection `id` closed from the client side.
    pub(crate) fn detach(&self, id: ConnectionId) {
        let mut state = self.lock();
        state.leave(id);
        state.clients.remove(&id);
    }
}

impl RelayState {
    fn command(&mut self, id: ConnectionId, command: ClientCommand) {
        match command {
            ClientCommand::JoinChannel { channel, secret, name } => self.join(id, channel, secret, name),
            ClientCommand::SendMessage { to, message } => self.route(id, &to, message),
            ClientCommand::LeaveChannel {} => {
                if !self.leave(id) {
                    self.reject(id, "not in a channel");
                }
            },
        }
    }

    fn join(&mut self, id: ConnectionId, channel: String, digest: String, info: PeerInfo) {
        self.stats.joins += 1;
        if self.clients.get(&id).is_some_and(|c| c.member.is_some()) {
            return self.reject(id, "already in a channel");
        }

        let existing = self.channels.entry(channel.clone()).or_insert_with(|| Channel {
            digest: digest.clone(),
            members: Vec::new(),
        });
        if existing.digest != digest {
            return self.reject(id, "invalid secret");
        }
        let members = existing.members.clone();

        let peers: Vec<PeerInfo> = members
            .iter()
            .filter_map(|m| self.clients.get(m))
            .filter_map(|c| c.member.as_ref().map(|m| m.info.clone()))
            .collect();
        if peers.iter().any(|p| p.name == info.name) {
            return self.reject(id, "name already taken");
        }

        for member in &members {
            self.deliver(*member, &RelayEvent::PeerJoined { who: info.clone() });
        }
        if let Some(ch) = self.channels.get_mut(&channel) {
            ch.members.push(id);
        }
        if let Some(client) = self.clients.get_mut(&id) {
            client.member = Some(Member { channel, info });
        }
        self.deliver(id, &RelayEvent::ChannelJoined { peers });
    }

    fn route(&mut self, id: ConnectionId, to: &str, message: String) {
        let Some(sender) = self.clients.get(&id).and_then(|c| c.member.as_ref()) else {
            return self.reject(id, "not in a channel");
        };
        let from = sender.info.name.clone();
        let channel = sender.channel.clone();

        let target = self.channels.get(&channel).and_then(|ch| {
            ch.members.iter().copied().find(|m| {
                self.clients
                    .get(m)
                    .and_then(|c| c.member.as_ref())
                    .is_some_and(|member| member.info.name == to)
            })
        });

        match target {
            Some(target) => {
                self.stats.messages_routed += 1;
                self.deliver(target, &RelayEvent::MessageReceived { from: PeerRef { name: from }, message });
            },
            None => self.reject(id, "unknown recipient"),
        }
    }

    /// Remove `id` from its channel. Returns whether it was a member.
    fn leave(&mut self, id: ConnectionId) -> bool {
        let Some(member) = self.clients.get_mut(&id).and_then(|c| c.member.take()) else {
            return false;
        };

        let mut remaining = Vec::new();
        if let Some(ch) = self.channels.get_mut(&member.channel) {
            ch.members.retain(|m| *m != id);
            remaining = ch.members.clone();
            if ch.members.is_empty() {
                self.channels.remove(&member.channel);
            }
        }

        let event = RelayEvent::PeerLeft { who: PeerRef { name: member.info.name } };
        for other in remaining {
            self.deliver(other, &event);
        }
        true
    }

    fn reset(&mut self, id: ConnectionId) {
        if let Some(client) = self.clients.get(&id) {
            let reset = TransportError::Receive("connection reset by relay".to_string());
            if client.outbox.send(TransportEvent::Error(reset)).is_err() {
                debug!(connection = id, "reset for a connection nobody reads");
            }
        }
        self.leave(id);
        self.clients.remove(&id);
    }

    fn reject(&mut self, id: ConnectionId, reason: &str) {
        self.stats.rejections += 1;
        self.deliver(id, &RelayEvent::CommandRejected { reason: reason.to_string() });
    }

    fn deliver(&self, id: ConnectionId, event: &RelayEvent) {
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        match event.encode() {
            Ok(text) => {
                if client.outbox.send(TransportEvent::FrameReceived(text)).is_err() {
                    debug!(connection = id, kind = event.kind(), "receiver gone");
                }
            },
            Err(e) => warn!(connection = id, error = %e, "relay could not encode event"),
        }
    }
}
