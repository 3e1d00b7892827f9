//! Session state machine.
//!
//! [`Session`] owns everything one chat session knows: the keypair, the
//! channel membership, the roster, the message log and the liveness timers.
//! It performs no I/O. The runtime feeds it [`SessionEvent`]s one at a time
//! and executes the returned [`SessionAction`]s in order.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ join/start ┌────────────┐ Connected ┌───────────┐
//! │ Disconnected │───────────>│ Connecting │──────────>│ Connected │<─────┐
//! └──────────────┘            └────────────┘           └───────────┘      │
//!        ^                          │                        │ join       │ rejected
//!        │ lost                     │ Connected              v            │ / leave
//!        │ (1 reconnect)            │ (join held)   ┌───────────────────┐ │
//!        │                          └──────────────>│ AwaitingAdmission │─┤
//!        │                                          └───────────────────┘ │
//!        │                                                   │ channelJoined
//!        │                                                   v            │
//!        │                                              ┌────────┐        │
//!        └──────────────────────────────────────────────│ Joined │────────┘
//!                                                       └────────┘
//! ```
//!
//! A drop while `Joined` keeps the roster and marks the membership for
//! resumption: after the reconnect the last join is sent again, and the next
//! `channelJoined` is diffed against the roster we kept.

use std::fmt;

use saferchat_core::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, EnvRng, Environment,
};
use saferchat_crypto::{CryptoEngine, Fingerprint, PortableKey};
use saferchat_proto::{ClientCommand, Frame, PeerInfo, RelayEvent};
use tracing::{debug, info, warn};

use crate::{
    action::{Notice, SessionAction},
    config::SessionConfig,
    error::SessionError,
    event::{JoinRequest, SessionEvent},
    log::{EntryKind, MessageLog, Sender},
    roster::{Candidate, Insertion, PeerSummary, Roster},
};

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection.
    Disconnected,
    /// Opening a connection.
    Connecting,
    /// Connection open, not in a channel.
    Connected,
    /// Join sent, waiting for the relay's answer.
    AwaitingAdmission,
    /// Admitted to a channel.
    Joined,
}

/// Channel membership progress, independent of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Awaiting,
    Joined,
}

struct Channel {
    name: String,
    secret: String,
    digest: String,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("digest", &self.digest)
            .finish()
    }
}

#[derive(Debug)]
struct Membership {
    nickname: String,
    channel: Channel,
}

/// One chat session.
///
/// Created once per run. Construction generates the session keypair, so a
/// [`SessionError::Crypto`] from [`Session::new`] is fatal and happens before
/// any join can be attempted.
pub struct Session<E: Environment> {
    env: E,
    config: SessionConfig,
    crypto: CryptoEngine,
    connection: Connection,
    phase: Phase,
    membership: Option<Membership>,
    /// Membership was interrupted by a connection loss and is being restored.
    resuming: bool,
    last_join: Option<JoinRequest>,
    roster: Roster,
    log: MessageLog,
    /// A `ConnectionLost` notice is showing; the next open connection clears it.
    lost_notice_shown: bool,
}

impl<E: Environment> Session<E> {
    /// Create a session with a freshly generated keypair.
    ///
    /// # Errors
    ///
    /// [`SessionError::Crypto`] if key generation is unavailable.
    pub fn new(env: E, config: SessionConfig) -> Result<Self, SessionError> {
        let crypto = CryptoEngine::generate(&mut EnvRng::new(&env))?;
        Ok(Self::with_engine(env, config, crypto))
    }

    /// Create a session around an existing keypair.
    pub fn with_engine(env: E, config: SessionConfig, crypto: CryptoEngine) -> Self {
        info!(fingerprint = %crypto.export_public_key().fingerprint(), "session keypair ready");
        let connection = Connection::new(ConnectionConfig::from(&config));

        Self {
            env,
            config,
            crypto,
            connection,
            phase: Phase::Idle,
            membership: None,
            resuming: false,
            last_join: None,
            roster: Roster::new(),
            log: MessageLog::new(),
            lost_notice_shown: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match (self.connection.state(), self.phase) {
            (ConnectionState::Disconnected, _) => SessionState::Disconnected,
            (ConnectionState::Connecting, _) => SessionState::Connecting,
            (ConnectionState::Open, Phase::Idle) => SessionState::Connected,
            (ConnectionState::Open, Phase::Awaiting) => SessionState::AwaitingAdmission,
            (ConnectionState::Open, Phase::Joined) => SessionState::Joined,
        }
    }

    /// Environment the session reads time and randomness from.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Our public key as advertised to peers.
    pub fn public_key(&self) -> &PortableKey {
        self.crypto.export_public_key()
    }

    /// Short fingerprint of our public key.
    pub fn fingerprint(&self) -> Fingerprint {
        self.crypto.export_public_key().fingerprint()
    }

    /// Current roster.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// UI projection of the roster.
    pub fn peers(&self) -> Vec<PeerSummary> {
        self.roster.summaries()
    }

    /// Message log.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Channel we are in or joining.
    pub fn channel(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.channel.name.as_str())
    }

    /// Our nickname in the current channel.
    pub fn nickname(&self) -> Option<&str> {
        self.membership.as_ref().map(|m| m.nickname.as_str())
    }

    /// Parameters of the most recent join request, kept after a rejection so
    /// the UI can offer them again.
    pub fn last_join(&self) -> Option<&JoinRequest> {
        self.last_join.as_ref()
    }

    /// Deadline of the pending reconnection, if any.
    pub fn reconnect_pending(&self) -> Option<std::time::Instant> {
        self.connection.reconnect_pending()
    }

    /// When the runtime should next call [`Self::tick`].
    pub fn next_deadline(&self) -> Option<std::time::Instant> {
        self.connection.next_deadline()
    }

    /// Longest message, in UTF-8 bytes, that every current recipient can
    /// receive. Falls back to our own key's capacity with nobody else in the
    /// channel.
    pub fn max_message_len(&self) -> usize {
        self.roster.min_capacity().unwrap_or_else(|| self.crypto.max_plaintext_len())
    }

    /// Open the relay connection ahead of any join.
    ///
    /// No-op while a connection is open or being opened.
    pub fn start(&mut self) -> Vec<SessionAction> {
        if self.connection.state() != ConnectionState::Disconnected {
            return Vec::new();
        }
        self.connect()
    }

    /// Fire due timers.
    pub fn tick(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        for action in self.connection.tick(self.env.now()) {
            match action {
                ConnectionAction::Reconnect => {
                    info!("reconnecting to relay");
                    actions.extend(self.connect());
                },
                ConnectionAction::SendKeepalive if self.phase == Phase::Joined => {
                    debug!("sending keepalive");
                    actions.push(SessionAction::Send(Frame::Keepalive));
                },
                ConnectionAction::SendKeepalive => {},
            }
        }

        actions
    }

    /// Process one event.
    ///
    /// # Errors
    ///
    /// Only caller misuse is reported: joining twice, sending outside a
    /// channel, oversized messages. Relay and network faults are absorbed and
    /// surface as [`Notice`]s.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        match event {
            SessionEvent::Join(request) => self.handle_join(request),
            SessionEvent::SendText { text } => self.handle_send(&text),
            SessionEvent::Leave => self.handle_leave(),
            SessionEvent::Connected => self.handle_connected(),
            SessionEvent::FrameReceived { text } => match RelayEvent::decode(&text) {
                Ok(event) => Ok(self.handle_relay(event)),
                Err(e) => {
                    warn!(error = %e, "dropping undecodable frame");
                    Ok(Vec::new())
                },
            },
            SessionEvent::Relay(event) => Ok(self.handle_relay(event)),
            SessionEvent::TransportError { cause } => Ok(self.handle_lost(cause)),
            SessionEvent::TransportClosed => Ok(self.handle_lost("connection closed".to_string())),
        }
    }

    fn handle_join(&mut self, request: JoinRequest) -> Result<Vec<SessionAction>, SessionError> {
        validate_join(&request)?;
        if self.phase != Phase::Idle {
            return Err(SessionError::InvalidState { state: self.state(), operation: "join" });
        }

        let channel = Channel {
            name: request.channel.clone(),
            secret: request.secret.clone(),
            digest: CryptoEngine::digest(&request.secret),
        };
        info!(channel = %channel.name, nickname = %request.nickname, "join requested");

        self.membership = Some(Membership { nickname: request.nickname.clone(), channel });
        self.last_join = Some(request);
        self.phase = Phase::Awaiting;
        self.resuming = false;

        Ok(match self.connection.state() {
            ConnectionState::Open => self.join_frame().map(SessionAction::Send).into_iter().collect(),
            // Held until `Connected`.
            ConnectionState::Connecting => Vec::new(),
            ConnectionState::Disconnected => self.connect(),
        })
    }

    fn handle_send(&mut self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        if self.phase == Phase::Awaiting && self.resuming {
            return Err(SessionError::Reconnecting);
        }
        let Some(nickname) =
            self.membership.as_ref().map(|m| m.nickname.clone()).filter(|_| self.phase == Phase::Joined)
        else {
            return Err(SessionError::NotJoined);
        };

        let max = self.max_message_len();
        if text.len() > max {
            return Err(SessionError::MessageTooLong { len: text.len(), max });
        }

        // Keys are captured before encrypting so a roster change between
        // events cannot mix recipients within one fan-out.
        let recipients = self.roster.recipients();
        let mut rng = EnvRng::new(&self.env);
        let mut actions = Vec::with_capacity(recipients.len() + 1);

        for recipient in &recipients {
            match self.crypto.encrypt(&mut rng, text, &recipient.public_key) {
                Ok(message) => actions.push(SessionAction::Send(
                    ClientCommand::SendMessage { to: recipient.name.clone(), message }.into(),
                )),
                Err(e) => warn!(peer = %recipient.name, error = %e, "skipping recipient"),
            }
        }
        debug!(recipients = recipients.len(), "message encrypted");

        actions.push(self.record(Sender::Local { name: nickname }, EntryKind::Text, Some(text.to_string())));
        Ok(actions)
    }

    fn handle_leave(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let Some(membership) = self.membership.take() else {
            return Err(SessionError::NotJoined);
        };
        info!(channel = %membership.channel.name, "leaving channel");

        self.phase = Phase::Idle;
        self.resuming = false;
        self.roster.clear();
        self.connection.disarm_keepalive();

        let mut actions = Vec::new();
        if self.connection.is_open() {
            actions.push(SessionAction::Send(ClientCommand::LeaveChannel {}.into()));
        } else {
            self.connection.cancel_reconnect();
        }

        actions.push(self.record(Sender::Local { name: membership.nickname }, EntryKind::Left, None));
        actions.push(SessionAction::Publish(Notice::Left { channel: membership.channel.name }));
        actions.push(SessionAction::Publish(Notice::Roster(Vec::new())));
        Ok(actions)
    }

    fn handle_connected(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.connection.opened()?;
        info!(state = ?self.state(), "connected to relay");

        let mut actions = Vec::new();
        if std::mem::take(&mut self.lost_notice_shown) {
            actions.push(SessionAction::Publish(Notice::ConnectionRestored));
        }
        if self.phase == Phase::Awaiting {
            actions.extend(self.join_frame().map(SessionAction::Send));
        }
        Ok(actions)
    }

    fn handle_lost(&mut self, cause: String) -> Vec<SessionAction> {
        let scheduled = self.connection.lost(self.env.now());
        if self.phase == Phase::Joined {
            self.phase = Phase::Awaiting;
            self.resuming = true;
        }
        warn!(cause = %cause, reconnect_scheduled = scheduled, "connection lost");

        if self.lost_notice_shown {
            return Vec::new();
        }
        self.lost_notice_shown = true;
        vec![SessionAction::Publish(Notice::ConnectionLost { cause })]
    }

    fn handle_relay(&mut self, event: RelayEvent) -> Vec<SessionAction> {
        debug!(kind = event.kind(), "relay event");
        match event {
            RelayEvent::ChannelJoined { peers } => self.on_channel_joined(peers),
            RelayEvent::PeerJoined { who } => self.on_peer_joined(who),
            RelayEvent::MessageReceived { from, message } => self.on_message(from.name, &message),
            RelayEvent::PeerLeft { who } => self.on_peer_left(&who.name),
            RelayEvent::CommandRejected { reason } => self.on_rejected(reason),
        }
    }

    fn on_channel_joined(&mut self, peers: Vec<PeerInfo>) -> Vec<SessionAction> {
        let Some(membership) = self.membership.as_ref().filter(|_| self.phase == Phase::Awaiting)
        else {
            warn!(state = ?self.state(), "ignoring unexpected channelJoined");
            return Vec::new();
        };
        let nickname = membership.nickname.clone();
        let channel = membership.channel.name.clone();

        let candidates = peers.into_iter().filter_map(|info| decode_peer(info, &nickname)).collect();
        let diff = self.roster.replace(candidates);
        let resumed = std::mem::take(&mut self.resuming);

        self.phase = Phase::Joined;
        self.connection.arm_keepalive(self.env.now());
        info!(channel = %channel, peers = self.roster.len(), resumed, "admitted to channel");

        let mut actions = Vec::new();
        for peer in diff.left {
            actions.push(self.record(Sender::Peer { id: peer.id, name: peer.name }, EntryKind::Left, None));
        }
        for peer in diff.joined {
            actions.push(self.record(Sender::Peer { id: peer.id, name: peer.name }, EntryKind::Joined, None));
        }
        if !resumed {
            actions.push(self.record(Sender::Local { name: nickname }, EntryKind::Joined, None));
            actions.push(self.record(
                Sender::System,
                EntryKind::Text,
                Some(format!("Messages in #{channel} are end-to-end encrypted.")),
            ));
        }

        actions.push(SessionAction::Publish(Notice::Joined { channel, resumed }));
        actions.push(SessionAction::Publish(Notice::Roster(self.roster.summaries())));
        actions
    }

    fn on_peer_joined(&mut self, who: PeerInfo) -> Vec<SessionAction> {
        let Some(nickname) = self.membership.as_ref().map(|m| m.nickname.clone()) else {
            debug!(peer = %who.name, "ignoring peerJoined outside a channel");
            return Vec::new();
        };
        if self.phase != Phase::Joined {
            debug!(peer = %who.name, state = ?self.state(), "ignoring peerJoined before admission");
            return Vec::new();
        }
        let Some(candidate) = decode_peer(who, &nickname) else {
            return Vec::new();
        };

        match self.roster.insert(candidate) {
            Insertion::Added(peer) => {
                info!(peer = %peer.name, id = peer.id, fingerprint = %peer.fingerprint, "peer joined");
                vec![
                    self.record(Sender::Peer { id: peer.id, name: peer.name }, EntryKind::Joined, None),
                    SessionAction::Publish(Notice::Roster(self.roster.summaries())),
                ]
            },
            Insertion::Updated(peer) => {
                info!(peer = %peer.name, fingerprint = %peer.fingerprint, "peer key replaced");
                vec![SessionAction::Publish(Notice::Roster(self.roster.summaries()))]
            },
            Insertion::Unchanged => Vec::new(),
        }
    }

    fn on_message(&mut self, from: String, ciphertext: &str) -> Vec<SessionAction> {
        if self.membership.is_none() {
            debug!(peer = %from, "ignoring message outside a channel");
            return Vec::new();
        }

        let text = match self.crypto.decrypt(ciphertext) {
            Ok(text) => text,
            Err(e) => {
                warn!(peer = %from, error = %e, "dropping undecryptable message");
                return Vec::new();
            },
        };

        let sender = match self.roster.get(&from) {
            Some(peer) => Sender::Peer { id: peer.id(), name: from },
            None => {
                debug!(peer = %from, "message from sender not in roster");
                Sender::Unknown { name: from }
            },
        };
        vec![self.record(sender, EntryKind::Text, Some(text))]
    }

    fn on_peer_left(&mut self, name: &str) -> Vec<SessionAction> {
        let Some(peer) = self.roster.remove(name) else {
            debug!(peer = %name, "peerLeft for unknown peer");
            return Vec::new();
        };
        info!(peer = %name, id = peer.id(), "peer left");

        vec![
            self.record(Sender::Peer { id: peer.id(), name: name.to_string() }, EntryKind::Left, None),
            SessionAction::Publish(Notice::Roster(self.roster.summaries())),
        ]
    }

    fn on_rejected(&mut self, reason: String) -> Vec<SessionAction> {
        warn!(reason = %reason, state = ?self.state(), "command rejected");

        let mut actions = Vec::new();
        if self.phase == Phase::Awaiting {
            self.phase = Phase::Idle;
            let membership = self.membership.take();
            if std::mem::take(&mut self.resuming) {
                // The relay refused the resumed join, so the channel is gone.
                self.roster.clear();
                self.connection.disarm_keepalive();
                if let Some(Membership { nickname, channel }) = membership {
                    info!(channel = %channel.name, "resume refused, leaving channel");
                    actions.push(self.record(Sender::Local { name: nickname }, EntryKind::Left, None));
                    actions.push(SessionAction::Publish(Notice::Left { channel: channel.name }));
                }
                actions.push(SessionAction::Publish(Notice::Roster(Vec::new())));
            }
        }

        actions.push(SessionAction::Publish(Notice::Rejected { reason }));
        actions
    }

    fn connect(&mut self) -> Vec<SessionAction> {
        match self.connection.begin_connect() {
            Ok(()) => vec![SessionAction::Connect],
            Err(e) => {
                debug!(error = %e, "connect already in progress");
                Vec::new()
            },
        }
    }

    fn join_frame(&self) -> Option<Frame> {
        let membership = self.membership.as_ref()?;
        Some(
            ClientCommand::JoinChannel {
                channel: membership.channel.name.clone(),
                secret: membership.channel.digest.clone(),
                name: PeerInfo {
                    name: membership.nickname.clone(),
                    key: self.crypto.export_public_key().as_text().to_string(),
                },
            }
            .into(),
        )
    }

    fn record(&mut self, sender: Sender, kind: EntryKind, content: Option<String>) -> SessionAction {
        SessionAction::Publish(Notice::Entry(self.log.append(sender, kind, content)))
    }
}

impl<E: Environment> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("membership", &self.membership)
            .field("peers", &self.roster.len())
            .field("log", &self.log.len())
            .finish_non_exhaustive()
    }
}

fn validate_join(request: &JoinRequest) -> Result<(), SessionError> {
    for (field, value) in
        [("nickname", &request.nickname), ("channel", &request.channel), ("secret", &request.secret)]
    {
        if value.trim().is_empty() {
            return Err(SessionError::InvalidJoin(format!("{field} is empty")));
        }
    }
    Ok(())
}

/// Decode a peer announced by the relay. Peers with an empty name, our own
/// name, or an unusable key are left out of the roster.
fn decode_peer(info: PeerInfo, own_name: &str) -> Option<Candidate> {
    if info.name.is_empty() {
        warn!("skipping peer with empty name");
        return None;
    }
    if info.name == own_name {
        debug!(peer = %info.name, "skipping own roster entry");
        return None;
    }

    match CryptoEngine::import_public_key(&info.key) {
        Ok(public_key) => Some(Candidate { name: info.name, public_key, encoded_key: info.key }),
        Err(e) => {
            warn!(peer = %info.name, error = %e, "skipping peer with malformed key");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::OsRng;
    use saferchat_proto::PeerRef;

    use super::*;
    use crate::{
        roster::LOCAL_PEER_ID,
        testing::{ManualEnv, handle, keys, wire_key},
    };

    const HUNTER2_DIGEST: &str = "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7";

    fn session() -> (Session<ManualEnv>, ManualEnv) {
        let env = ManualEnv::new();
        let session = Session::with_engine(env.clone(), SessionConfig::default(), keys().alice.clone());
        (session, env)
    }

    fn lobby() -> JoinRequest {
        JoinRequest::new("alice", "lobby", "hunter2")
    }

    fn peer(name: &str, engine: &CryptoEngine) -> PeerInfo {
        PeerInfo { name: name.to_string(), key: wire_key(engine) }
    }

    fn sent(actions: &[SessionAction]) -> Vec<&Frame> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Send(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    fn notices(actions: &[SessionAction]) -> Vec<&Notice> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Publish(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    /// Session admitted to `lobby` with the given peers.
    fn joined(peers: Vec<PeerInfo>) -> (Session<ManualEnv>, ManualEnv) {
        let (mut session, env) = session();
        session.handle(SessionEvent::Join(lobby())).unwrap();
        session.handle(SessionEvent::Connected).unwrap();
        session.handle(RelayEvent::ChannelJoined { peers }.into()).unwrap();
        assert_eq!(session.state(), SessionState::Joined);
        (session, env)
    }

    fn message_for_alice(from: &CryptoEngine, text: &str) -> String {
        from.encrypt(&mut OsRng, text, &handle(&keys().alice)).unwrap()
    }

    #[test]
    fn join_before_connect_is_held_until_open() {
        let (mut session, _) = session();

        let actions = session.handle(SessionEvent::Join(lobby())).unwrap();
        assert_eq!(actions, vec![SessionAction::Connect]);
        assert_eq!(session.state(), SessionState::Connecting);

        let actions = session.handle(SessionEvent::Connected).unwrap();
        let expected: Frame = ClientCommand::JoinChannel {
            channel: "lobby".into(),
            secret: HUNTER2_DIGEST.into(),
            name: PeerInfo { name: "alice".into(), key: wire_key(&keys().alice) },
        }
        .into();
        assert_eq!(actions, vec![SessionAction::Send(expected)]);
        assert_eq!(session.state(), SessionState::AwaitingAdmission);
    }

    #[test]
    fn join_while_open_sends_immediately() {
        let (mut session, _) = session();
        assert_eq!(session.start(), vec![SessionAction::Connect]);
        assert!(session.start().is_empty());
        assert!(session.handle(SessionEvent::Connected).unwrap().is_empty());
        assert_eq!(session.state(), SessionState::Connected);

        let actions = session.handle(SessionEvent::Join(lobby())).unwrap();
        let frames = sent(&actions);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind(), "joinChannel");
    }

    #[test]
    fn join_frame_never_carries_the_secret() {
        let (mut session, _) = session();
        session.start();
        session.handle(SessionEvent::Connected).unwrap();
        let actions = session.handle(SessionEvent::Join(lobby())).unwrap();

        let text = sent(&actions)[0].encode().unwrap();
        assert!(!text.contains("hunter2"));
        assert!(text.contains(HUNTER2_DIGEST));
        assert!(!format!("{session:?}").contains("hunter2"));
    }

    #[test]
    fn invalid_join_parameters() {
        let (mut session, _) = session();
        let err = session.handle(SessionEvent::Join(JoinRequest::new("alice", "lobby", ""))).unwrap_err();
        assert_eq!(err, SessionError::InvalidJoin("secret is empty".into()));

        let err = session.handle(SessionEvent::Join(JoinRequest::new(" ", "lobby", "x"))).unwrap_err();
        assert_eq!(err, SessionError::InvalidJoin("nickname is empty".into()));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn second_join_is_rejected_locally() {
        let (mut session, _) = joined(vec![]);
        let err = session.handle(SessionEvent::Join(lobby())).unwrap_err();
        assert_eq!(err, SessionError::InvalidState { state: SessionState::Joined, operation: "join" });
    }

    #[test]
    fn channel_joined_skips_malformed_keys() {
        let bob = &keys().bob;
        let (session, _) =
            joined(vec![peer("bob", bob), PeerInfo { name: "eve".into(), key: "not-base64!!".into() }]);

        let peers = session.peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].name, "bob");
        assert_eq!(peers[0].id, LOCAL_PEER_ID + 1);
        assert!(!session.roster().contains("eve"));
    }

    #[test]
    fn admission_records_presence_and_welcome() {
        let (mut session, _) = session();
        session.handle(SessionEvent::Join(lobby())).unwrap();
        session.handle(SessionEvent::Connected).unwrap();

        let actions = session
            .handle(
                RelayEvent::ChannelJoined {
                    peers: vec![peer("bob", &keys().bob), peer("carol", &keys().carol)],
                }
                .into(),
            )
            .unwrap();

        let entries: Vec<_> = session.log().entries().iter().map(|e| (e.sender.clone(), e.kind)).collect();
        assert_eq!(
            entries,
            vec![
                (Sender::Peer { id: 2, name: "bob".into() }, EntryKind::Joined),
                (Sender::Peer { id: 3, name: "carol".into() }, EntryKind::Joined),
                (Sender::Local { name: "alice".into() }, EntryKind::Joined),
                (Sender::System, EntryKind::Text),
            ]
        );
        assert!(notices(&actions).contains(&&Notice::Joined { channel: "lobby".into(), resumed: false }));
        assert_eq!(session.channel(), Some("lobby"));
    }

    #[test]
    fn own_name_is_left_out_of_roster() {
        let (session, _) = joined(vec![peer("alice", &keys().alice), peer("bob", &keys().bob)]);
        let names: Vec<_> = session.peers().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["bob".to_string()]);
    }

    #[test]
    fn text_to_two_peers_is_encrypted_separately() {
        let keys = keys();
        let (mut session, _) = joined(vec![peer("bob", &keys.bob), peer("carol", &keys.carol)]);

        let actions = session.handle(SessionEvent::SendText { text: "hi".into() }).unwrap();
        let frames = sent(&actions);
        assert_eq!(frames.len(), 2);

        let mut ciphertexts = Vec::new();
        for (frame, (name, engine)) in frames.iter().zip([("bob", &keys.bob), ("carol", &keys.carol)]) {
            let Frame::Command(ClientCommand::SendMessage { to, message }) = frame else {
                panic!("expected sendMessage, got {frame:?}");
            };
            assert_eq!(to, name);
            assert_eq!(engine.decrypt(message).unwrap(), "hi");
            ciphertexts.push(message.clone());
        }
        assert_ne!(ciphertexts[0], ciphertexts[1]);

        let last = session.log().last().unwrap();
        assert_eq!(last.sender, Sender::Local { name: "alice".into() });
        assert_eq!(last.content.as_deref(), Some("hi"));
    }

    #[test]
    fn text_to_empty_channel_is_only_logged() {
        let (mut session, _) = joined(vec![]);
        let actions = session.handle(SessionEvent::SendText { text: "anyone?".into() }).unwrap();

        assert!(sent(&actions).is_empty());
        assert_eq!(session.log().last().and_then(|e| e.content.as_deref()), Some("anyone?"));
    }

    #[test]
    fn oversized_text_is_rejected_before_encryption() {
        let (mut session, _) = joined(vec![peer("bob", &keys().bob)]);
        let before = session.log().len();

        let err = session.handle(SessionEvent::SendText { text: "x".repeat(191) }).unwrap_err();
        assert_eq!(err, SessionError::MessageTooLong { len: 191, max: 190 });
        assert_eq!(session.log().len(), before);

        let actions = session.handle(SessionEvent::SendText { text: "x".repeat(190) }).unwrap();
        assert_eq!(sent(&actions).len(), 1);
    }

    #[test]
    fn empty_text_is_ignored() {
        let (mut session, _) = joined(vec![peer("bob", &keys().bob)]);
        assert!(session.handle(SessionEvent::SendText { text: String::new() }).unwrap().is_empty());
    }

    #[test]
    fn sending_outside_a_channel_fails() {
        let (mut session, _) = session();
        session.start();
        session.handle(SessionEvent::Connected).unwrap();
        let err = session.handle(SessionEvent::SendText { text: "hi".into() }).unwrap_err();
        assert_eq!(err, SessionError::NotJoined);
    }

    #[test]
    fn incoming_message_is_decrypted_and_attributed() {
        let keys = keys();
        let (mut session, _) = joined(vec![peer("bob", &keys.bob)]);

        let message = message_for_alice(&keys.bob, "hello alice");
        session
            .handle(RelayEvent::MessageReceived { from: PeerRef { name: "bob".into() }, message }.into())
            .unwrap();

        let last = session.log().last().unwrap();
        assert_eq!(last.sender, Sender::Peer { id: 2, name: "bob".into() });
        assert_eq!(last.kind, EntryKind::Text);
        assert_eq!(last.content.as_deref(), Some("hello alice"));
    }

    #[test]
    fn message_from_unknown_sender_is_kept() {
        let keys = keys();
        let (mut session, _) = joined(vec![]);

        let message = message_for_alice(&keys.carol, "psst");
        session
            .handle(RelayEvent::MessageReceived { from: PeerRef { name: "mallory".into() }, message }.into())
            .unwrap();

        assert_eq!(session.log().last().unwrap().sender, Sender::Unknown { name: "mallory".into() });
    }

    #[test]
    fn undecryptable_message_is_dropped() {
        let keys = keys();
        let (mut session, _) = joined(vec![peer("bob", &keys.bob)]);
        let before = session.log().len();

        // Addressed to bob's key, not ours.
        let message = keys.carol.encrypt(&mut OsRng, "not for alice", &handle(&keys.bob)).unwrap();
        let actions = session
            .handle(RelayEvent::MessageReceived { from: PeerRef { name: "carol".into() }, message }.into())
            .unwrap();

        assert!(actions.is_empty());
        assert_eq!(session.log().len(), before);
        assert_eq!(session.state(), SessionState::Joined);
    }

    #[test]
    fn command_rejected_keeps_connection_and_roster() {
        let (mut session, _) = joined(vec![peer("bob", &keys().bob)]);

        let actions = session
            .handle(RelayEvent::CommandRejected { reason: "invalid secret".into() }.into())
            .unwrap();

        assert_eq!(
            actions,
            vec![SessionAction::Publish(Notice::Rejected { reason: "invalid secret".into() })]
        );
        assert_eq!(session.state(), SessionState::Joined);
        assert_eq!(session.peers().len(), 1);
    }

    #[test]
    fn rejected_join_returns_to_connected() {
        let (mut session, _) = session();
        session.handle(SessionEvent::Join(lobby())).unwrap();
        session.handle(SessionEvent::Connected).unwrap();

        session.handle(RelayEvent::CommandRejected { reason: "invalid secret".into() }.into()).unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.channel(), None);
        assert_eq!(session.last_join(), Some(&lobby()));

        // Retry with the same parameters
        let actions = session.handle(SessionEvent::Join(lobby())).unwrap();
        assert_eq!(sent(&actions).len(), 1);
    }

    #[test]
    fn peer_joined_takes_lowest_free_id() {
        let keys = keys();
        let (mut session, _) = joined(vec![peer("bob", &keys.bob), peer("carol", &keys.carol)]);

        session.handle(RelayEvent::PeerLeft { who: PeerRef { name: "bob".into() } }.into()).unwrap();
        let actions = session.handle(RelayEvent::PeerJoined { who: peer("dave", &keys.bob) }.into()).unwrap();

        let Some(Notice::Entry(entry)) = notices(&actions).first().copied() else {
            panic!("expected a presence entry, got {actions:?}");
        };
        assert_eq!(entry.sender, Sender::Peer { id: 2, name: "dave".into() });
        assert_eq!(entry.kind, EntryKind::Joined);
    }

    #[test]
    fn duplicate_peer_joined_updates_key_in_place() {
        let keys = keys();
        let (mut session, _) = joined(vec![peer("bob", &keys.bob)]);
        let before = session.log().len();

        let same = session.handle(RelayEvent::PeerJoined { who: peer("bob", &keys.bob) }.into()).unwrap();
        assert!(same.is_empty());

        let rekeyed = session.handle(RelayEvent::PeerJoined { who: peer("bob", &keys.carol) }.into()).unwrap();
        assert!(matches!(rekeyed.as_slice(), [SessionAction::Publish(Notice::Roster(_))]));
        assert_eq!(session.log().len(), before);
        assert_eq!(session.peers()[0].id, 2);
        assert_eq!(session.peers()[0].fingerprint, keys.carol.export_public_key().fingerprint());
    }

    #[test]
    fn peer_joined_with_malformed_key_is_skipped() {
        let (mut session, _) = joined(vec![]);
        let actions = session
            .handle(RelayEvent::PeerJoined { who: PeerInfo { name: "eve".into(), key: "AAAA".into() } }.into())
            .unwrap();
        assert!(actions.is_empty());
        assert!(session.roster().is_empty());
    }

    #[test]
    fn peer_left_is_idempotent() {
        let (mut session, _) = joined(vec![peer("bob", &keys().bob)]);
        let bob_left = || -> SessionEvent { RelayEvent::PeerLeft { who: PeerRef { name: "bob".into() } }.into() };

        let first = session.handle(bob_left()).unwrap();
        assert_eq!(first.len(), 2);
        let len = session.log().len();

        assert!(session.handle(bob_left()).unwrap().is_empty());
        assert_eq!(session.log().len(), len);
        assert!(session.roster().is_empty());
    }

    #[test]
    fn keepalive_only_while_joined() {
        let (mut session, env) = session();
        session.start();
        session.handle(SessionEvent::Connected).unwrap();

        env.advance(Duration::from_secs(120));
        assert!(session.tick().is_empty());

        let (mut session, env) = joined(vec![]);
        env.advance(Duration::from_secs(59));
        assert!(session.tick().is_empty());
        env.advance(Duration::from_secs(1));
        assert_eq!(session.tick(), vec![SessionAction::Send(Frame::Keepalive)]);
        env.advance(Duration::from_secs(60));
        assert_eq!(session.tick(), vec![SessionAction::Send(Frame::Keepalive)]);
    }

    #[test]
    fn connection_loss_schedules_exactly_one_reconnect() {
        let (mut session, env) = joined(vec![peer("bob", &keys().bob)]);

        let actions = session.handle(SessionEvent::TransportError { cause: "reset".into() }).unwrap();
        assert_eq!(actions, vec![SessionAction::Publish(Notice::ConnectionLost { cause: "reset".into() })]);
        assert!(session.handle(SessionEvent::TransportClosed).unwrap().is_empty());

        let deadline = session.reconnect_pending().unwrap();
        assert_eq!(deadline, env.now() + Duration::from_secs(1));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.peers().len(), 1);

        env.advance(Duration::from_millis(999));
        assert!(session.tick().is_empty());
        env.advance(Duration::from_millis(1));
        assert_eq!(session.tick(), vec![SessionAction::Connect]);
        assert!(session.tick().is_empty());
        assert_eq!(session.reconnect_pending(), None);
    }

    #[test]
    fn reconnect_resends_last_join_and_resumes() {
        let keys = keys();
        let (mut session, env) = joined(vec![peer("bob", &keys.bob)]);
        let before = session.log().len();

        session.handle(SessionEvent::TransportClosed).unwrap();
        env.advance(Duration::from_secs(1));
        session.tick();

        let actions = session.handle(SessionEvent::Connected).unwrap();
        assert_eq!(actions[0], SessionAction::Publish(Notice::ConnectionRestored));
        assert_eq!(sent(&actions)[0].kind(), "joinChannel");
        assert_eq!(session.state(), SessionState::AwaitingAdmission);

        // Bob is still there, carol joined while we were away
        let actions = session
            .handle(RelayEvent::ChannelJoined { peers: vec![peer("bob", &keys.bob), peer("carol", &keys.carol)] }.into())
            .unwrap();

        assert!(notices(&actions).contains(&&Notice::Joined { channel: "lobby".into(), resumed: true }));
        let new_entries: Vec<_> = session.log().entries()[before..].iter().map(|e| e.sender.clone()).collect();
        assert_eq!(new_entries, vec![Sender::Peer { id: 3, name: "carol".into() }]);
        assert_eq!(session.state(), SessionState::Joined);
    }

    #[test]
    fn failed_reconnect_attempt_schedules_another() {
        let (mut session, env) = joined(vec![]);
        session.handle(SessionEvent::TransportClosed).unwrap();
        env.advance(Duration::from_secs(1));
        assert_eq!(session.tick(), vec![SessionAction::Connect]);

        assert!(session.handle(SessionEvent::TransportError { cause: "refused".into() }).unwrap().is_empty());
        assert_eq!(session.reconnect_pending(), Some(env.now() + Duration::from_secs(1)));
    }

    #[test]
    fn text_while_reconnecting_is_refused_not_logged() {
        let (mut session, env) = joined(vec![peer("bob", &keys().bob)]);
        session.handle(SessionEvent::TransportClosed).unwrap();
        let before = session.log().len();

        let err = session.handle(SessionEvent::SendText { text: "anyone?".into() }).unwrap_err();
        assert_eq!(err, SessionError::Reconnecting);
        assert!(!err.is_fatal());
        assert_eq!(session.log().len(), before);

        // Still refused once the link is back but before re-admission
        env.advance(Duration::from_secs(1));
        session.tick();
        session.handle(SessionEvent::Connected).unwrap();
        assert_eq!(
            session.handle(SessionEvent::SendText { text: "anyone?".into() }),
            Err(SessionError::Reconnecting)
        );

        session.handle(RelayEvent::ChannelJoined { peers: vec![peer("bob", &keys().bob)] }.into()).unwrap();
        let actions = session.handle(SessionEvent::SendText { text: "back".into() }).unwrap();
        assert_eq!(sent(&actions).len(), 1);
    }

    #[test]
    fn refused_resume_leaves_the_channel() {
        let (mut session, env) = joined(vec![peer("bob", &keys().bob)]);
        session.handle(SessionEvent::TransportClosed).unwrap();
        env.advance(Duration::from_secs(1));
        session.tick();
        session.handle(SessionEvent::Connected).unwrap();

        let actions = session
            .handle(RelayEvent::CommandRejected { reason: "name already taken".into() }.into())
            .unwrap();

        let published: Vec<_> =
            notices(&actions).into_iter().filter(|n| !matches!(n, Notice::Entry(_))).collect();
        assert_eq!(published, vec![
            &Notice::Left { channel: "lobby".into() },
            &Notice::Roster(Vec::new()),
            &Notice::Rejected { reason: "name already taken".into() },
        ]);
        let last = session.log().last().unwrap();
        assert_eq!(last.sender, Sender::Local { name: "alice".into() });
        assert_eq!(last.kind, EntryKind::Left);

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.channel(), None);
        assert!(session.roster().is_empty());
        assert_eq!(session.next_deadline(), None);
        assert_eq!(session.handle(SessionEvent::SendText { text: "hi".into() }), Err(SessionError::NotJoined));
    }

    #[test]
    fn leave_sends_leave_frame_and_clears_channel() {
        let (mut session, _) = joined(vec![peer("bob", &keys().bob)]);

        let actions = session.handle(SessionEvent::Leave).unwrap();
        let frames = sent(&actions);
        assert_eq!(frames, vec![&Frame::Command(ClientCommand::LeaveChannel {})]);
        assert!(notices(&actions).contains(&&Notice::Left { channel: "lobby".into() }));

        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.roster().is_empty());
        assert_eq!(session.channel(), None);
        assert_eq!(session.next_deadline(), None);
        assert_eq!(session.handle(SessionEvent::SendText { text: "hi".into() }), Err(SessionError::NotJoined));
    }

    #[test]
    fn leave_while_disconnected_cancels_resume() {
        let (mut session, env) = joined(vec![]);
        session.handle(SessionEvent::TransportClosed).unwrap();

        let actions = session.handle(SessionEvent::Leave).unwrap();
        assert!(sent(&actions).is_empty());
        assert_eq!(session.reconnect_pending(), None);

        env.advance(Duration::from_secs(5));
        assert!(session.tick().is_empty());
    }

    #[test]
    fn raw_frames_are_decoded_at_the_boundary() {
        let (mut session, _) = joined(vec![peer("bob", &keys().bob)]);

        let actions = session
            .handle(SessionEvent::FrameReceived { text: r#"{"type":"peerLeft","data":{"who":{"name":"bob"}}}"#.into() })
            .unwrap();
        assert_eq!(actions.len(), 2);

        for junk in ["not json", r#"{"type":"bogus","data":{}}"#, "{}"] {
            assert!(session.handle(SessionEvent::FrameReceived { text: junk.into() }).unwrap().is_empty());
        }
        assert_eq!(session.state(), SessionState::Joined);
    }
}
