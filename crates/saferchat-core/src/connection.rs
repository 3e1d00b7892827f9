//! Connection liveness state machine.
//!
//! Tracks whether the relay connection is up and owns the two timers of a
//! session: the keepalive interval and the reconnection backoff.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as a parameter (no stored Environment)
//! - [`Connection::tick`] returns [`ConnectionAction`]s
//! - The driver executes them (send a keepalive frame, open a connection)
//!
//! Timers are plain deadlines stored here, not spawned tasks, so there is at
//! most one of each no matter how many disconnects occur.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐ begin_connect ┌────────────┐  opened  ┌──────┐
//! │ Disconnected │──────────────>│ Connecting │─────────>│ Open │
//! └──────────────┘               └────────────┘          └──────┘
//!        ^                             │                    │
//!        │        lost (schedules one reconnect)            │
//!        └─────────────────────────────┴────────────────────┘
//! ```
//!
//! # Timers
//!
//! - **Keepalive**: 60 seconds, only while armed and `Open`
//! - **Reconnect**: 1 second after the connection is lost

use std::time::{Duration, Instant};

use crate::error::ConnectionError;

/// Actions returned by [`Connection::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Send an empty keepalive frame.
    SendKeepalive,
    /// The backoff elapsed: open a new connection.
    Reconnect,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none being opened
    Disconnected,
    /// Connection requested, not yet open
    Connecting,
    /// Connection open
    Open,
}

/// Liveness timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Period of the keepalive frame while the session is in a channel
    pub keepalive_interval: Duration,
    /// Delay before the single reconnection attempt after a drop
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Connection liveness state machine
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    config: ConnectionConfig,
    /// Next keepalive deadline; `None` while disarmed
    next_keepalive: Option<Instant>,
    /// Pending reconnection deadline; at most one
    reconnect_at: Option<Instant>,
}

impl Connection {
    /// Create a connection in `Disconnected` state with no timers.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { state: ConnectionState::Disconnected, config, next_keepalive: None, reconnect_at: None }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Liveness configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Whether the connection is open.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Deadline of the pending reconnection, if one is scheduled.
    pub fn reconnect_pending(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Deadline of the next keepalive, if armed.
    pub fn keepalive_due(&self) -> Option<Instant> {
        self.next_keepalive
    }

    /// Earliest pending deadline. The driver should call [`Self::tick`] no
    /// later than this.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_keepalive, self.reconnect_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Transition to `Connecting`. Cancels any pending reconnection, since
    /// this is that attempt.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "begin_connect".to_string(),
            });
        }

        self.state = ConnectionState::Connecting;
        self.reconnect_at = None;
        Ok(())
    }

    /// Transition to `Open`.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless `Connecting`.
    pub fn opened(&mut self) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "opened".to_string(),
            });
        }

        self.state = ConnectionState::Open;
        Ok(())
    }

    /// The connection failed or closed.
    ///
    /// Disarms the keepalive and schedules a reconnection unless one is
    /// already pending. Returns `true` if a new reconnection was scheduled.
    pub fn lost(&mut self, now: Instant) -> bool {
        self.state = ConnectionState::Disconnected;
        self.next_keepalive = None;

        if self.reconnect_at.is_some() {
            return false;
        }

        self.reconnect_at = Some(now + self.config.reconnect_delay);
        true
    }

    /// Arm the keepalive timer, first firing one interval from `now`.
    pub fn arm_keepalive(&mut self, now: Instant) {
        self.next_keepalive = Some(now + self.config.keepalive_interval);
    }

    /// Disarm the keepalive timer.
    pub fn disarm_keepalive(&mut self) {
        self.next_keepalive = None;
    }

    /// Drop a pending reconnection.
    pub fn cancel_reconnect(&mut self) {
        self.reconnect_at = None;
    }

    /// Fire any timer whose deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        if let Some(at) = self.reconnect_at
            && now >= at
            && self.state == ConnectionState::Disconnected
        {
            self.reconnect_at = None;
            actions.push(ConnectionAction::Reconnect);
        }

        if let Some(due) = self.next_keepalive
            && now >= due
            && self.state == ConnectionState::Open
        {
            self.next_keepalive = Some(now + self.config.keepalive_interval);
            actions.push(ConnectionAction::SendKeepalive);
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(now: Instant) -> Connection {
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.begin_connect().unwrap();
        conn.opened().unwrap();
        conn.arm_keepalive(now);
        conn
    }

    #[test]
    fn connection_lifecycle() {
        let mut conn = Connection::new(ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.next_deadline(), None);

        conn.begin_connect().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        conn.opened().unwrap();
        assert!(conn.is_open());
    }

    #[test]
    fn keepalive_timing() {
        let t0 = Instant::now();
        let mut conn = open(t0);

        // Not yet due
        assert!(conn.tick(t0 + Duration::from_secs(59)).is_empty());

        // Due after one interval
        let t1 = t0 + Duration::from_secs(60);
        assert_eq!(conn.tick(t1), vec![ConnectionAction::SendKeepalive]);

        // Re-armed relative to the tick
        assert!(conn.tick(t1 + Duration::from_secs(1)).is_empty());
        assert_eq!(conn.keepalive_due(), Some(t1 + Duration::from_secs(60)));
    }

    #[test]
    fn keepalive_silent_when_disarmed() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        conn.disarm_keepalive();
        assert!(conn.tick(t0 + Duration::from_secs(600)).is_empty());
    }

    #[test]
    fn loss_schedules_exactly_one_reconnect() {
        let t0 = Instant::now();
        let mut conn = open(t0);

        assert!(conn.lost(t0));
        assert!(!conn.lost(t0 + Duration::from_millis(100)));
        assert!(!conn.lost(t0 + Duration::from_millis(200)));
        assert_eq!(conn.reconnect_pending(), Some(t0 + Duration::from_secs(1)));
        assert_eq!(conn.keepalive_due(), None);

        assert!(conn.tick(t0 + Duration::from_millis(999)).is_empty());
        assert_eq!(conn.tick(t0 + Duration::from_secs(1)), vec![ConnectionAction::Reconnect]);
        assert!(conn.tick(t0 + Duration::from_secs(2)).is_empty());
        assert_eq!(conn.reconnect_pending(), None);
    }

    #[test]
    fn failed_reconnect_schedules_another() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        conn.lost(t0);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(conn.tick(t1), vec![ConnectionAction::Reconnect]);
        conn.begin_connect().unwrap();

        assert!(conn.lost(t1));
        assert_eq!(conn.reconnect_pending(), Some(t1 + Duration::from_secs(1)));
    }

    #[test]
    fn begin_connect_cancels_pending_reconnect() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        conn.lost(t0);
        conn.begin_connect().unwrap();
        assert_eq!(conn.reconnect_pending(), None);
    }

    #[test]
    fn invalid_state_transitions() {
        let mut conn = Connection::new(ConnectionConfig::default());

        // Can't open without connecting
        assert!(matches!(conn.opened(), Err(ConnectionError::InvalidState { .. })));

        // Can't begin twice
        conn.begin_connect().unwrap();
        assert!(matches!(conn.begin_connect(), Err(ConnectionError::InvalidState { .. })));
    }

    #[test]
    fn next_deadline_is_earliest_timer() {
        let t0 = Instant::now();
        let mut conn = open(t0);
        assert_eq!(conn.next_deadline(), Some(t0 + Duration::from_secs(60)));

        conn.lost(t0);
        assert_eq!(conn.next_deadline(), Some(t0 + Duration::from_secs(1)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Lost,
        Advance(u64),
        BeginConnect,
        Opened,
        ArmKeepalive,
    }

    fn op() -> impl proptest::strategy::Strategy<Value = Op> {
        use proptest::prelude::{Just, Strategy, prop_oneof};

        prop_oneof![
            Just(Op::Lost),
            (0u64..3_000).prop_map(Op::Advance),
            Just(Op::BeginConnect),
            Just(Op::Opened),
            Just(Op::ArmKeepalive),
        ]
    }

    proptest::proptest! {
        #[test]
        fn every_reconnect_answers_a_loss(ops in proptest::collection::vec(op(), 0..64)) {
            let mut now = Instant::now();
            let mut conn = Connection::new(ConnectionConfig::default());
            let mut unanswered_losses = 0usize;

            for op in ops {
                match op {
                    Op::Lost => {
                        conn.lost(now);
                        unanswered_losses += 1;
                    },
                    Op::Advance(ms) => now += Duration::from_millis(ms),
                    Op::BeginConnect => {
                        if conn.begin_connect().is_ok() {
                            unanswered_losses = 0;
                        }
                    },
                    Op::Opened => {
                        let _ = conn.opened();
                    },
                    Op::ArmKeepalive => conn.arm_keepalive(now),
                }

                let state = conn.state();
                for action in conn.tick(now) {
                    match action {
                        ConnectionAction::Reconnect => {
                            proptest::prop_assert!(unanswered_losses > 0);
                            proptest::prop_assert_eq!(state, ConnectionState::Disconnected);
                            unanswered_losses = 0;
                        },
                        ConnectionAction::SendKeepalive => {
                            proptest::prop_assert_eq!(state, ConnectionState::Open);
                        },
                    }
                }
            }
        }
    }
}
