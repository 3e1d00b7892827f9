//! Append-only message log.

/// Who an entry is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// The local user.
    Local {
        /// Local nickname.
        name: String,
    },
    /// A roster peer.
    Peer {
        /// Roster id at the time of the entry.
        id: u32,
        /// Display name.
        name: String,
    },
    /// A sender the roster does not know. The entry is kept so the log stays
    /// complete.
    Unknown {
        /// Name claimed by the relay.
        name: String,
    },
    /// Local system notice.
    System,
}

impl Sender {
    /// Display name, `None` for system entries.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Local { name } | Self::Peer { name, .. } | Self::Unknown { name } => Some(name),
            Self::System => None,
        }
    }
}

/// Kind of log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Someone joined the channel.
    Joined,
    /// Someone left the channel.
    Left,
    /// Chat text.
    Text,
}

/// One immutable log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Insertion position, starting at 0.
    pub seq: u64,
    /// Attribution.
    pub sender: Sender,
    /// Entry kind.
    pub kind: EntryKind,
    /// Decrypted text for [`EntryKind::Text`].
    pub content: Option<String>,
}

/// Ordered, append-only log local to one session. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
}

impl MessageLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return a copy of it.
    pub fn append(&mut self, sender: Sender, kind: EntryKind, content: Option<String>) -> LogEntry {
        let entry = LogEntry { seq: self.entries.len() as u64, sender, kind, content };
        self.entries.push(entry.clone());
        entry
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}
