//! Channel roster.
//!
//! Peers are keyed by display name; ids are small integers assigned locally.
//! The local user is always [`LOCAL_PEER_ID`]; peers take the lowest free id
//! starting at 2, so an id is only reused after its owner has left.

use std::collections::BTreeSet;

use saferchat_crypto::{Fingerprint, PublicKeyHandle};

/// Id of the local user.
pub const LOCAL_PEER_ID: u32 = 1;

const FIRST_PEER_ID: u32 = 2;

/// A channel participant whose public key decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    id: u32,
    name: String,
    public_key: PublicKeyHandle,
    encoded_key: String,
}

impl Peer {
    /// Local id, unique among live peers.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded key used for encryption.
    pub fn public_key(&self) -> &PublicKeyHandle {
        &self.public_key
    }

    /// Base64 key as received on the wire.
    pub fn encoded_key(&self) -> &str {
        &self.encoded_key
    }

    /// Read-only projection for the UI.
    pub fn summary(&self) -> PeerSummary {
        PeerSummary { id: self.id, name: self.name.clone(), fingerprint: self.public_key.fingerprint() }
    }
}

/// UI projection of a [`Peer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSummary {
    /// Local id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Public key fingerprint.
    pub fingerprint: Fingerprint,
}

/// A decoded peer ready to enter the roster.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Display name.
    pub name: String,
    /// Decoded key.
    pub public_key: PublicKeyHandle,
    /// Base64 key as received.
    pub encoded_key: String,
}

/// Recipient snapshot for one outbound encryption.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Display name used to address the frame.
    pub name: String,
    /// Key captured at snapshot time.
    pub public_key: PublicKeyHandle,
}

/// Outcome of [`Roster::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// A new peer took a free id.
    Added(PeerSummary),
    /// A peer with this name existed; its key was replaced, id kept.
    Updated(PeerSummary),
    /// The same name and key were already present.
    Unchanged,
}

/// Changes produced by [`Roster::replace`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    /// Peers that were not in the previous roster.
    pub joined: Vec<PeerSummary>,
    /// Peers absent from the new snapshot.
    pub left: Vec<PeerSummary>,
}

/// Set of known peers in the active channel, in join order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    peers: Vec<Peer>,
}

impl Roster {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Look up a peer by name.
    pub fn get(&self, name: &str) -> Option<&Peer> {
        self.peers.iter().find(|p| p.name == name)
    }

    /// Whether a peer with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Peers in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    /// UI projection of every peer.
    pub fn summaries(&self) -> Vec<PeerSummary> {
        self.peers.iter().map(Peer::summary).collect()
    }

    /// Snapshot of every recipient key for one outbound fan-out.
    pub fn recipients(&self) -> Vec<Recipient> {
        self.peers
            .iter()
            .map(|p| Recipient { name: p.name.clone(), public_key: p.public_key.clone() })
            .collect()
    }

    /// Smallest plaintext capacity among all peers, `None` when empty.
    pub fn min_capacity(&self) -> Option<usize> {
        self.peers.iter().map(|p| p.public_key.max_plaintext_len()).min()
    }

    /// Add a peer, or update the key of the peer with the same name.
    pub fn insert(&mut self, candidate: Candidate) -> Insertion {
        if let Some(existing) = self.peers.iter_mut().find(|p| p.name == candidate.name) {
            if existing.public_key == candidate.public_key {
                return Insertion::Unchanged;
            }
            existing.public_key = candidate.public_key;
            existing.encoded_key = candidate.encoded_key;
            return Insertion::Updated(existing.summary());
        }

        let peer = Peer {
            id: self.lowest_free_id(),
            name: candidate.name,
            public_key: candidate.public_key,
            encoded_key: candidate.encoded_key,
        };
        let summary = peer.summary();
        self.peers.push(peer);
        Insertion::Added(summary)
    }

    /// Remove a peer by name. Absent names are a no-op.
    pub fn remove(&mut self, name: &str) -> Option<Peer> {
        let index = self.peers.iter().position(|p| p.name == name)?;
        Some(self.peers.remove(index))
    }

    /// Replace the roster wholesale with `snapshot`.
    ///
    /// Afterwards the roster holds exactly the snapshot's names. Peers present
    /// before and after keep their ids; later duplicates of a name in the
    /// snapshot are ignored.
    pub fn replace(&mut self, snapshot: Vec<Candidate>) -> RosterDiff {
        let mut diff = RosterDiff::default();

        let mut retained = Vec::with_capacity(snapshot.len());
        for peer in std::mem::take(&mut self.peers) {
            if snapshot.iter().any(|c| c.name == peer.name) {
                retained.push(peer);
            } else {
                diff.left.push(peer.summary());
            }
        }
        self.peers = retained;

        let mut seen = BTreeSet::new();
        for candidate in snapshot {
            if !seen.insert(candidate.name.clone()) {
                continue;
            }
            if let Insertion::Added(summary) = self.insert(candidate) {
                diff.joined.push(summary);
            }
        }

        diff
    }

    /// Remove every peer.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    fn lowest_free_id(&self) -> u32 {
        let used: BTreeSet<u32> = self.peers.iter().map(|p| p.id).collect();
        (FIRST_PEER_ID..).find(|id| !used.contains(id)).unwrap_or(FIRST_PEER_ID)
    }
}
