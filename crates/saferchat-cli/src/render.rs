//! Plain-text rendering of session notices.

use saferchat_client::{EntryKind, LogEntry, Notice, PeerSummary, Sender, SessionError};

/// One log entry as a terminal line.
pub fn entry(entry: &LogEntry) -> String {
    let content = entry.content.as_deref().unwrap_or_default();
    match (&entry.sender, entry.kind) {
        (Sender::System, _) => format!("* {content}"),
        (Sender::Local { name }, EntryKind::Text) => format!("<{name}> {content}"),
        (Sender::Peer { id, name }, EntryKind::Text) => format!("<{name}#{id}> {content}"),
        (Sender::Unknown { name }, EntryKind::Text) => format!("<{name}?> {content}"),
        (sender, EntryKind::Joined) => format!("* {} joined", sender.name().unwrap_or_default()),
        (sender, EntryKind::Left) => format!("* {} left", sender.name().unwrap_or_default()),
    }
}

/// A notice as terminal text. Roster snapshots print nothing; they are
/// shown on `/peers`.
pub fn notice(notice: &Notice) -> Option<String> {
    let line = match notice {
        Notice::Entry(e) => entry(e),
        Notice::Roster(_) => return None,
        Notice::Joined { channel, resumed: false } => format!("-- joined #{channel}"),
        Notice::Joined { channel, resumed: true } => format!("-- rejoined #{channel}"),
        Notice::Rejected { reason } => format!("-- refused by relay: {reason} (try /join again)"),
        Notice::ConnectionLost { cause } => format!("-- server not available ({cause}), reconnecting"),
        Notice::ConnectionRestored => "-- connection restored".to_string(),
        Notice::Left { channel } => format!("-- left #{channel}"),
    };
    Some(line)
}

/// The roster table printed by `/peers`.
pub fn peers(peers: &[PeerSummary]) -> String {
    if peers.is_empty() {
        return "-- no peers".to_string();
    }

    peers
        .iter()
        .map(|peer| format!("{:>3}  {:<16} {}", peer.id, peer.name, peer.fingerprint))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A locally refused request.
pub fn refusal(error: &SessionError) -> String {
    format!("!! {error}")
}
