//! Chat identities and stored messages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text shown in place of a message body that failed to decrypt.
pub const DECRYPTION_FAILED_PLACEHOLDER: &str = "[decryption failed]";

/// Timestamp layout used when rendering messages to a terminal.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical key for an unordered pair of participants.
///
/// The same pair always maps to the same identity regardless of which
/// participant is named first. Identities are created lazily by the store
/// and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatIdentity(pub i64);

impl ChatIdentity {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order two participant ids ascending, the storage order of a chat pair.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Kind of chat a stored message belongs to. Only personal chats are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Personal,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Personal => "personal",
        }
    }
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(ChatKind::Personal),
            other => Err(format!("unknown chat kind: '{other}'")),
        }
    }
}

/// How an interactive chat treats the lines typed into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Persisted and relayed; history is replayed on entry.
    Durable,
    /// Relayed only, never persisted.
    Ephemeral,
}

/// A stored message with its body already decrypted.
///
/// `content` is produced at read time. When the stored ciphertext cannot be
/// opened it holds [`DECRYPTION_FAILED_PLACEHOLDER`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub chat_id: ChatIdentity,
    pub kind: ChatKind,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Render as `[timestamp] sender: body`, labelling the viewer's own messages `You`.
    pub fn render_for(&self, viewer_id: i64) -> String {
        let who = if self.sender_id == viewer_id {
            "You"
        } else {
            self.sender_name.as_str()
        };
        format!(
            "[{}] {}: {}",
            self.sent_at.format(DISPLAY_TIME_FORMAT),
            who,
            self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(sender_id: i64) -> Message {
        Message {
            id: 1,
            sender_id,
            sender_name: "alice".to_string(),
            chat_id: ChatIdentity(7),
            kind: ChatKind::Personal,
            content: "hello".to_string(),
            sent_at: Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap(),
        }
    }

    #[test]
    fn test_canonical_pair_is_symmetric() {
        assert_eq!(canonical_pair(3, 9), (3, 9));
        assert_eq!(canonical_pair(9, 3), (3, 9));
        assert_eq!(canonical_pair(4, 4), (4, 4));
    }

    #[test]
    fn test_chat_kind_roundtrip() {
        let kind: ChatKind = "personal".parse().unwrap();
        assert_eq!(kind, ChatKind::Personal);
        assert_eq!(kind.to_string(), "personal");
        assert!("group".parse::<ChatKind>().is_err());
    }

    #[test]
    fn test_render_labels_own_messages() {
        let msg = sample(1);
        assert_eq!(msg.render_for(1), "[2025-03-04 05:06:07] You: hello");
        assert_eq!(msg.render_for(2), "[2025-03-04 05:06:07] alice: hello");
    }

    #[test]
    fn test_chat_identity_display() {
        assert_eq!(ChatIdentity(42).to_string(), "42");
        assert_eq!(ChatIdentity(42).get(), 42);
    }
}
