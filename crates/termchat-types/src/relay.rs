//! Relay channel naming and the wire format of relayed payloads.
//!
//! A payload is a `|`-delimited string. A chat message has three fields
//! (`sender|timestamp|body`) and a close signal has two (`sender|/close`), so
//! the two are told apart by arity. The body is the last field and may itself
//! contain `|`.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::chat::ChatIdentity;
use crate::error::RelayPayloadError;

/// Field delimiter of the relay wire format.
pub const FIELD_DELIMITER: char = '|';

/// Second field of a close-control payload.
pub const CLOSE_MARKER: &str = "/close";

/// Named broadcast topic on the relay bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelayChannel(String);

impl RelayChannel {
    /// Channel tied to a persisted chat: `chat:{id}`.
    pub fn durable(chat: ChatIdentity) -> Self {
        Self(format!("chat:{chat}"))
    }

    /// Channel for a chat with no persistence: `tempchat:{lo}:{hi}`.
    ///
    /// Handles are trimmed and lower-cased, then ordered, so both participants
    /// derive the same name.
    pub fn ephemeral(a: &str, b: &str) -> Self {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("tempchat:{lo}:{hi}"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelayChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded relay payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPayload {
    Message {
        sender: String,
        timestamp: DateTime<Utc>,
        body: String,
    },
    Close {
        sender: String,
    },
}

impl RelayPayload {
    pub fn message(sender: impl Into<String>, timestamp: DateTime<Utc>, body: impl Into<String>) -> Self {
        RelayPayload::Message {
            sender: sender.into(),
            timestamp,
            body: body.into(),
        }
    }

    pub fn close(sender: impl Into<String>) -> Self {
        RelayPayload::Close {
            sender: sender.into(),
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            RelayPayload::Message { sender, .. } | RelayPayload::Close { sender } => sender,
        }
    }

    /// Encode to the wire format. Timestamps travel as unix milliseconds.
    pub fn encode(&self) -> String {
        match self {
            RelayPayload::Message {
                sender,
                timestamp,
                body,
            } => format!(
                "{sender}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{body}",
                timestamp.timestamp_millis()
            ),
            RelayPayload::Close { sender } => format!("{sender}{FIELD_DELIMITER}{CLOSE_MARKER}"),
        }
    }

    /// Decode a wire payload.
    ///
    /// Two fields must carry the close marker; three fields are a message with
    /// a millisecond timestamp. Anything else is rejected.
    pub fn parse(raw: &str) -> Result<Self, RelayPayloadError> {
        let fields: Vec<&str> = raw.splitn(3, FIELD_DELIMITER).collect();
        match fields.as_slice() {
            [sender, marker] if *marker == CLOSE_MARKER && !sender.is_empty() => {
                Ok(RelayPayload::close(*sender))
            }
            [sender, ts, body] if !sender.is_empty() => {
                let millis: i64 = ts.parse().map_err(|_| RelayPayloadError::Timestamp)?;
                let timestamp =
                    DateTime::from_timestamp_millis(millis).ok_or(RelayPayloadError::Timestamp)?;
                Ok(RelayPayload::message(*sender, timestamp, *body))
            }
            other => Err(RelayPayloadError::FieldCount(other.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_channel_name() {
        assert_eq!(RelayChannel::durable(ChatIdentity(12)).name(), "chat:12");
    }

    #[test]
    fn test_ephemeral_channel_is_symmetric() {
        let ab = RelayChannel::ephemeral("Bob", " alice ");
        let ba = RelayChannel::ephemeral("alice", "bob");
        assert_eq!(ab, ba);
        assert_eq!(ab.name(), "tempchat:alice:bob");
    }

    #[test]
    fn test_message_payload_has_three_fields() {
        let ts = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let payload = RelayPayload::message("alice", ts, "hi there");
        let wire = payload.encode();
        assert_eq!(wire, "alice|1700000000123|hi there");
        assert_eq!(RelayPayload::parse(&wire).unwrap(), payload);
    }

    #[test]
    fn test_body_may_contain_delimiter() {
        let parsed = RelayPayload::parse("bob|0|a|b|c").unwrap();
        match parsed {
            RelayPayload::Message { body, .. } => assert_eq!(body, "a|b|c"),
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_close_payload_has_two_fields() {
        let wire = RelayPayload::close("bob").encode();
        assert_eq!(wire, "bob|/close");
        assert_eq!(RelayPayload::parse(&wire).unwrap(), RelayPayload::close("bob"));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert_eq!(
            RelayPayload::parse("no-delimiter"),
            Err(RelayPayloadError::FieldCount(1))
        );
        assert_eq!(
            RelayPayload::parse("bob|hello"),
            Err(RelayPayloadError::FieldCount(2))
        );
        assert_eq!(
            RelayPayload::parse("bob|yesterday|hi"),
            Err(RelayPayloadError::Timestamp)
        );
        assert!(RelayPayload::parse("|/close").is_err());
    }
}
