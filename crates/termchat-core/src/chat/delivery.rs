//! Classification of relay payloads arriving at a chat listener.

use chrono::{DateTime, Utc};
use termchat_types::chat::ChatMode;
use termchat_types::relay::RelayPayload;
use tracing::debug;

/// What a listener should do with one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Show a partner's message.
    Show {
        sender: String,
        timestamp: DateTime<Utc>,
        body: String,
    },
    /// The partner left an ephemeral chat.
    PeerLeft(String),
    /// Our own echo, a malformed payload, or a close signal in a durable chat.
    Skip,
}

/// Decide how a listener owned by `me` handles `raw`.
///
/// Handles are compared case-insensitively, matching the ephemeral channel
/// naming.
pub fn classify(raw: &str, me: &str, mode: ChatMode) -> Delivery {
    let payload = match RelayPayload::parse(raw) {
        Ok(payload) => payload,
        Err(err) => {
            debug!(error = %err, "discarding malformed relay payload");
            return Delivery::Skip;
        }
    };

    if payload.sender().eq_ignore_ascii_case(me) {
        return Delivery::Skip;
    }

    match (payload, mode) {
        (
            RelayPayload::Message {
                sender,
                timestamp,
                body,
            },
            _,
        ) => Delivery::Show {
            sender,
            timestamp,
            body,
        },
        (RelayPayload::Close { sender }, ChatMode::Ephemeral) => Delivery::PeerLeft(sender),
        (RelayPayload::Close { .. }, ChatMode::Durable) => Delivery::Skip,
    }
}
