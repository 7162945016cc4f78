//! ChatService: message store plus relay bus.
//!
//! Generic over `MessageStore` so core stays free of database code. Every
//! user-facing chat operation (entering a durable chat, posting into one,
//! ephemeral relay, one-shot sends) goes through here.

use chrono::Utc;
use termchat_types::chat::{ChatIdentity, Message};
use termchat_types::error::StoreError;
use termchat_types::relay::{RelayChannel, RelayPayload};
use tracing::debug;

use crate::relay::{RelayBus, Subscription};
use crate::repository::message::MessageStore;

/// A durable chat ready to be entered.
#[derive(Debug)]
pub struct DurableChat {
    pub chat: ChatIdentity,
    pub channel: RelayChannel,
    pub history: Vec<Message>,
}

pub struct ChatService<S: MessageStore> {
    store: S,
    bus: RelayBus,
}

impl<S: MessageStore> ChatService<S> {
    pub fn new(store: S, bus: RelayBus) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &RelayBus {
        &self.bus
    }

    /// Resolve the pair's chat identity and load its full history.
    pub async fn open_durable(&self, me: &str, partner: &str) -> Result<DurableChat, StoreError> {
        let chat = self.store.resolve_chat_identity(me, partner).await?;
        let history = self.store.history(me, partner).await?;
        Ok(DurableChat {
            chat,
            channel: RelayChannel::durable(chat),
            history,
        })
    }

    pub fn subscribe(&self, channel: &RelayChannel) -> Subscription {
        self.bus.subscribe(channel)
    }

    /// Persist a line typed into a durable chat, then relay it.
    ///
    /// Nothing is published if the append fails.
    pub async fn post_durable(
        &self,
        me: &str,
        chat: ChatIdentity,
        body: &str,
    ) -> Result<Message, StoreError> {
        let message = self.store.append(me, chat, body).await?;
        let payload = RelayPayload::message(&message.sender_name, message.sent_at, body);
        let reached = self
            .bus
            .publish_payload(&RelayChannel::durable(chat), &payload);
        debug!(chat = %chat, message_id = message.id, reached, "durable message posted");
        Ok(message)
    }

    /// Relay a line typed into an ephemeral chat. Never persisted.
    pub fn post_ephemeral(&self, me: &str, partner: &str, body: &str) -> usize {
        let payload = RelayPayload::message(me, Utc::now(), body);
        self.bus
            .publish_payload(&RelayChannel::ephemeral(me, partner), &payload)
    }

    /// Tell the partner of an ephemeral chat that we left.
    pub fn close_ephemeral(&self, me: &str, partner: &str) -> usize {
        self.bus.publish_payload(
            &RelayChannel::ephemeral(me, partner),
            &RelayPayload::close(me),
        )
    }

    /// One-shot persisted message. Not relayed: the receiver sees it in
    /// history the next time they open the chat.
    pub async fn send_direct(
        &self,
        sender: &str,
        receiver: &str,
        body: &str,
    ) -> Result<Message, StoreError> {
        let chat = self.store.resolve_chat_identity(sender, receiver).await?;
        self.store.append(sender, chat, body).await
    }
}

impl<S: MessageStore> std::fmt::Debug for ChatService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
