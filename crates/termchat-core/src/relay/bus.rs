//! Relay bus with named broadcast channels.
//!
//! Each channel is a `broadcast` sender stored in a `DashMap` keyed by channel
//! name. Subscribing creates the channel on demand; dropping the last
//! `Subscription` removes it again. Delivery is at-most-once: nothing is
//! retained for late subscribers and a slow subscriber that falls behind the
//! buffer loses the overflow.

use std::sync::Arc;

use dashmap::DashMap;
use termchat_types::relay::{RelayChannel, RelayPayload};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default per-channel buffer size.
pub const DEFAULT_CAPACITY: usize = 1024;

type ChannelMap = DashMap<String, broadcast::Sender<String>>;

/// Publish/subscribe fan-out keyed by relay channel name.
#[derive(Clone)]
pub struct RelayBus {
    channels: Arc<ChannelMap>,
    capacity: usize,
}

impl RelayBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a channel, creating it if it does not exist.
    ///
    /// Only payloads published after this call are delivered.
    pub fn subscribe(&self, channel: &RelayChannel) -> Subscription {
        let receiver = self
            .channels
            .entry(channel.name().to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        debug!(channel = %channel, "subscribed to relay channel");
        Subscription {
            channel: channel.name().to_string(),
            receiver,
            channels: Arc::clone(&self.channels),
        }
    }

    /// Publish a raw payload. Returns the number of subscribers reached.
    ///
    /// Publishing to a channel nobody listens on is not an error.
    pub fn publish(&self, channel: &RelayChannel, payload: String) -> usize {
        let Some(sender) = self.channels.get(channel.name()) else {
            debug!(channel = %channel, "no subscribers, payload dropped");
            return 0;
        };
        match sender.send(payload) {
            Ok(count) => {
                debug!(channel = %channel, count, "published relay payload");
                count
            }
            Err(_) => {
                debug!(channel = %channel, "no active subscribers on channel");
                0
            }
        }
    }

    pub fn publish_payload(&self, channel: &RelayChannel, payload: &RelayPayload) -> usize {
        self.publish(channel, payload.encode())
    }

    /// Number of channels that currently have at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for RelayBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for RelayBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayBus")
            .field("channels", &self.channels.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Inbound side of a relay channel.
///
/// Dropping the subscription unsubscribes; the channel entry is removed with
/// the last subscriber.
pub struct Subscription {
    channel: String,
    receiver: broadcast::Receiver<String>,
    channels: Arc<ChannelMap>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next payload.
    ///
    /// Returns `None` once the channel is gone. Payloads lost to lag are
    /// skipped. Cancel safe.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "relay subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Our own receiver is still alive here, hence `<= 1`.
        let removed = self
            .channels
            .remove_if(&self.channel, |_, sender| sender.receiver_count() <= 1)
            .is_some();
        if removed {
            debug!(channel = %self.channel, "relay channel pruned");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use termchat_types::chat::ChatIdentity;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = RelayBus::default();
        let channel = RelayChannel::durable(ChatIdentity(1));
        let mut a = bus.subscribe(&channel);
        let mut b = bus.subscribe(&channel);

        assert_eq!(bus.publish(&channel, "alice|0|hi".to_string()), 2);
        assert_eq!(a.recv().await.as_deref(), Some("alice|0|hi"));
        assert_eq!(b.recv().await.as_deref(), Some("alice|0|hi"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_returns_zero() {
        let bus = RelayBus::default();
        let channel = RelayChannel::ephemeral("a", "b");
        assert_eq!(bus.publish(&channel, "x|/close".to_string()), 0);
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn late_subscriber_sees_no_history() {
        let bus = RelayBus::default();
        let channel = RelayChannel::durable(ChatIdentity(2));
        let _early = bus.subscribe(&channel);
        bus.publish(&channel, "before".to_string());

        let mut late = bus.subscribe(&channel);
        bus.publish(&channel, "after".to_string());
        assert_eq!(late.recv().await.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = RelayBus::default();
        let one = RelayChannel::durable(ChatIdentity(1));
        let two = RelayChannel::durable(ChatIdentity(2));
        let mut sub_two = bus.subscribe(&two);
        let _sub_one = bus.subscribe(&one);

        bus.publish(&one, "for one".to_string());
        let got = tokio::time::timeout(Duration::from_millis(50), sub_two.recv()).await;
        assert!(got.is_err(), "channel two must not see channel one traffic");
    }

    #[tokio::test]
    async fn dropping_last_subscription_prunes_channel() {
        let bus = RelayBus::default();
        let channel = RelayChannel::ephemeral("alice", "bob");
        let a = bus.subscribe(&channel);
        let b = bus.subscribe(&channel);
        assert_eq!(bus.channel_count(), 1);

        drop(a);
        assert_eq!(bus.channel_count(), 1);
        drop(b);
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_lost_payloads() {
        let bus = RelayBus::new(2);
        let channel = RelayChannel::durable(ChatIdentity(3));
        let mut sub = bus.subscribe(&channel);
        for i in 0..5 {
            bus.publish(&channel, format!("m{i}"));
        }
        // Buffer holds the two newest payloads.
        assert_eq!(sub.recv().await.as_deref(), Some("m3"));
        assert_eq!(sub.recv().await.as_deref(), Some("m4"));
    }

    #[tokio::test]
    async fn publish_payload_encodes_wire_format() {
        let bus = RelayBus::default();
        let channel = RelayChannel::ephemeral("alice", "bob");
        let mut sub = bus.subscribe(&channel);
        bus.publish_payload(&channel, &RelayPayload::close("alice"));
        assert_eq!(sub.recv().await.as_deref(), Some("alice|/close"));
    }

    #[test]
    fn debug_impl() {
        let bus = RelayBus::default();
        let debug = format!("{bus:?}");
        assert!(debug.contains("RelayBus"));
        assert!(debug.contains("channels"));
    }
}
