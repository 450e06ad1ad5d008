//! Broadcast notification bus.
//!
//! One `tokio::sync::broadcast` channel carries every notification; per-kind
//! and per-topic channels are created on first subscription and dropped once
//! their last receiver is gone.
//!
//! ```text
//! publish(n) ──► all ──────────────► subscribe()
//!            └─► kinds[n.kind()] ──► subscribe_kind(kind)
//! publish_external(topic, m) ──► external[topic] ──► subscribe_external(topic)
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::domain::notification::{Notification, NotificationKind, WebsocketMessage};
use crate::ports::NotificationBus;

/// Fan-out bus for notification channel events.
///
/// Publishing never blocks. A receiver that falls more than
/// `channel_capacity` messages behind observes `RecvError::Lagged`.
pub struct BroadcastNotificationBus {
    all: broadcast::Sender<Notification>,
    kinds: RwLock<HashMap<NotificationKind, broadcast::Sender<Notification>>>,
    external: RwLock<HashMap<String, broadcast::Sender<Arc<WebsocketMessage>>>>,
    channel_capacity: usize,
}

impl BroadcastNotificationBus {
    pub fn new(channel_capacity: usize) -> Self {
        let capacity = channel_capacity.max(1);
        let (all, _) = broadcast::channel(capacity);
        Self {
            all,
            kinds: RwLock::new(HashMap::new()),
            external: RwLock::new(HashMap::new()),
            channel_capacity: capacity,
        }
    }

    /// Create with default capacity (256 messages).
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Number of live per-kind channels.
    pub fn kind_channel_count(&self) -> usize {
        self.kinds.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn subscribe_in<K, T>(
        &self,
        channels: &RwLock<HashMap<K, broadcast::Sender<T>>>,
        key: K,
    ) -> broadcast::Receiver<T>
    where
        K: Eq + Hash,
        T: Clone,
    {
        let mut channels = channels.write().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }
}

impl Default for BroadcastNotificationBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Sends on the keyed channel, removing it when nobody listens anymore.
fn send_keyed<K, T>(channels: &RwLock<HashMap<K, broadcast::Sender<T>>>, key: &K, value: T)
where
    K: Eq + Hash,
{
    let orphaned = {
        let channels = channels.read().unwrap_or_else(|e| e.into_inner());
        match channels.get(key) {
            Some(sender) => sender.send(value).is_err(),
            None => false,
        }
    };

    if orphaned {
        let mut channels = channels.write().unwrap_or_else(|e| e.into_inner());
        if channels
            .get(key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(key);
        }
    }
}

impl NotificationBus for BroadcastNotificationBus {
    fn publish(&self, notification: Notification) {
        let kind = notification.kind();
        send_keyed(&self.kinds, &kind, notification.clone());
        // No receivers is not an error for a broadcast.
        let _ = self.all.send(notification);
    }

    fn publish_external(&self, topic: &str, message: Arc<WebsocketMessage>) {
        send_keyed(&self.external, &topic.to_string(), message);
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.all.subscribe()
    }

    fn subscribe_kind(&self, kind: NotificationKind) -> broadcast::Receiver<Notification> {
        self.subscribe_in(&self.kinds, kind)
    }

    fn subscribe_external(&self, topic: &str) -> broadcast::Receiver<Arc<WebsocketMessage>> {
        self.subscribe_in(&self.external, topic.to_string())
    }
}
