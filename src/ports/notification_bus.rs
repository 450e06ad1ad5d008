//! Notification Bus Port - in-process fan-out of notification channel events.
//!
//! Replaces string-keyed scope broadcasts: subscribers pick everything, one
//! `NotificationKind`, or an external topic (public and extension-addressed
//! messages).

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::notification::{Notification, NotificationKind, WebsocketMessage};

pub trait NotificationBus: Send + Sync {
    /// Delivers to all matching subscribers. Never blocks; slow subscribers lag.
    fn publish(&self, notification: Notification);

    /// Delivers a raw message to subscribers of an external topic.
    fn publish_external(&self, topic: &str, message: Arc<WebsocketMessage>);

    fn subscribe(&self) -> broadcast::Receiver<Notification>;

    fn subscribe_kind(&self, kind: NotificationKind) -> broadcast::Receiver<Notification>;

    fn subscribe_external(&self, topic: &str) -> broadcast::Receiver<Arc<WebsocketMessage>>;
}
