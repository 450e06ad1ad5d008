//! User-facing side of the notification channel.
//!
//! - `ConnectionNotifier` - connection status and the notices shown for it
//! - `ReloadWatcher` - turns administrative events into reload actions

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::notification::{
    vocabulary_warning, ConnectionStatus, Notification, NotificationKind, ReloadAction,
    ReloadContext, ReloadPolicy,
};
use crate::ports::{NotificationBus, SessionProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub text: String,
}

impl UserNotice {
    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ConnectionNotifier
// ════════════════════════════════════════════════════════════════════════════

/// Follows the bus and reports connection changes once per transition.
pub struct ConnectionNotifier {
    status: watch::Receiver<ConnectionStatus>,
    notices: mpsc::UnboundedReceiver<UserNotice>,
    stop: CancellationToken,
}

impl ConnectionNotifier {
    pub fn start(bus: &dyn NotificationBus, session: Arc<dyn SessionProvider>) -> Self {
        let events = bus.subscribe();
        let (status_tx, status) = watch::channel(ConnectionStatus::Unknown);
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        tokio::spawn(Self::run(events, session, status_tx, notice_tx, stop.clone()));

        Self {
            status,
            notices,
            stop,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_updates(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Next notice, or `None` once stopped.
    pub async fn next_notice(&mut self) -> Option<UserNotice> {
        self.notices.recv().await
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    async fn run(
        mut events: broadcast::Receiver<Notification>,
        session: Arc<dyn SessionProvider>,
        status: watch::Sender<ConnectionStatus>,
        notices: mpsc::UnboundedSender<UserNotice>,
        stop: CancellationToken,
    ) {
        loop {
            let notification = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                event = events.recv() => match event {
                    Ok(notification) => notification,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Connection notifier lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let notice = match &notification {
                Notification::Connected => transition(&status, ConnectionStatus::Connected)
                    .map(|message| UserNotice::new(NoticeLevel::Success, message)),
                Notification::Disconnected => transition(&status, ConnectionStatus::Disconnected)
                    .map(|message| UserNotice::new(NoticeLevel::Error, message)),
                Notification::Server { event, .. } => {
                    let current = session.current();
                    vocabulary_warning(event, current.as_ref().map(|s| &s.identity))
                        .map(|text| UserNotice::new(NoticeLevel::Warning, text))
                }
                Notification::Reload(_) => None,
            };

            if let Some(notice) = notice {
                if notices.send(notice).is_err() {
                    break;
                }
            }
        }
        debug!("Connection notifier stopped");
    }
}

impl Drop for ConnectionNotifier {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Records `next` and returns its message when it differs from the current status.
fn transition(status: &watch::Sender<ConnectionStatus>, next: ConnectionStatus) -> Option<&'static str> {
    let changed = status.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
    if changed {
        info!(status = %next, "Notification channel status changed");
        next.message()
    } else {
        None
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ReloadWatcher
// ════════════════════════════════════════════════════════════════════════════

/// Evaluates `Reload` notifications against the logged-in user and where
/// they are, and emits what the client should do.
pub struct ReloadWatcher {
    actions: mpsc::UnboundedReceiver<ReloadAction>,
    stop: CancellationToken,
}

impl ReloadWatcher {
    /// `context` is kept current by the caller as the user moves around.
    pub fn start(
        bus: &dyn NotificationBus,
        session: Arc<dyn SessionProvider>,
        context: watch::Receiver<ReloadContext>,
    ) -> Self {
        let events = bus.subscribe_kind(NotificationKind::Reload);
        let (action_tx, actions) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        tokio::spawn(Self::run(events, session, context, action_tx, stop.clone()));

        Self { actions, stop }
    }

    /// Next action, or `None` once stopped.
    pub async fn next_action(&mut self) -> Option<ReloadAction> {
        self.actions.recv().await
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    async fn run(
        mut events: broadcast::Receiver<Notification>,
        session: Arc<dyn SessionProvider>,
        context: watch::Receiver<ReloadContext>,
        actions: mpsc::UnboundedSender<ReloadAction>,
        stop: CancellationToken,
    ) {
        let policy = ReloadPolicy;
        loop {
            let notification = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                event = events.recv() => match event {
                    Ok(notification) => notification,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Reload watcher lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let Notification::Reload(event) = &notification else {
                continue;
            };
            let Some(current) = session.current() else {
                debug!(event = %event.kind, "No session, ignoring administrative event");
                continue;
            };

            let action = {
                let context = context.borrow();
                let decision = policy.evaluate(event, &current.identity, &context);
                policy.action(&decision, &context)
            };

            if let Some(action) = action {
                info!(event = %event.kind, ?action, "Administrative change requires reload");
                if actions.send(action).is_err() {
                    break;
                }
            }
        }
        debug!("Reload watcher stopped");
    }
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::BroadcastNotificationBus;
    use crate::adapters::session::InMemorySession;
    use crate::domain::notification::{AdminEvent, AdminEventKind, Identity, WebsocketMessage};
    use crate::ports::Session;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time;

    fn session(user: &str) -> Arc<InMemorySession> {
        Arc::new(InMemorySession::with_session(Session::new(
            "s1",
            Identity::new(user).with_role("editor"),
            "token",
        )))
    }

    async fn settle() {
        time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn reports_each_transition_once() {
        let bus = BroadcastNotificationBus::new(64);
        let mut notifier = ConnectionNotifier::start(&bus, session("u1"));

        bus.publish(Notification::Connected);
        bus.publish(Notification::Connected);
        bus.publish(Notification::Disconnected);
        bus.publish(Notification::Disconnected);
        settle().await;

        assert_eq!(notifier.status(), ConnectionStatus::Disconnected);
        let first = notifier.next_notice().await.unwrap();
        assert_eq!(first.level, NoticeLevel::Success);
        assert_eq!(first.text, "Connected to Notification Server!");
        let second = notifier.next_notice().await.unwrap();
        assert_eq!(second.level, NoticeLevel::Error);
        assert!(notifier.notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn warns_about_vocabulary_changed_by_others() {
        let bus = BroadcastNotificationBus::new(64);
        let mut notifier = ConnectionNotifier::start(&bus, session("u1"));

        bus.publish(Notification::from_message(WebsocketMessage::new(
            "vocabularies:updated",
            json!({"vocabulary": "Genre", "user": "u2"}),
        )));
        bus.publish(Notification::from_message(WebsocketMessage::new(
            "vocabularies:updated",
            json!({"vocabulary": "Genre", "user": "u1"}),
        )));
        settle().await;

        let notice = notifier.next_notice().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.text.starts_with("Genre vocabulary has been updated"));
        assert!(notifier.notices.try_recv().is_err());
    }

    fn reload(kind: AdminEventKind, extra: serde_json::Value) -> Notification {
        Notification::Reload(AdminEvent { kind, extra })
    }

    #[tokio::test(start_paused = true)]
    async fn reload_watcher_applies_policy() {
        let bus = BroadcastNotificationBus::new(64);
        let (context_tx, context) = watch::channel(ReloadContext::default());
        let mut watcher = ReloadWatcher::start(&bus, session("u1"), context);

        bus.publish(reload(AdminEventKind::UserDisabled, json!({"user_id": "u2"})));
        bus.publish(reload(AdminEventKind::UserDisabled, json!({"user_id": "u1"})));
        settle().await;
        assert_eq!(watcher.next_action().await, Some(ReloadAction::Reload));
        assert!(watcher.actions.try_recv().is_err());

        context_tx.send_modify(|context| context.authoring = true);
        bus.publish(reload(AdminEventKind::RolePrivilegesRevoked, json!({"role_id": ["editor"]})));
        settle().await;
        assert_eq!(
            watcher.next_action().await,
            Some(ReloadAction::SaveWork(AdminEventKind::RolePrivilegesRevoked.message()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reload_watcher_ignores_events_without_session() {
        let bus = BroadcastNotificationBus::new(64);
        let (_context_tx, context) = watch::channel(ReloadContext::default());
        let mut watcher =
            ReloadWatcher::start(&bus, Arc::new(InMemorySession::new()), context);

        bus.publish(reload(AdminEventKind::UserDisabled, json!({"user_id": "u1"})));
        settle().await;
        assert!(watcher.actions.try_recv().is_err());

        watcher.stop();
        settle().await;
        assert_eq!(watcher.next_action().await, None);
    }
}
