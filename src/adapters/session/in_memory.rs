//! Session store backed by a watch channel.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::ports::{Session, SessionProvider};

/// Holds the current session; `login`/`logout` notify subscribers.
pub struct InMemorySession {
    sender: watch::Sender<Option<Arc<Session>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Starts logged in.
    pub fn with_session(session: Session) -> Self {
        let (sender, _) = watch::channel(Some(Arc::new(session)));
        Self { sender }
    }

    pub fn login(&self, session: Session) {
        info!(session_id = %session.id, user_id = %session.identity.user_id, "Session started");
        self.sender.send_replace(Some(Arc::new(session)));
    }

    pub fn logout(&self) {
        if self.sender.send_replace(None).is_some() {
            info!("Session ended");
        }
    }
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProvider for InMemorySession {
    fn current(&self) -> Option<Arc<Session>> {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Arc<Session>>> {
        self.sender.subscribe()
    }
}
