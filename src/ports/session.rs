//! Session Port - the authenticated user session.
//!
//! Login and logout are observed through a watch channel: the WebSocket
//! proxy connects while a session is present and closes when it goes away.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use tokio::sync::watch;

use crate::domain::notification::Identity;

/// An authenticated session.
pub struct Session {
    pub id: String,
    pub identity: Identity,
    token: Secret<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, identity: Identity, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identity,
            token: Secret::new(token.into()),
        }
    }

    /// Bearer token for backend requests.
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Port for reading the current session and following its changes.
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Option<Arc<Session>>;

    /// Receives `Some` on login and `None` on logout.
    fn subscribe(&self) -> watch::Receiver<Option<Arc<Session>>>;
}
