//! WebSocketProxy - the single connection to the notification server.
//!
//! ## Lifecycle
//!
//! 1. Waits for a session (login)
//! 2. Connects and publishes `Connected`
//! 3. Decodes every frame and publishes it on the bus
//! 4. On close publishes `Disconnected` and retries every `reconnect_interval`
//!    while a session is active
//! 5. Logout closes the connection; shutdown closes it and stops
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `url` | - | Notification server URL (`ws://` or `wss://`) |
//! | `reconnect_interval` | 5s | Delay between reconnect attempts |

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, WebsocketConfig};
use crate::domain::notification::{ConnectionStatus, Notification, WebsocketMessage};
use crate::ports::{
    FrameStream, NotificationBus, Session, SessionProvider, WebsocketConnector,
};

/// Configuration for the WebSocketProxy.
#[derive(Debug, Clone)]
pub struct WebSocketProxyConfig {
    pub url: String,
    pub reconnect_interval: Duration,
}

impl WebSocketProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_interval: Duration::from_secs(5),
        }
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Endpoint from the server section, retry pacing from the websocket one.
    pub fn from_config(server: &ServerConfig, websocket: &WebsocketConfig) -> Self {
        Self::new(server.websocket_url.as_str()).with_reconnect_interval(websocket.reconnect_interval())
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Closed,
    LoggedOut,
    Shutdown,
}

pub struct WebSocketProxy {
    connector: Arc<dyn WebsocketConnector>,
    session: Arc<dyn SessionProvider>,
    bus: Arc<dyn NotificationBus>,
    config: WebSocketProxyConfig,
    status: watch::Sender<ConnectionStatus>,
}

impl WebSocketProxy {
    pub fn new(
        connector: Arc<dyn WebsocketConnector>,
        session: Arc<dyn SessionProvider>,
        bus: Arc<dyn NotificationBus>,
        config: WebSocketProxyConfig,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Unknown);
        Self {
            connector,
            session,
            bus,
            config,
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Runs the proxy on its own task.
    pub fn spawn(self) -> WebSocketProxyHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let status = self.status();
        let task = tokio::spawn(async move { self.run(shutdown_rx).await });
        WebSocketProxyHandle {
            shutdown,
            status,
            task,
        }
    }

    /// Run the connection loop until shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut sessions = self.session.subscribe();

        loop {
            // A dropped handle counts as shutdown.
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                return;
            }

            if sessions.borrow_and_update().is_none() {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
                continue;
            }

            let connection = tokio::select! {
                _ = shutdown.changed() => continue,
                connection = self.connector.connect(&self.config.url) => connection,
            };

            match connection {
                Ok(mut connection) => {
                    info!(url = %self.config.url, "Connected to notification server");
                    self.set_status(ConnectionStatus::Connected);

                    let end = self
                        .pump(&mut connection.frames, &mut sessions, &mut shutdown)
                        .await;
                    if end != ConnectionEnd::Closed {
                        connection.closer.close().await;
                    }

                    info!(reason = ?end, "Disconnected from notification server");
                    self.set_status(ConnectionStatus::Disconnected);

                    if end != ConnectionEnd::Closed {
                        continue;
                    }
                }
                Err(err) => {
                    warn!(url = %self.config.url, error = %err, "Notification server unreachable");
                    self.set_status(ConnectionStatus::Disconnected);
                }
            }

            self.wait_to_reconnect(&mut sessions, &mut shutdown).await;
        }
    }

    /// Sleeps for the reconnect interval. Returns early on shutdown or when
    /// a new session arrives.
    async fn wait_to_reconnect(
        &self,
        sessions: &mut watch::Receiver<Option<Arc<Session>>>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        debug!(interval = ?self.config.reconnect_interval, "Scheduling reconnect");
        let sleep = time::sleep(self.config.reconnect_interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return,
                _ = shutdown.changed() => return,
                changed = sessions.changed() => {
                    if changed.is_err() || sessions.borrow().is_some() {
                        return;
                    }
                }
            }
        }
    }

    async fn pump(
        &self,
        frames: &mut FrameStream,
        sessions: &mut watch::Receiver<Option<Arc<Session>>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectionEnd {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return ConnectionEnd::Shutdown,
                changed = sessions.changed() => {
                    if changed.is_err() || sessions.borrow().is_none() {
                        return ConnectionEnd::LoggedOut;
                    }
                }
                frame = frames.next() => match frame {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(err)) => {
                        warn!(error = %err, "Notification socket error");
                        return ConnectionEnd::Closed;
                    }
                    None => return ConnectionEnd::Closed,
                },
            }
        }
    }

    /// Publishes one frame: external topic first when the message is public
    /// or addressed to an extension, then the internal bus, then `Reload`
    /// for administrative events.
    fn dispatch(&self, text: &str) {
        let message = match WebsocketMessage::parse(text) {
            Ok(message) => Arc::new(message),
            Err(err) => {
                warn!(error = %err, "Skipping undecodable notification frame");
                return;
            }
        };

        if let Some(topic) = message.external_topic() {
            self.bus.publish_external(&topic, Arc::clone(&message));
        }

        let notification = Notification::from_message(message);
        let reload = notification.admin_event().cloned();
        self.bus.publish(notification);

        if let Some(admin) = reload {
            debug!(event = %admin.kind, "Administrative event received");
            self.bus.publish(Notification::Reload(admin));
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        match status {
            ConnectionStatus::Connected => self.bus.publish(Notification::Connected),
            // Repeated failed attempts stay a single disconnect.
            ConnectionStatus::Disconnected if previous != ConnectionStatus::Disconnected => {
                self.bus.publish(Notification::Disconnected)
            }
            _ => {}
        }
    }
}

/// Handle to a spawned proxy.
pub struct WebSocketProxyHandle {
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<ConnectionStatus>,
    task: JoinHandle<()>,
}

impl WebSocketProxyHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_updates(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Closes the connection and waits for the loop to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "WebSocket proxy task failed");
        }
    }
}
