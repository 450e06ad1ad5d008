//! WebSocket Port - connecting to the notification server.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

/// Text frames of one connection. The stream ends when the connection closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, SocketError>> + Send>>;

/// An open connection: incoming frames plus a handle to close it.
pub struct SocketConnection {
    pub frames: FrameStream,
    pub closer: Box<dyn SocketCloser>,
}

/// Closes a connection from the client side.
#[async_trait]
pub trait SocketCloser: Send {
    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait WebsocketConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<SocketConnection, SocketError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connection error: {0}")]
    Protocol(String),
}
