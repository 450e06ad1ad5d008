//! tokio-tungstenite client for the notification server.

use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::{future, SinkExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::ports::{SocketCloser, SocketConnection, SocketError, WebsocketConnector};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WebsocketConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<SocketConnection, SocketError> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        debug!(url, "WebSocket handshake complete");

        let (sink, stream) = socket.split();

        let frames = stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => String::from_utf8(bytes).ok().map(Ok),
                    Ok(_) => None,
                    Err(err) => Some(Err(SocketError::Protocol(err.to_string()))),
                })
            });

        Ok(SocketConnection {
            frames: Box::pin(frames),
            closer: Box::new(TungsteniteCloser { sink }),
        })
    }
}

struct TungsteniteCloser {
    sink: SplitSink<Socket, Message>,
}

#[async_trait]
impl SocketCloser for TungsteniteCloser {
    async fn close(mut self: Box<Self>) {
        if let Err(err) = self.sink.send(Message::Close(None)).await {
            debug!(error = %err, "Close frame not sent");
        }
        let _ = self.sink.close().await;
    }
}
