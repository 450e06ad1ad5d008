//! Notification server connection.
//!
//! - [`connector`] - `WebsocketConnector` over tokio-tungstenite
//! - [`proxy`] - reconnecting proxy that feeds the notification bus

pub mod connector;
pub mod proxy;

pub use connector::TungsteniteConnector;
pub use proxy::{WebSocketProxy, WebSocketProxyConfig, WebSocketProxyHandle};
