//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the live-data core to external systems:
//! - `http` - REST transport (reqwest, scripted mock)
//! - `session` - session store
//! - `events` - notification bus
//! - `websocket` - notification server connection and proxy

pub mod events;
pub mod http;
pub mod session;
pub mod websocket;

pub use events::BroadcastNotificationBus;
pub use http::{MockTransport, ReqwestTransport, ReqwestTransportConfig};
pub use session::InMemorySession;
pub use websocket::{TungsteniteConnector, WebSocketProxy, WebSocketProxyConfig, WebSocketProxyHandle};
