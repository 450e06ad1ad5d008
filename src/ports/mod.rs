//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the live-data core and the outside world. Adapters implement these ports.
//!
//! - `HttpTransport` - JSON requests against the REST backend
//! - `DataApi` / `DataApiExt` - CRUD over Eve resources
//! - `SessionProvider` - current session and login/logout changes
//! - `WebsocketConnector` - notification server connections
//! - `NotificationBus` - in-process fan-out of notifications

mod data_api;
mod http_transport;
mod notification_bus;
mod session;
mod websocket;

pub use data_api::{DataApi, DataApiExt};
pub use http_transport::{HttpMethod, HttpRequest, HttpTransport, NetworkError};
pub use notification_bus::NotificationBus;
pub use session::{Session, SessionProvider};
pub use websocket::{FrameStream, SocketCloser, SocketConnection, SocketError, WebsocketConnector};
