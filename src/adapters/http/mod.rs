//! HTTP transport adapters.
//!
//! - `ReqwestTransport` - production transport over reqwest
//! - `MockTransport` - scripted transport for tests

mod mock_transport;
mod reqwest_transport;

pub use mock_transport::MockTransport;
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportConfig};
