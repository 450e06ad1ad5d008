//! Superdesk Live - live-data client core for the Superdesk newsroom CMS.
//!
//! Keeps in-memory views of backend resources in step with the server:
//! a prioritised request queue in front of the REST API, providers and live
//! containers that refetch or patch on change notifications, and a
//! reconnecting proxy for the notification WebSocket.

pub mod adapters;
pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
