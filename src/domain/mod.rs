//! Domain layer: pure types and algorithms of the live-data client.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, state machines)
//! - `query` - Query descriptors, filters and their Elasticsearch/Eve renderings
//! - `collection` - REST list responses and live item collections
//! - `changes` - Resource change events, subscriptions and reconciliation plans
//! - `patch` - Merge-patch generation for item updates
//! - `notification` - Notification channel messages, reload policy, connection state

pub mod changes;
pub mod collection;
pub mod foundation;
pub mod notification;
pub mod patch;
pub mod query;
