//! Event fan-out adapters.
//!
//! - `BroadcastNotificationBus` - in-process `NotificationBus` over tokio broadcast channels

mod notification_bus;

pub use notification_bus::BroadcastNotificationBus;
