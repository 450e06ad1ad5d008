//! Notification channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct WebsocketConfig {
    /// Delay between reconnection attempts in seconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    /// Per-channel capacity of the in-process notification bus
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

impl WebsocketConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reconnect_interval_secs == 0 || self.reconnect_interval_secs > 600 {
            return Err(ValidationError::InvalidInterval("reconnect"));
        }
        if self.bus_capacity < 16 {
            return Err(ValidationError::InvalidBusCapacity);
        }
        Ok(())
    }
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_secs: default_reconnect_interval(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

fn default_reconnect_interval() -> u64 {
    5
}

fn default_bus_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_defaults() {
        let config = WebsocketConfig::default();
        assert_eq!(config.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(config.bus_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tiny_bus_rejected() {
        let config = WebsocketConfig {
            bus_capacity: 4,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBusCapacity));
    }
}
