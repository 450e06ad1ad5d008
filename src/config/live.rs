//! Live data timing

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::{DataProviderConfig, LiveConfig as LiveContainerConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Data provider refetch debounce in milliseconds
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Live container change throttle in milliseconds
    #[serde(default = "default_throttle")]
    pub throttle_ms: u64,
}

impl LiveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn data_provider(&self) -> DataProviderConfig {
        DataProviderConfig::default().with_debounce(self.debounce())
    }

    pub fn containers(&self) -> LiveContainerConfig {
        LiveContainerConfig::default().with_throttle(self.throttle())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.debounce_ms > 60_000 {
            return Err(ValidationError::InvalidInterval("debounce"));
        }
        if self.throttle_ms == 0 || self.throttle_ms > 60_000 {
            return Err(ValidationError::InvalidInterval("throttle"));
        }
        Ok(())
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            throttle_ms: default_throttle(),
        }
    }
}

fn default_debounce() -> u64 {
    1000
}

fn default_throttle() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_defaults() {
        let config = LiveConfig::default();
        assert_eq!(config.debounce(), Duration::from_secs(1));
        assert_eq!(config.containers().throttle, Duration::from_secs(1));
        assert_eq!(config.data_provider().debounce, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_throttle_rejected() {
        let config = LiveConfig {
            throttle_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidInterval("throttle")));
    }
}
