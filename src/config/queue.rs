//! Request queue configuration

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Requests sent at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 || self.concurrency > 16 {
            return Err(ValidationError::InvalidConcurrency);
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_defaults() {
        assert_eq!(QueueConfig::default().concurrency, 2);
        assert!(QueueConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = QueueConfig { concurrency: 0 };
        assert_eq!(config.validate(), Err(ValidationError::InvalidConcurrency));
    }
}
