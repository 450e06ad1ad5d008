//! Logging configuration

use serde::Deserialize;

use super::error::ValidationError;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Checks the default level of the directive (the part before any
    /// `target=level` pairs).
    pub fn validate(&self) -> Result<(), ValidationError> {
        let default_level = self
            .level
            .split(',')
            .map(str::trim)
            .find(|directive| !directive.contains('='));
        match default_level {
            Some(level) if !LEVELS.contains(&level.to_ascii_lowercase().as_str()) => {
                Err(ValidationError::InvalidLogLevel(level.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info,superdesk_live=debug".to_string()
}
