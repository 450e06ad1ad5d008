//! Backend endpoints

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Where the Superdesk server lives
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// REST API root, e.g. `https://sd.example.com/api`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Notification server, e.g. `wss://sd.example.com/ws`
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Environment name
    #[serde(default)]
    pub environment: Environment,
}

/// Application environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Validate server configuration
    ///
    /// Production requires TLS on both endpoints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secure_only = self.is_production();

        let http_ok = self.base_url.starts_with("https://")
            || (!secure_only && self.base_url.starts_with("http://"));
        if !http_ok {
            return Err(ValidationError::InvalidBaseUrl);
        }

        let ws_ok = self.websocket_url.starts_with("wss://")
            || (!secure_only && self.websocket_url.starts_with("ws://"));
        if !ws_ok {
            return Err(ValidationError::InvalidWebsocketUrl);
        }

        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            websocket_url: default_websocket_url(),
            request_timeout_secs: default_request_timeout(),
            environment: Environment::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_websocket_url() -> String {
    "ws://localhost:5100".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000/api");
        assert_eq!(config.websocket_url, "ws://localhost:5100");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_urls() {
        let config = ServerConfig {
            base_url: "localhost:5000".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBaseUrl));

        let config = ServerConfig {
            websocket_url: "http://localhost:5100".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWebsocketUrl));
    }

    #[test]
    fn test_production_requires_tls() {
        let config = ServerConfig {
            environment: Environment::Production,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBaseUrl));

        let config = ServerConfig {
            environment: Environment::Production,
            base_url: "https://sd.example.com/api".to_string(),
            websocket_url: "wss://sd.example.com/ws".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_timeout() {
        let config = ServerConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));

        let config = ServerConfig {
            request_timeout_secs: 500,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));
    }
}
