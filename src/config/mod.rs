//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SUPERDESK` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use superdesk_live::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Notifications from {}", config.server.websocket_url);
//! ```

mod auth;
mod error;
mod live;
mod logging;
mod queue;
mod server;
mod websocket;

pub use auth::AuthConfig;
pub use error::{ConfigError, ValidationError};
pub use live::LiveConfig;
pub use logging::LoggingConfig;
pub use queue::QueueConfig;
pub use server::{Environment, ServerConfig};
pub use websocket::WebsocketConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a client for
/// a local development server. Load using [`AppConfig::load()`].
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// REST and notification endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Optional pre-established session
    #[serde(default)]
    pub auth: AuthConfig,

    /// Request queue limits
    #[serde(default)]
    pub queue: QueueConfig,

    /// Debounce and throttle windows
    #[serde(default)]
    pub live: LiveConfig,

    /// Reconnection and bus sizing
    #[serde(default)]
    pub websocket: WebsocketConfig,

    /// Log filter and format
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SUPERDESK` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SUPERDESK__SERVER__BASE_URL=https://...` -> `server.base_url`
    /// - `SUPERDESK__QUEUE__CONCURRENCY=4` -> `queue.concurrency = 4`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUPERDESK")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.queue.validate()?;
        self.live.validate()?;
        self.websocket.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use std::time::Duration;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 7] = [
        "SUPERDESK__SERVER__BASE_URL",
        "SUPERDESK__SERVER__WEBSOCKET_URL",
        "SUPERDESK__SERVER__ENVIRONMENT",
        "SUPERDESK__QUEUE__CONCURRENCY",
        "SUPERDESK__WEBSOCKET__RECONNECT_INTERVAL_SECS",
        "SUPERDESK__AUTH__TOKEN",
        "SUPERDESK__AUTH__USER_ID",
    ];

    /// Helper to clear environment variables after testing
    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_without_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.websocket.reconnect_interval(), Duration::from_secs(5));
        assert!(config.auth.session().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SUPERDESK__SERVER__BASE_URL", "https://sd.example.com/api");
        env::set_var("SUPERDESK__SERVER__WEBSOCKET_URL", "wss://sd.example.com/ws");
        env::set_var("SUPERDESK__QUEUE__CONCURRENCY", "4");
        env::set_var("SUPERDESK__WEBSOCKET__RECONNECT_INTERVAL_SECS", "10");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.base_url, "https://sd.example.com/api");
        assert_eq!(config.queue.concurrency, 4);
        assert_eq!(config.websocket.reconnect_interval_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SUPERDESK__AUTH__TOKEN", "abc123");
        env::set_var("SUPERDESK__AUTH__USER_ID", "u1");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        let session = config.auth.session().unwrap();
        assert_eq!(session.token(), "abc123");
        assert_eq!(session.identity.user_id, "u1");
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SUPERDESK__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        // Default endpoints are plain HTTP.
        assert!(config.validate().is_err());
    }
}
