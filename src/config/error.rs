//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid REST base URL format")]
    InvalidBaseUrl,

    #[error("Invalid WebSocket URL format")]
    InvalidWebsocketUrl,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Queue concurrency must be between 1 and 16")]
    InvalidConcurrency,

    #[error("Invalid {0} interval")]
    InvalidInterval(&'static str),

    #[error("Notification bus capacity must be at least 16")]
    InvalidBusCapacity,

    #[error("Unknown log level: {0}")]
    InvalidLogLevel(String),
}
