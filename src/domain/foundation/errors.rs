//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Unsupported operator '{operator}' for field '{field}'")]
    UnsupportedOperator { field: String, operator: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported operator validation error.
    pub fn unsupported_operator(field: impl Into<String>, operator: impl Into<String>) -> Self {
        ValidationError::UnsupportedOperator {
            field: field.into(),
            operator: operator.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,

    // Transport errors
    NetworkFailed,
    Aborted,
    Unauthorized,
    NotFound,
    PreconditionFailed,

    // Payload errors
    DecodeFailed,

    // Live data errors
    ReconciliationFailed,
    InvalidStateTransition,

    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::NetworkFailed => "NETWORK_FAILED",
            ErrorCode::Aborted => "ABORTED",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::DecodeFailed => "DECODE_FAILED",
            ErrorCode::ReconciliationFailed => "RECONCILIATION_FAILED",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a decode error for a payload that did not match the expected shape.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecodeFailed, message)
    }

    /// Creates the error a live container reports when patching its data
    /// against a batch of changes failed. The underlying code is kept under
    /// the `cause` detail.
    pub fn reconciliation_failed(cause: &DomainError) -> Self {
        let mut error = Self::new(
            ErrorCode::ReconciliationFailed,
            format!("reconciliation failed: {}", cause.message),
        );
        error.details = cause.details.clone();
        error.with_detail("cause", cause.code.to_string())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// True when the error represents a cancelled request rather than a failure.
    pub fn is_aborted(&self) -> bool {
        self.code == ErrorCode::Aborted
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("resource");
        assert_eq!(format!("{}", err), "Field 'resource' cannot be empty");
    }

    #[test]
    fn validation_error_unsupported_operator_displays_correctly() {
        let err = ValidationError::unsupported_operator("state", "$regex");
        assert_eq!(
            format!("{}", err),
            "Unsupported operator '$regex' for field 'state'"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::NotFound, "Item not found");
        assert_eq!(format!("{}", err), "[NOT_FOUND] Item not found");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::ValidationFailed, "Validation failed")
            .with_detail("field", "state");

        assert_eq!(err.details.get("field"), Some(&"state".to_string()));
    }

    #[test]
    fn reconciliation_failure_keeps_the_cause() {
        let cause = DomainError::new(ErrorCode::NotFound, "gone").with_detail("status", "404");
        let err = DomainError::reconciliation_failed(&cause);

        assert_eq!(err.code, ErrorCode::ReconciliationFailed);
        assert_eq!(err.details.get("cause"), Some(&"NOT_FOUND".to_string()));
        assert_eq!(err.details.get("status"), Some(&"404".to_string()));
        assert!(!err.is_aborted());
    }
}
