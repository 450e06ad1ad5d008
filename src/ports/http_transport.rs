//! HTTP Transport Port - JSON requests against the REST backend.
//!
//! The request queue, the data API and the live containers all reach the
//! backend through this port, so tests can swap in a scripted transport.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Port for sending JSON requests to the backend.
///
/// Implementations must:
/// - resolve `path` against their base URL
/// - return `NetworkError::Aborted` as soon as `cancel` fires
/// - map non-2xx responses to `NetworkError::Status`
/// - return `Value::Null` for empty bodies
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A backend request. Serializes deterministically, which the request
/// queue relies on for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Path relative to the API base, e.g. `/archive`.
    pub path: String,
    pub url_params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            url_params: BTreeMap::new(),
            payload: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, payload: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_payload(payload)
    }

    pub fn patch(path: impl Into<String>, payload: Value) -> Self {
        Self::new(HttpMethod::Patch, path).with_payload(payload)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(key.into(), value.into());
        self
    }

    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.url_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Conditional write against the item's current etag.
    pub fn if_match(self, etag: impl Into<String>) -> Self {
        self.with_header("If-Match", etag)
    }
}

/// Errors from the transport. Cloneable so one outcome can be handed to
/// every waiter of a shared request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The caller cancelled the request.
    #[error("request aborted")]
    Aborted,

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    /// The queued request was dropped because its owner stopped.
    #[error("request evicted from queue")]
    Evicted,

    /// No active session to authenticate with.
    #[error("no active session")]
    Unauthenticated,
}

impl NetworkError {
    /// Cancellations are expected during teardown and are not failures.
    pub fn is_abort(&self) -> bool {
        matches!(self, NetworkError::Aborted | NetworkError::Evicted)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<NetworkError> for DomainError {
    fn from(err: NetworkError) -> Self {
        let code = match &err {
            NetworkError::Aborted | NetworkError::Evicted => ErrorCode::Aborted,
            NetworkError::Unauthenticated => ErrorCode::Unauthorized,
            NetworkError::Status { status: 401, .. } => ErrorCode::Unauthorized,
            NetworkError::Status { status: 404, .. } => ErrorCode::NotFound,
            NetworkError::Status { status: 412, .. } => ErrorCode::PreconditionFailed,
            NetworkError::Decode(_) => ErrorCode::DecodeFailed,
            _ => ErrorCode::NetworkFailed,
        };
        let error = DomainError::new(code, err.to_string());
        match err.status() {
            Some(status) => error.with_detail("status", status.to_string()),
            None => error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn HttpTransport) {}

    #[test]
    fn request_serialization_is_stable_across_param_order() {
        let a = HttpRequest::get("/archive")
            .with_param("page", "1")
            .with_param("max_results", "25");
        let b = HttpRequest::get("/archive")
            .with_param("max_results", "25")
            .with_param("page", "1");

        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn if_match_sets_header() {
        let request = HttpRequest::patch("/archive/1", json!({"headline": "x"})).if_match("e1");
        assert_eq!(request.headers.get("If-Match").map(String::as_str), Some("e1"));
        assert_eq!(request.method.as_str(), "PATCH");
    }

    #[test]
    fn abort_classification() {
        assert!(NetworkError::Aborted.is_abort());
        assert!(NetworkError::Evicted.is_abort());
        assert!(!NetworkError::Timeout.is_abort());
        assert_eq!(
            NetworkError::Status { status: 500, body: String::new() }.status(),
            Some(500)
        );
    }

    #[test]
    fn network_status_maps_to_error_code() {
        let err: DomainError = NetworkError::Status {
            status: 412,
            body: "etag mismatch".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::PreconditionFailed);
        assert_eq!(err.details.get("status"), Some(&"412".to_string()));
    }

    #[test]
    fn aborted_and_evicted_map_to_aborted() {
        let aborted: DomainError = NetworkError::Aborted.into();
        let evicted: DomainError = NetworkError::Evicted.into();
        assert!(aborted.is_aborted());
        assert!(evicted.is_aborted());
    }
}
