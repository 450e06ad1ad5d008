//! reqwest-backed HTTP transport for the Eve REST backend.
//!
//! # Configuration
//!
//! ```ignore
//! let config = ReqwestTransportConfig::new("https://sd.example.com/api")
//!     .with_timeout(Duration::from_secs(30));
//!
//! let transport = ReqwestTransport::new(config, session)?;
//! ```
//!
//! Every request carries the session's bearer token. Cancellation wins over
//! the in-flight request and surfaces as `NetworkError::Aborted`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::ports::{HttpMethod, HttpRequest, HttpTransport, NetworkError, SessionProvider};

/// Configuration for the reqwest transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransportConfig {
    /// API root, e.g. `https://sd.example.com/api`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ReqwestTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl From<&ServerConfig> for ReqwestTransportConfig {
    fn from(server: &ServerConfig) -> Self {
        Self::new(server.base_url.as_str()).with_timeout(server.request_timeout())
    }
}

pub struct ReqwestTransport {
    config: ReqwestTransportConfig,
    client: Client,
    session: Arc<dyn SessionProvider>,
}

impl ReqwestTransport {
    pub fn new(
        config: ReqwestTransportConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetworkError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    async fn execute(&self, request: HttpRequest) -> Result<Value, NetworkError> {
        let session = self.session.current().ok_or(NetworkError::Unauthenticated)?;

        let mut builder = self
            .client
            .request(Self::method(request.method), self.url(&request.path))
            .bearer_auth(session.token())
            .query(&request.url_params);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout
            } else if e.is_connect() {
                NetworkError::Connection(format!("Connection failed: {}", e))
            } else {
                NetworkError::Connection(e.to_string())
            }
        })?;

        Self::parse_response(response).await
    }

    async fn parse_response(response: Response) -> Result<Value, NetworkError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::Decode(format!("Failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError> {
        let method = request.method.as_str();
        let path = request.path.clone();
        debug!(method, path = %path, "Sending request");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NetworkError::Aborted),
            result = self.execute(request) => result,
        };

        match &result {
            Err(err) if err.is_abort() => debug!(method, path = %path, "Request aborted"),
            Err(err) => warn!(method, path = %path, error = %err, "Request failed"),
            Ok(_) => {}
        }
        result
    }
}
