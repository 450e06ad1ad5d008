//! Scripted HTTP transport for tests.
//!
//! # Features
//!
//! - Responses per method and path, consumed in order (the last one repeats)
//! - Call history for verification
//! - In-flight and peak concurrency tracking
//! - A gate that holds requests open until released
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new()
//!     .with_response(HttpMethod::Get, "/archive", json!({"_items": []}));
//!
//! transport.hold();
//! // ... start requests, assert on in_flight() ...
//! transport.release();
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::ports::{HttpMethod, HttpRequest, HttpTransport, NetworkError};

type Outcome = Result<Value, NetworkError>;

struct Route {
    method: HttpMethod,
    path: String,
    outcomes: VecDeque<Outcome>,
}

#[derive(Default)]
struct MockState {
    routes: Vec<Route>,
    calls: Vec<HttpRequest>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Mock transport for testing.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    gate: Arc<watch::Sender<bool>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            gate: Arc::new(gate),
            delay: Duration::ZERO,
        }
    }

    pub fn with_response(self, method: HttpMethod, path: impl Into<String>, body: Value) -> Self {
        self.respond(method, path, Ok(body));
        self
    }

    pub fn with_error(self, method: HttpMethod, path: impl Into<String>, err: NetworkError) -> Self {
        self.respond(method, path, Err(err));
        self
    }

    /// Simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Appends an outcome for `method` and `path`.
    pub fn respond(&self, method: HttpMethod, path: impl Into<String>, outcome: Outcome) {
        let path = path.into();
        let mut state = self.lock();
        match state
            .routes
            .iter_mut()
            .find(|route| route.method == method && route.path == path)
        {
            Some(route) => route.outcomes.push_back(outcome),
            None => state.routes.push(Route {
                method,
                path,
                outcomes: VecDeque::from([outcome]),
            }),
        }
    }

    /// Requests started from now on wait until `release`.
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    // === Test Helpers ===

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls_to(&self, method: HttpMethod, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_outcome(&self, request: &HttpRequest) -> Outcome {
        let mut state = self.lock();
        let route = state
            .routes
            .iter_mut()
            .find(|route| route.method == request.method && route.path == request.path);

        match route {
            Some(route) if route.outcomes.len() > 1 => route
                .outcomes
                .pop_front()
                .unwrap_or(Err(NetworkError::Connection("exhausted".into()))),
            Some(route) => route
                .outcomes
                .front()
                .cloned()
                .unwrap_or(Err(NetworkError::Connection("exhausted".into()))),
            None => Err(NetworkError::Status {
                status: 404,
                body: format!("no mock for {} {}", request.method.as_str(), request.path),
            }),
        }
    }

    async fn wait(&self) {
        let mut gate = self.gate.subscribe();
        // Sender lives in self, so the channel cannot close here.
        let _ = gate.wait_for(|open| *open).await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError> {
        {
            let mut state = self.lock();
            state.calls.push(request.clone());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NetworkError::Aborted),
            _ = self.wait() => self.next_outcome(&request),
        };

        self.lock().in_flight -= 1;
        result
    }
}
