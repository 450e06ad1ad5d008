//! RequestQueue - prioritised, deduplicating dispatcher for backend requests.
//!
//! ## Guarantees
//!
//! - An equal unfinished request (same dedup key, owner and priority) shares
//!   one outcome: at most one network call per key is outstanding.
//! - HIGH entries are dispatched before LOW ones, FIFO otherwise.
//! - At most `concurrency` requests are in flight.
//!
//! Dispatch starts when the caller first awaits a [`Queued`] outcome (or
//! drops it), never inside `enqueue`. Requests enqueued back to back by one
//! task are therefore all ordered before the first one goes out, whatever
//! the runtime flavour.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::foundation::{OwnerId, StateMachine};
use crate::ports::{HttpRequest, HttpTransport, NetworkError};

type Outcome = Result<Value, NetworkError>;

/// Dispatch priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    High,
}

/// A request plus an optional explicit dedup id.
#[derive(Debug, Clone)]
pub struct QueueRequest {
    pub id: Option<String>,
    pub request: HttpRequest,
}

impl QueueRequest {
    pub fn new(request: HttpRequest) -> Self {
        Self { id: None, request }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Explicit id, otherwise the serialized request.
    fn dedup_key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => serde_json::to_string(&self.request)
                .unwrap_or_else(|_| format!("{:?}", self.request)),
        }
    }
}

/// Lifecycle of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Sending,
    Done,
    Failed,
}

impl StateMachine for EntryStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use EntryStatus::*;
        matches!(
            (self, target),
            (Pending, Sending) | (Pending, Failed) | (Sending, Done) | (Sending, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use EntryStatus::*;
        match self {
            Pending => vec![Sending, Failed],
            Sending => vec![Done, Failed],
            Done | Failed => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    dedup: String,
    owner: OwnerId,
    priority: Priority,
}

struct Entry {
    key: EntryKey,
    request: HttpRequest,
    status: EntryStatus,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

impl Entry {
    fn advance(&mut self, target: EntryStatus) {
        match self.status.transition_to(target) {
            Ok(status) => self.status = status,
            Err(err) => warn!(key = %self.key.dedup, error = %err, "Ignoring queue entry transition"),
        }
    }

    fn resolve(mut self, outcome: Outcome) {
        self.advance(if outcome.is_ok() {
            EntryStatus::Done
        } else {
            EntryStatus::Failed
        });
        for waiter in self.waiters {
            // A dropped waiter only means the caller stopped listening.
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[derive(Default)]
struct QueueState {
    entries: Vec<Entry>,
    in_flight: usize,
}

struct QueueInner {
    transport: Arc<dyn HttpTransport>,
    state: Mutex<QueueState>,
    concurrency: usize,
    shutdown: CancellationToken,
}

/// Shared request queue. Cheap to clone.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

impl RequestQueue {
    pub fn new(transport: Arc<dyn HttpTransport>, concurrency: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                transport,
                state: Mutex::new(QueueState::default()),
                concurrency: concurrency.max(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Enqueues and waits for the outcome.
    pub async fn add(
        &self,
        request: QueueRequest,
        owner: OwnerId,
        priority: Priority,
    ) -> Result<Value, NetworkError> {
        self.enqueue(request, owner, priority).await
    }

    /// Enqueues without dispatching. Sending starts once the returned
    /// outcome is first polled or dropped, within a Tokio runtime.
    pub fn enqueue(&self, request: QueueRequest, owner: OwnerId, priority: Priority) -> Queued {
        let (tx, rx) = oneshot::channel();
        let key = EntryKey {
            dedup: request.dedup_key(),
            owner,
            priority,
        };

        {
            let mut state = self.inner.lock();

            if let Some(entry) = state.entries.iter_mut().find(|entry| entry.key == key) {
                debug!(key = %key.dedup, status = ?entry.status, "Joining queued request");
                entry.waiters.push(tx);
            } else {
                let position = match priority {
                    Priority::High => state
                        .entries
                        .iter()
                        .position(|entry| entry.key.priority == Priority::Low)
                        .unwrap_or(state.entries.len()),
                    Priority::Low => state.entries.len(),
                };
                debug!(key = %key.dedup, ?priority, position, "Request queued");
                state.entries.insert(
                    position,
                    Entry {
                        key,
                        request: request.request,
                        status: EntryStatus::Pending,
                        waiters: vec![tx],
                    },
                );
            }
        }

        Queued {
            outcome: rx,
            inner: Arc::clone(&self.inner),
            dispatched: false,
        }
    }

    /// Rejects and drops every not yet sent entry of `owner`.
    /// Returns the number of evicted entries.
    pub fn remove_provider(&self, owner: OwnerId) -> usize {
        let evicted: Vec<Entry> = {
            let mut state = self.inner.lock();
            let (evicted, kept) = std::mem::take(&mut state.entries)
                .into_iter()
                .partition(|entry| {
                    entry.key.owner == owner && entry.status == EntryStatus::Pending
                });
            state.entries = kept;
            evicted
        };

        let count = evicted.len();
        for entry in evicted {
            entry.resolve(Err(NetworkError::Evicted));
        }
        if count > 0 {
            debug!(%owner, count, "Evicted queued requests");
        }
        count
    }

    /// Aborts in-flight requests and evicts everything queued.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let pending: Vec<Entry> = {
            let mut state = self.inner.lock();
            let (pending, sending) = std::mem::take(&mut state.entries)
                .into_iter()
                .partition(|entry| entry.status == EntryStatus::Pending);
            state.entries = sending;
            pending
        };
        for entry in pending {
            entry.resolve(Err(NetworkError::Evicted));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Pending)
            .count()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }
}

/// Outcome of an enqueued request.
///
/// Evicted entries and a queue dropped mid-request resolve to
/// `NetworkError::Evicted`.
#[must_use = "a queued request is dispatched when its outcome is awaited or dropped"]
pub struct Queued {
    outcome: oneshot::Receiver<Outcome>,
    inner: Arc<QueueInner>,
    dispatched: bool,
}

impl Queued {
    fn dispatch(&mut self) {
        if !std::mem::replace(&mut self.dispatched, true) {
            QueueInner::drain(&self.inner);
        }
    }
}

impl Future for Queued {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        self.dispatch();
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(NetworkError::Evicted)))
    }
}

impl Drop for Queued {
    fn drop(&mut self) {
        // Draining spawns senders, which needs a runtime.
        if tokio::runtime::Handle::try_current().is_ok() {
            self.dispatch();
        }
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts pending entries until the concurrency limit is reached.
    fn drain(inner: &Arc<QueueInner>) {
        loop {
            let (key, request) = {
                let mut state = inner.lock();
                if state.in_flight >= inner.concurrency {
                    return;
                }
                let Some(entry) = state
                    .entries
                    .iter_mut()
                    .find(|entry| entry.status == EntryStatus::Pending)
                else {
                    return;
                };
                entry.advance(EntryStatus::Sending);
                let started = (entry.key.clone(), entry.request.clone());
                state.in_flight += 1;
                started
            };

            debug!(key = %key.dedup, priority = ?key.priority, "Sending request");
            let task_inner = Arc::clone(inner);
            tokio::spawn(async move {
                let cancel = task_inner.shutdown.child_token();
                let outcome = task_inner.transport.send(request, &cancel).await;
                QueueInner::complete(&task_inner, &key, outcome);
            });
        }
    }

    /// Removes the finished entry, answers its waiters and refills the slot.
    fn complete(inner: &Arc<QueueInner>, key: &EntryKey, outcome: Outcome) {
        let entry = {
            let mut state = inner.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state
                .entries
                .iter()
                .position(|entry| &entry.key == key && entry.status == EntryStatus::Sending)
                .map(|index| state.entries.remove(index))
        };

        match &outcome {
            Ok(_) => debug!(key = %key.dedup, "Request done"),
            Err(err) if err.is_abort() => debug!(key = %key.dedup, "Request aborted"),
            Err(err) => warn!(key = %key.dedup, error = %err, "Request failed"),
        }

        if let Some(entry) = entry {
            entry.resolve(outcome);
        }
        QueueInner::drain(inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::MockTransport;
    use crate::ports::HttpMethod;
    use serde_json::json;

    fn queue(transport: &MockTransport, concurrency: usize) -> RequestQueue {
        RequestQueue::new(Arc::new(transport.clone()), concurrency)
    }

    fn get(path: &str) -> QueueRequest {
        QueueRequest::new(HttpRequest::get(path))
    }

    async fn until(mut condition: impl FnMut() -> bool) {
        while !condition() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn entry_status_transitions() {
        assert!(EntryStatus::Pending.can_transition_to(&EntryStatus::Sending));
        assert!(EntryStatus::Pending.can_transition_to(&EntryStatus::Failed));
        assert!(!EntryStatus::Pending.can_transition_to(&EntryStatus::Done));
        assert!(EntryStatus::Done.is_terminal());
        assert!(EntryStatus::Failed.is_terminal());
    }

    #[test]
    fn dedup_key_prefers_explicit_id() {
        assert_eq!(get("/a").with_id("desks").dedup_key(), "desks");
        assert_eq!(get("/a").dedup_key(), get("/a").dedup_key());
        assert_ne!(get("/a").dedup_key(), get("/b").dedup_key());
    }

    #[tokio::test]
    async fn equal_requests_share_one_call() {
        let transport = MockTransport::new().with_response(HttpMethod::Get, "/desks", json!({"n": 1}));
        let queue = queue(&transport, 2);
        let owner = OwnerId::new();

        let (a, b) = tokio::join!(
            queue.add(get("/desks"), owner, Priority::High),
            queue.add(get("/desks"), owner, Priority::High),
        );

        assert_eq!(a.unwrap(), json!({"n": 1}));
        assert_eq!(b.unwrap(), json!({"n": 1}));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn different_owners_do_not_share() {
        let transport = MockTransport::new().with_response(HttpMethod::Get, "/desks", json!([]));
        let queue = queue(&transport, 2);

        let (a, b) = tokio::join!(
            queue.add(get("/desks"), OwnerId::new(), Priority::Low),
            queue.add(get("/desks"), OwnerId::new(), Priority::Low),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn high_priority_is_dispatched_first() {
        let transport = MockTransport::new()
            .with_response(HttpMethod::Get, "/low-1", json!(1))
            .with_response(HttpMethod::Get, "/low-2", json!(2))
            .with_response(HttpMethod::Get, "/high", json!(3));
        let queue = queue(&transport, 1);
        let owner = OwnerId::new();

        let low_1 = queue.enqueue(get("/low-1"), owner, Priority::Low);
        let low_2 = queue.enqueue(get("/low-2"), owner, Priority::Low);
        let high = queue.enqueue(get("/high"), owner, Priority::High);

        assert_eq!(high.await.unwrap(), json!(3));
        assert_eq!(low_1.await.unwrap(), json!(1));
        assert_eq!(low_2.await.unwrap(), json!(2));

        let order: Vec<String> = transport.calls().into_iter().map(|c| c.path).collect();
        assert_eq!(order, vec!["/high", "/low-1", "/low-2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn high_priority_is_dispatched_first_across_worker_threads() {
        for _ in 0..200 {
            let transport = MockTransport::new()
                .with_response(HttpMethod::Get, "/low-1", json!(1))
                .with_response(HttpMethod::Get, "/low-2", json!(2))
                .with_response(HttpMethod::Get, "/high", json!(3));
            let queue = queue(&transport, 1);
            let owner = OwnerId::new();

            let low_1 = queue.enqueue(get("/low-1"), owner, Priority::Low);
            let low_2 = queue.enqueue(get("/low-2"), owner, Priority::Low);
            let high = queue.enqueue(get("/high"), owner, Priority::High);
            let (low_1, low_2, high) = tokio::join!(low_1, low_2, high);
            assert!(low_1.is_ok() && low_2.is_ok() && high.is_ok());

            assert_eq!(transport.calls()[0].path, "/high");
        }
    }

    #[tokio::test]
    async fn nothing_is_sent_before_the_outcome_is_awaited() {
        let transport = MockTransport::new().with_response(HttpMethod::Get, "/desks", json!([]));
        let queue = queue(&transport, 2);

        let pending = queue.enqueue(get("/desks"), OwnerId::new(), Priority::High);
        tokio::task::yield_now().await;
        assert_eq!(transport.call_count(), 0);
        assert_eq!(queue.pending_count(), 1);

        assert_eq!(pending.await.unwrap(), json!([]));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn dropped_outcome_still_dispatches() {
        let transport = MockTransport::new().with_response(HttpMethod::Get, "/desks", json!([]));
        let queue = queue(&transport, 2);

        drop(queue.enqueue(get("/desks"), OwnerId::new(), Priority::Low));
        until(|| transport.call_count() == 1).await;
        until(|| queue.pending_count() == 0 && queue.in_flight() == 0).await;
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let transport = MockTransport::new();
        for i in 0..5 {
            transport.respond(HttpMethod::Get, format!("/r{i}"), Ok(json!(i)));
        }
        transport.hold();
        let queue = queue(&transport, 2);
        let owner = OwnerId::new();

        let pending: Vec<_> = (0..5)
            .map(|i| tokio::spawn(queue.enqueue(get(&format!("/r{i}")), owner, Priority::Low)))
            .collect();

        until(|| transport.in_flight() == 2).await;
        assert_eq!(queue.in_flight(), 2);
        assert_eq!(queue.pending_count(), 3);

        transport.release();
        for (i, outcome) in pending.into_iter().enumerate() {
            assert_eq!(outcome.await.unwrap().unwrap(), json!(i));
        }
        assert_eq!(transport.max_in_flight(), 2);
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn remove_provider_evicts_only_unsent_entries_of_owner() {
        let transport = MockTransport::new()
            .with_response(HttpMethod::Get, "/a", json!("a"))
            .with_response(HttpMethod::Get, "/b", json!("b"))
            .with_response(HttpMethod::Get, "/c", json!("c"));
        transport.hold();
        let queue = queue(&transport, 1);
        let mine = OwnerId::new();
        let theirs = OwnerId::new();

        let a = tokio::spawn(queue.enqueue(get("/a"), mine, Priority::Low));
        until(|| transport.in_flight() == 1).await;
        let b = queue.enqueue(get("/b"), mine, Priority::Low);
        let c = queue.enqueue(get("/c"), theirs, Priority::Low);

        assert_eq!(queue.remove_provider(mine), 1);
        assert_eq!(b.await, Err(NetworkError::Evicted));

        transport.release();
        assert_eq!(a.await.unwrap().unwrap(), json!("a"));
        assert_eq!(c.await.unwrap(), json!("c"));
        assert_eq!(transport.calls_to(HttpMethod::Get, "/b"), 0);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_frees_the_slot() {
        let transport = MockTransport::new()
            .with_error(
                HttpMethod::Get,
                "/broken",
                NetworkError::Status { status: 500, body: "boom".into() },
            )
            .with_response(HttpMethod::Get, "/ok", json!(true));
        let queue = queue(&transport, 1);
        let owner = OwnerId::new();

        let first = queue.enqueue(get("/broken"), owner, Priority::High);
        let second = queue.enqueue(get("/broken"), owner, Priority::High);
        let after = queue.enqueue(get("/ok"), owner, Priority::Low);

        assert_eq!(first.await.unwrap_err().status(), Some(500));
        assert_eq!(second.await.unwrap_err().status(), Some(500));
        assert_eq!(after.await.unwrap(), json!(true));
        assert_eq!(transport.calls_to(HttpMethod::Get, "/broken"), 1);
    }

    #[tokio::test]
    async fn shutdown_aborts_in_flight_requests() {
        let transport = MockTransport::new().with_response(HttpMethod::Get, "/slow", json!({}));
        transport.hold();
        let queue = queue(&transport, 2);

        let slow = tokio::spawn(queue.enqueue(get("/slow"), OwnerId::new(), Priority::Low));
        until(|| transport.in_flight() == 1).await;
        queue.shutdown();

        assert_eq!(slow.await.unwrap(), Err(NetworkError::Aborted));
    }
}
