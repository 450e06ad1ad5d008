//! DataProvider - keeps one backend query fresh while matching resource
//! changes arrive.
//!
//! ## Behaviour
//!
//! - One HIGH fetch on start
//! - A matching change schedules a LOW fetch after `debounce`; every further
//!   match within the window pushes the deadline out, so a burst costs one fetch
//! - `update()` fetches immediately at HIGH priority
//! - `stop()` (or drop) ends the listener, evicts this provider's queued
//!   requests and discards in-flight responses

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::request_queue::{Priority, QueueRequest, RequestQueue};
use super::throttle::sleep_until;
use crate::domain::changes::ListenTo;
use crate::domain::foundation::OwnerId;
use crate::domain::notification::Notification;
use crate::ports::NotificationBus;

/// Builds the request for every fetch.
pub type RequestFactory = Arc<dyn Fn() -> QueueRequest + Send + Sync>;

/// Receives every successful response.
pub type ResponseHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Configuration for the DataProvider.
#[derive(Debug, Clone)]
pub struct DataProviderConfig {
    pub debounce: Duration,
}

impl Default for DataProviderConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
        }
    }
}

impl DataProviderConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

pub struct DataProvider {
    owner: OwnerId,
    queue: RequestQueue,
    updates: mpsc::UnboundedSender<()>,
    stop: CancellationToken,
}

/// State owned by the listener task.
struct Listener {
    owner: OwnerId,
    queue: RequestQueue,
    request_factory: RequestFactory,
    response_handler: ResponseHandler,
    listen_to: ListenTo,
    config: DataProviderConfig,
    stop: CancellationToken,
}

impl DataProvider {
    /// Subscribes to `bus`, issues the initial fetch and starts listening.
    pub fn start(
        queue: RequestQueue,
        bus: &dyn NotificationBus,
        request_factory: RequestFactory,
        response_handler: ResponseHandler,
        listen_to: ListenTo,
        config: DataProviderConfig,
    ) -> Self {
        let owner = OwnerId::new();
        let events = bus.subscribe();
        let (updates, update_rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let listener = Listener {
            owner,
            queue: queue.clone(),
            request_factory,
            response_handler,
            listen_to,
            config,
            stop: stop.clone(),
        };
        listener.fetch(Priority::High);
        tokio::spawn(listener.run(events, update_rx));

        Self {
            owner,
            queue,
            updates,
            stop,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Fetches now at HIGH priority.
    pub fn update(&self) {
        // Fails only once the listener stopped.
        let _ = self.updates.send(());
    }

    pub fn stop(&self) {
        if self.stop.is_cancelled() {
            return;
        }
        self.stop.cancel();
        self.queue.remove_provider(self.owner);
        debug!(owner = %self.owner, "Data provider stopped");
    }
}

impl Drop for DataProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Listener {
    async fn run(
        self,
        mut events: broadcast::Receiver<Notification>,
        mut updates: mpsc::UnboundedReceiver<()>,
    ) {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                update = updates.recv() => match update {
                    Some(()) => self.fetch(Priority::High),
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(notification) => {
                        if notification
                            .resource_change()
                            .is_some_and(|change| self.listen_to.matches(change))
                        {
                            deadline = Some(Instant::now() + self.config.debounce);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(owner = %self.owner, skipped, "Missed notifications, refetching");
                        deadline = Some(Instant::now() + self.config.debounce);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    deadline = None;
                    self.fetch(Priority::Low);
                }
            }
        }
    }

    /// Enqueues one fetch and awaits it on its own task. Responses arriving
    /// after stop are dropped.
    fn fetch(&self, priority: Priority) {
        let owner = self.owner;
        let pending = self
            .queue
            .enqueue((self.request_factory)(), owner, priority);

        // `stop()` cancels before evicting, so an entry queued after the
        // eviction pass is caught here.
        if self.stop.is_cancelled() {
            self.queue.remove_provider(owner);
            return;
        }

        let handler = Arc::clone(&self.response_handler);
        let stop = self.stop.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                outcome = pending => outcome,
            };
            match outcome {
                Ok(response) => handler(response),
                Err(err) if err.is_abort() => debug!(%owner, "Fetch dropped"),
                Err(err) => warn!(%owner, error = %err, "Fetch failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::BroadcastNotificationBus;
    use crate::adapters::http::MockTransport;
    use crate::domain::changes::{ResourceInterest, UpdateInterest};
    use crate::domain::foundation::ResourceName;
    use crate::domain::notification::WebsocketMessage;
    use crate::ports::{HttpMethod, HttpRequest};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time;

    struct Harness {
        transport: MockTransport,
        bus: BroadcastNotificationBus,
        queue: RequestQueue,
        responses: Arc<Mutex<Vec<Value>>>,
    }

    fn harness() -> Harness {
        let transport =
            MockTransport::new().with_response(HttpMethod::Get, "/desks", json!({"_items": []}));
        Harness {
            queue: RequestQueue::new(Arc::new(transport.clone()), 2),
            transport,
            bus: BroadcastNotificationBus::new(64),
            responses: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn listen_to() -> ListenTo {
        ListenTo::new().resource(
            ResourceName::new("desks").unwrap(),
            ResourceInterest::Selective {
                create: true,
                update: UpdateInterest::Fields(["name".to_string()].into_iter().collect()),
                delete: false,
            },
        )
    }

    fn start(h: &Harness) -> DataProvider {
        let responses = Arc::clone(&h.responses);
        DataProvider::start(
            h.queue.clone(),
            &h.bus,
            Arc::new(|| QueueRequest::new(HttpRequest::get("/desks"))),
            Arc::new(move |value| responses.lock().unwrap().push(value)),
            listen_to(),
            DataProviderConfig::default(),
        )
    }

    fn change(event: &str, extra: Value) -> Notification {
        Notification::from_message(WebsocketMessage::new(event, extra))
    }

    fn fetches(h: &Harness) -> usize {
        h.transport.calls_to(HttpMethod::Get, "/desks")
    }

    #[tokio::test(start_paused = true)]
    async fn initial_fetch_reaches_handler() {
        let h = harness();
        let _provider = start(&h);

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetches(&h), 1);
        assert_eq!(h.responses.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_matching_changes_fetches_once() {
        let h = harness();
        let _provider = start(&h);
        time::sleep(Duration::from_millis(10)).await;

        for id in ["1", "2", "3"] {
            h.bus.publish(change("resource:created", json!({"resource": "desks", "_id": id})));
            time::sleep(Duration::from_millis(300)).await;
        }
        assert_eq!(fetches(&h), 1);

        time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(fetches(&h), 2);
        assert_eq!(h.responses.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_changes_are_ignored() {
        let h = harness();
        let _provider = start(&h);

        h.bus.publish(change(
            "resource:updated",
            json!({"resource": "desks", "_id": "1", "fields": {"members": 1}}),
        ));
        h.bus.publish(change("resource:deleted", json!({"resource": "desks", "_id": "1"})));
        h.bus.publish(change("resource:created", json!({"resource": "stages", "_id": "1"})));

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fetches(&h), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn update_fetches_immediately() {
        let h = harness();
        let provider = start(&h);
        time::sleep(Duration::from_millis(10)).await;

        provider.update();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetches(&h), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_the_provider() {
        let h = harness();
        let provider = start(&h);
        time::sleep(Duration::from_millis(10)).await;

        provider.stop();
        h.bus.publish(change("resource:created", json!({"resource": "desks", "_id": "9"})));
        provider.update();

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fetches(&h), 1);
        assert_eq!(h.responses.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_leaves_nothing_queued_across_worker_threads() {
        for _ in 0..100 {
            let h = harness();
            h.transport.hold();
            let queue = RequestQueue::new(Arc::new(h.transport.clone()), 1);
            let counter = Arc::new(AtomicUsize::new(0));
            let provider = DataProvider::start(
                queue.clone(),
                &h.bus,
                Arc::new(move || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    QueueRequest::new(HttpRequest::get("/desks").with_param("n", n.to_string()))
                }),
                Arc::new(|_| {}),
                listen_to(),
                DataProviderConfig::default(),
            );

            provider.update();
            provider.update();
            provider.stop();
            time::sleep(Duration::from_millis(5)).await;

            assert_eq!(queue.pending_count(), 0);
            h.transport.release();
        }
    }
}
