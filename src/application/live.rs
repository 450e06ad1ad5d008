//! Shared engine of the live containers.
//!
//! A container loads its data once, then keeps it in step with resource
//! change notifications:
//!
//! ```text
//! Uninitialized ──load──> Loaded ──batch──> Patching ──> Loaded
//!                           │                  │
//!                           └──> Refetching <──┘ (reconciliation gave up)
//!                                    │
//!                                    └──> Loaded
//! ```
//!
//! Changes are combined by a [`CombineBuffer`]. Only one load or
//! reconciliation runs at a time; a batch closing while one is in flight, or
//! before the first load finished, goes back into the buffer and is
//! delivered again when the next window closes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::throttle::{sleep_until, CombineBuffer};
use crate::domain::changes::ResourceChange;
use crate::domain::foundation::{DomainError, ResourceName, StateMachine};
use crate::domain::notification::Notification;
use crate::ports::NotificationBus;

// ════════════════════════════════════════════════════════════════════════════
// State
// ════════════════════════════════════════════════════════════════════════════

/// Lifecycle of a live container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveState {
    #[default]
    Uninitialized,
    Loaded,
    Patching,
    Refetching,
}

impl StateMachine for LiveState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use LiveState::*;
        matches!(
            (self, target),
            (Uninitialized, Loaded)
                | (Loaded, Patching)
                | (Loaded, Refetching)
                | (Patching, Loaded)
                | (Patching, Refetching)
                | (Refetching, Loaded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use LiveState::*;
        match self {
            Uninitialized => vec![Loaded],
            Loaded => vec![Patching, Refetching],
            Patching => vec![Loaded, Refetching],
            Refetching => vec![Loaded],
        }
    }
}

/// What a container publishes after every change.
#[derive(Debug, Clone)]
pub struct LiveSnapshot<D> {
    pub state: LiveState,
    /// `None` until the first load succeeded.
    pub data: Option<D>,
    /// Failure of the last load or reconciliation, cleared by the next success.
    pub last_error: Option<DomainError>,
}

impl<D> Default for LiveSnapshot<D> {
    fn default() -> Self {
        Self {
            state: LiveState::Uninitialized,
            data: None,
            last_error: None,
        }
    }
}

/// Configuration shared by the live containers.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Window during which change notifications are combined.
    pub throttle: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_secs(1),
        }
    }
}

impl LiveConfig {
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Source
// ════════════════════════════════════════════════════════════════════════════

/// Result of reconciling held data against a batch.
pub(crate) enum Reconciliation<D> {
    Unchanged,
    Patched(D),
    RequiresRefetchingAll,
}

/// What a container watches and how it loads and patches it.
#[async_trait]
pub(crate) trait LiveSource: Send + Sync + 'static {
    type Data: Clone + Send + Sync + 'static;

    fn watches(&self, resource: &ResourceName) -> bool;

    async fn load(&self, cancel: &CancellationToken) -> Result<Self::Data, DomainError>;

    async fn reconcile(
        &self,
        data: &Self::Data,
        changes: &[ResourceChange],
        cancel: &CancellationToken,
    ) -> Result<Reconciliation<Self::Data>, DomainError>;
}

// ════════════════════════════════════════════════════════════════════════════
// Handle
// ════════════════════════════════════════════════════════════════════════════

/// Owner side of a running container. Dropping it stops the container.
pub(crate) struct LiveHandle<D> {
    snapshots: watch::Receiver<LiveSnapshot<D>>,
    refetch: mpsc::UnboundedSender<()>,
    stop: CancellationToken,
}

impl<D: Clone + Send + Sync + 'static> LiveHandle<D> {
    /// Subscribes to `bus` and starts loading.
    pub(crate) fn start<S>(source: S, bus: &dyn NotificationBus, config: LiveConfig) -> Self
    where
        S: LiveSource<Data = D>,
    {
        let events = bus.subscribe();
        let (snapshot_tx, snapshots) = watch::channel(LiveSnapshot::default());
        let (refetch, refetch_rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let worker = Worker {
            source: Arc::new(source),
            snapshots: snapshot_tx,
            buffer: CombineBuffer::new(config.throttle),
            state: LiveState::Uninitialized,
            data: None,
            last_error: None,
            in_flight: false,
            refetch_pending: false,
            stop: stop.clone(),
        };
        tokio::spawn(worker.run(events, refetch_rx));

        Self {
            snapshots,
            refetch,
            stop,
        }
    }

    pub(crate) fn snapshot(&self) -> LiveSnapshot<D> {
        self.snapshots.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LiveSnapshot<D>> {
        self.snapshots.clone()
    }

    /// Waits for the first successful load. Returns `None` if the container
    /// stopped first.
    pub(crate) async fn loaded(&self) -> Option<D> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots.wait_for(|s| s.data.is_some()).await.ok()?;
        snapshot.data.clone()
    }

    pub(crate) fn refetch(&self) {
        // Fails only once the worker stopped.
        let _ = self.refetch.send(());
    }

    pub(crate) fn stop(&self) {
        self.stop.cancel();
    }
}

impl<D> Drop for LiveHandle<D> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Worker
// ════════════════════════════════════════════════════════════════════════════

enum Job<D> {
    Load,
    Patch { data: D, changes: Vec<ResourceChange> },
}

enum Completion<D> {
    Loaded(D),
    Reconciled(Reconciliation<D>),
    Failed(DomainError),
}

type Done<D> = mpsc::UnboundedSender<Completion<D>>;

struct Worker<S: LiveSource> {
    source: Arc<S>,
    snapshots: watch::Sender<LiveSnapshot<S::Data>>,
    buffer: CombineBuffer<ResourceChange>,
    state: LiveState,
    data: Option<S::Data>,
    last_error: Option<DomainError>,
    in_flight: bool,
    refetch_pending: bool,
    stop: CancellationToken,
}

impl<S: LiveSource> Worker<S> {
    async fn run(
        mut self,
        mut events: broadcast::Receiver<Notification>,
        mut refetch: mpsc::UnboundedReceiver<()>,
    ) {
        let (done_tx, mut done) = mpsc::unbounded_channel();
        let stop = self.stop.clone();
        self.spawn(Job::Load, &done_tx);

        loop {
            let deadline = self.buffer.deadline();
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                Some(completion) = done.recv() => self.finish(completion, &done_tx),
                request = refetch.recv() => match request {
                    Some(()) => self.request_refetch(&done_tx),
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(notification) => {
                        if let Some(change) = notification
                            .resource_change()
                            .filter(|change| self.source.watches(&change.resource))
                        {
                            self.buffer.push([change.clone()]);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed notifications, refetching");
                        self.request_refetch(&done_tx);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    let batch = self.buffer.take();
                    self.handle_batch(batch, &done_tx);
                }
            }
        }
        debug!("Live container stopped");
    }

    fn handle_batch(&mut self, batch: Vec<ResourceChange>, done: &Done<S::Data>) {
        let data = match &self.data {
            Some(data) if !self.in_flight => data.clone(),
            _ => {
                debug!(changes = batch.len(), "Busy, redelivering changes");
                self.buffer.push(batch);
                return;
            }
        };

        self.transition(LiveState::Patching);
        self.publish();
        self.spawn(
            Job::Patch {
                data,
                changes: batch,
            },
            done,
        );
    }

    fn request_refetch(&mut self, done: &Done<S::Data>) {
        if self.in_flight {
            self.refetch_pending = true;
        } else {
            self.start_refetch(done);
        }
    }

    fn start_refetch(&mut self, done: &Done<S::Data>) {
        if self.data.is_some() {
            self.transition(LiveState::Refetching);
            self.publish();
        }
        self.spawn(Job::Load, done);
    }

    fn finish(&mut self, completion: Completion<S::Data>, done: &Done<S::Data>) {
        self.in_flight = false;
        if !matches!(completion, Completion::Failed(_)) {
            self.last_error = None;
        }

        match completion {
            Completion::Loaded(data) => {
                self.data = Some(data);
                self.transition(LiveState::Loaded);
            }
            Completion::Reconciled(Reconciliation::Unchanged) => {
                self.transition(LiveState::Loaded);
            }
            Completion::Reconciled(Reconciliation::Patched(data)) => {
                self.data = Some(data);
                self.transition(LiveState::Loaded);
            }
            Completion::Reconciled(Reconciliation::RequiresRefetchingAll) => {
                self.refetch_pending = false;
                self.start_refetch(done);
                return;
            }
            Completion::Failed(err) => {
                if err.is_aborted() {
                    debug!("Live request aborted");
                } else {
                    warn!(error = %err, "Live update failed");
                    self.last_error = Some(err);
                }
                if self.data.is_some() {
                    self.transition(LiveState::Loaded);
                }
            }
        }
        self.publish();

        if self.refetch_pending {
            self.refetch_pending = false;
            self.start_refetch(done);
        }
    }

    fn spawn(&mut self, job: Job<S::Data>, done: &Done<S::Data>) {
        self.in_flight = true;
        let source = Arc::clone(&self.source);
        let cancel = self.stop.clone();
        let done = done.clone();

        tokio::spawn(async move {
            let completion = match job {
                Job::Load => match source.load(&cancel).await {
                    Ok(data) => Completion::Loaded(data),
                    Err(err) => Completion::Failed(err),
                },
                Job::Patch { data, changes } => {
                    match source.reconcile(&data, &changes, &cancel).await {
                        Ok(reconciliation) => Completion::Reconciled(reconciliation),
                        Err(err) if err.is_aborted() => Completion::Failed(err),
                        Err(err) => Completion::Failed(DomainError::reconciliation_failed(&err)),
                    }
                }
            };
            // The worker is gone once stopped.
            let _ = done.send(completion);
        });
    }

    fn transition(&mut self, next: LiveState) {
        if self.state == next {
            return;
        }
        match self.state.transition_to(next) {
            Ok(state) => self.state = state,
            Err(err) => warn!(error = %err, "Ignoring live state change"),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(LiveSnapshot {
            state: self.state,
            data: self.data.clone(),
            last_error: self.last_error.clone(),
        });
    }
}
