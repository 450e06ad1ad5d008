//! LiveQuery - search results of one query, kept current.
//!
//! Results come from the search endpoint. Updates touching a field the
//! query filters or sorts on may move items in or out of the page, so they
//! force a full requery; other updates and deletions are patched in place.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::crud::{fetch_changed_resources, Reconciled};
use super::live::{LiveConfig, LiveHandle, LiveSnapshot, LiveSource, Reconciliation};
use crate::domain::changes::{ReconcileOptions, ResourceChange};
use crate::domain::collection::{Entity, LiveCollection};
use crate::domain::foundation::{DomainError, ResourceName};
use crate::domain::query::QueryDescriptor;
use crate::ports::{DataApi, DataApiExt, NotificationBus};

pub struct LiveQuery<T> {
    resource: ResourceName,
    query: QueryDescriptor,
    handle: LiveHandle<LiveCollection<T>>,
}

impl<T> LiveQuery<T>
where
    T: Entity + DeserializeOwned,
{
    pub fn start(
        api: Arc<dyn DataApi>,
        bus: &dyn NotificationBus,
        resource: ResourceName,
        query: QueryDescriptor,
    ) -> Self {
        Self::with_config(api, bus, resource, query, LiveConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn DataApi>,
        bus: &dyn NotificationBus,
        resource: ResourceName,
        query: QueryDescriptor,
        config: LiveConfig,
    ) -> Self {
        let options = ReconcileOptions::default().with_refresh_all_fields(query.referenced_fields());
        let source = QuerySource::<T> {
            api,
            resource: resource.clone(),
            query: query.clone(),
            options,
            item: PhantomData,
        };
        Self {
            resource,
            query,
            handle: LiveHandle::start(source, bus, config),
        }
    }

    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    pub fn snapshot(&self) -> LiveSnapshot<LiveCollection<T>> {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot<LiveCollection<T>>> {
        self.handle.subscribe()
    }

    /// Waits for the first results. `None` if the query stopped first.
    pub async fn loaded(&self) -> Option<LiveCollection<T>> {
        self.handle.loaded().await
    }

    /// Runs the query again and replaces the results.
    pub fn refetch(&self) {
        self.handle.refetch();
    }

    /// Stops listening and cancels outstanding requests.
    pub fn stop(&self) {
        self.handle.stop();
    }
}

struct QuerySource<T> {
    api: Arc<dyn DataApi>,
    resource: ResourceName,
    query: QueryDescriptor,
    options: ReconcileOptions,
    item: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T> LiveSource for QuerySource<T>
where
    T: Entity + DeserializeOwned,
{
    type Data = LiveCollection<T>;

    fn watches(&self, resource: &ResourceName) -> bool {
        resource == &self.resource
    }

    async fn load(&self, cancel: &CancellationToken) -> Result<LiveCollection<T>, DomainError> {
        let response = self
            .api
            .search_as::<T>(&self.resource, &self.query, cancel)
            .await?;
        Ok(LiveCollection::from(response))
    }

    async fn reconcile(
        &self,
        data: &LiveCollection<T>,
        changes: &[ResourceChange],
        cancel: &CancellationToken,
    ) -> Result<Reconciliation<LiveCollection<T>>, DomainError> {
        let reconciled = fetch_changed_resources(
            self.api.as_ref(),
            &self.resource,
            changes,
            &data.items,
            &self.options,
            cancel,
        )
        .await?;

        Ok(match reconciled {
            Reconciled::RequiresRefetchingAll => Reconciliation::RequiresRefetchingAll,
            Reconciled::Items(items) if Arc::ptr_eq(&items, &data.items) => {
                Reconciliation::Unchanged
            }
            Reconciled::Items(items) => Reconciliation::Patched(data.replace_items(items)),
        })
    }
}
