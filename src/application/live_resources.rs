//! LiveResources - several plain REST collections kept current together.
//!
//! Each watched resource is listed through its collection endpoint,
//! optionally restricted to a set of ids. Works against the database-backed
//! endpoints only; search results go through `LiveQuery`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::crud::{fetch_changed_resources, Reconciled};
use super::live::{LiveConfig, LiveHandle, LiveSnapshot, LiveSource, Reconciliation};
use crate::domain::changes::{ReconcileOptions, ResourceChange};
use crate::domain::collection::LiveCollection;
use crate::domain::foundation::{DomainError, ItemId, ResourceName};
use crate::domain::query::ListParams;
use crate::ports::{DataApi, NotificationBus};

/// One watched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub resource: ResourceName,
    /// Restricts the list to these ids.
    pub ids: Option<Vec<ItemId>>,
}

impl ResourceSpec {
    pub fn all(resource: ResourceName) -> Self {
        Self { resource, ids: None }
    }

    pub fn only(resource: ResourceName, ids: Vec<ItemId>) -> Self {
        Self {
            resource,
            ids: Some(ids),
        }
    }

    fn params(&self) -> ListParams {
        match &self.ids {
            Some(ids) => ListParams::new().only_ids(ids),
            None => ListParams::new(),
        }
    }
}

/// Current lists, one per watched resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceSet {
    collections: BTreeMap<ResourceName, LiveCollection<Value>>,
}

impl ResourceSet {
    pub fn get(&self, resource: &ResourceName) -> Option<&LiveCollection<Value>> {
        self.collections.get(resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceName, &LiveCollection<Value>)> {
        self.collections.iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

pub struct LiveResources {
    handle: LiveHandle<ResourceSet>,
}

impl LiveResources {
    pub fn start(api: Arc<dyn DataApi>, bus: &dyn NotificationBus, specs: Vec<ResourceSpec>) -> Self {
        Self::with_config(api, bus, specs, LiveConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn DataApi>,
        bus: &dyn NotificationBus,
        specs: Vec<ResourceSpec>,
        config: LiveConfig,
    ) -> Self {
        let source = ResourcesSource {
            api,
            specs,
            options: ReconcileOptions::default(),
        };
        Self {
            handle: LiveHandle::start(source, bus, config),
        }
    }

    pub fn snapshot(&self) -> LiveSnapshot<ResourceSet> {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot<ResourceSet>> {
        self.handle.subscribe()
    }

    /// Waits for the first load. `None` if stopped first.
    pub async fn loaded(&self) -> Option<ResourceSet> {
        self.handle.loaded().await
    }

    pub fn refetch(&self) {
        self.handle.refetch();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }
}

struct ResourcesSource {
    api: Arc<dyn DataApi>,
    specs: Vec<ResourceSpec>,
    options: ReconcileOptions,
}

#[async_trait]
impl LiveSource for ResourcesSource {
    type Data = ResourceSet;

    fn watches(&self, resource: &ResourceName) -> bool {
        self.specs.iter().any(|spec| &spec.resource == resource)
    }

    async fn load(&self, cancel: &CancellationToken) -> Result<ResourceSet, DomainError> {
        let responses = try_join_all(self.specs.iter().map(|spec| async move {
            let params = spec.params();
            let response = self.api.query(&spec.resource, &params, cancel).await?;
            Ok::<_, DomainError>((spec.resource.clone(), LiveCollection::from(response)))
        }))
        .await?;

        Ok(ResourceSet {
            collections: responses.into_iter().collect(),
        })
    }

    async fn reconcile(
        &self,
        data: &ResourceSet,
        changes: &[ResourceChange],
        cancel: &CancellationToken,
    ) -> Result<Reconciliation<ResourceSet>, DomainError> {
        let mut by_resource: BTreeMap<&ResourceName, Vec<ResourceChange>> = BTreeMap::new();
        for change in changes {
            if data.collections.contains_key(&change.resource) {
                by_resource
                    .entry(&change.resource)
                    .or_default()
                    .push(change.clone());
            }
        }

        let results = try_join_all(by_resource.into_iter().map(|(resource, changes)| async move {
            let collection = data
                .collections
                .get(resource)
                .ok_or_else(|| DomainError::decode(format!("no data for {}", resource)))?;
            let reconciled = fetch_changed_resources(
                self.api.as_ref(),
                resource,
                &changes,
                &collection.items,
                &self.options,
                cancel,
            )
            .await?;
            Ok::<_, DomainError>((resource, collection, reconciled))
        }))
        .await?;

        let mut next = data.clone();
        let mut changed = false;
        for (resource, collection, reconciled) in results {
            match reconciled {
                Reconciled::RequiresRefetchingAll => {
                    return Ok(Reconciliation::RequiresRefetchingAll)
                }
                Reconciled::Items(items) if Arc::ptr_eq(&items, &collection.items) => {}
                Reconciled::Items(items) => {
                    next.collections
                        .insert(resource.clone(), collection.replace_items(items));
                    changed = true;
                }
            }
        }

        Ok(if changed {
            Reconciliation::Patched(next)
        } else {
            Reconciliation::Unchanged
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::BroadcastNotificationBus;
    use crate::adapters::http::MockTransport;
    use crate::application::crud::RestDataApi;
    use crate::domain::notification::{Notification, WebsocketMessage};
    use crate::ports::HttpMethod;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time;

    fn name(resource: &str) -> ResourceName {
        ResourceName::new(resource).unwrap()
    }

    fn transport() -> MockTransport {
        MockTransport::new()
            .with_response(
                HttpMethod::Get,
                "/desks",
                json!({"_items": [{"_id": "d1", "name": "Sports"}, {"_id": "d2", "name": "News"}],
                       "_meta": {"total": 2}}),
            )
            .with_response(
                HttpMethod::Get,
                "/stages",
                json!({"_items": [{"_id": "s1", "desk": "d1"}], "_meta": {"total": 1}}),
            )
    }

    fn start(transport: &MockTransport, bus: &BroadcastNotificationBus) -> LiveResources {
        LiveResources::start(
            Arc::new(RestDataApi::new(Arc::new(transport.clone()))),
            bus,
            vec![
                ResourceSpec::only(name("desks"), vec![ItemId::new("d1").unwrap(), ItemId::new("d2").unwrap()]),
                ResourceSpec::all(name("stages")),
            ],
        )
    }

    fn event(name: &str, extra: Value) -> Notification {
        Notification::from_message(WebsocketMessage::new(name, extra))
    }

    #[tokio::test(start_paused = true)]
    async fn loads_every_resource() {
        let transport = transport();
        let bus = BroadcastNotificationBus::new(64);
        let live = start(&transport, &bus);

        let set = live.loaded().await.unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&name("desks")).unwrap().ids(), vec!["d1", "d2"]);
        assert_eq!(set.get(&name("stages")).unwrap().len(), 1);

        let desks_call = transport
            .calls()
            .into_iter()
            .find(|call| call.path == "/desks")
            .unwrap();
        assert_eq!(desks_call.url_params["where"], r#"{"_id":{"$in":["d1","d2"]}}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn patches_only_the_changed_resource() {
        let transport = transport().with_response(
            HttpMethod::Get,
            "/desks/d2",
            json!({"_id": "d2", "name": "World"}),
        );
        let bus = BroadcastNotificationBus::new(64);
        let live = start(&transport, &bus);
        let before = live.loaded().await.unwrap();

        bus.publish(event(
            "resource:updated",
            json!({"resource": "desks", "_id": "d2", "fields": {"name": 1}}),
        ));
        time::sleep(Duration::from_millis(1100)).await;

        let after = live.snapshot().data.unwrap();
        let desks = after.get(&name("desks")).unwrap();
        assert_eq!(desks.items[1]["name"], json!("World"));
        assert!(Arc::ptr_eq(
            &after.get(&name("stages")).unwrap().items,
            &before.get(&name("stages")).unwrap().items
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn creation_refetches_everything() {
        let transport = transport();
        let bus = BroadcastNotificationBus::new(64);
        let live = start(&transport, &bus);
        live.loaded().await;

        bus.publish(event("resource:created", json!({"resource": "stages", "_id": "s2"})));
        time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(transport.calls_to(HttpMethod::Get, "/desks"), 2);
        assert_eq!(transport.calls_to(HttpMethod::Get, "/stages"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn changes_to_other_resources_are_ignored() {
        let transport = transport();
        let bus = BroadcastNotificationBus::new(64);
        let live = start(&transport, &bus);
        live.loaded().await;

        bus.publish(event("resource:created", json!({"resource": "users", "_id": "u1"})));
        time::sleep(Duration::from_secs(3)).await;

        assert_eq!(transport.call_count(), 2);
    }
}
