//! CrudManager - paged, sorted and filtered view of one resource with
//! create/update/delete that keep the view current.
//!
//! Every method reloads the page it leaves behind, so the published state
//! always reflects the server after the operation.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::collection::{Entity, LiveCollection, RestApiResponse};
use crate::domain::foundation::{DomainError, ItemId, ResourceName};
use crate::domain::query::{ListParams, SortOption};
use crate::ports::{DataApi, DataApiExt};

/// Filter values keyed by field name, sent as the Eve `where` document.
pub type CrudFilters = Map<String, Value>;

/// What the manager currently shows.
#[derive(Debug)]
pub struct CrudState<T> {
    pub collection: LiveCollection<T>,
    /// One-based page last read.
    pub page: u32,
    pub active_sort: Option<SortOption>,
    pub active_filters: CrudFilters,
}

impl<T> Clone for CrudState<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            page: self.page,
            active_sort: self.active_sort.clone(),
            active_filters: self.active_filters.clone(),
        }
    }
}

impl<T> Default for CrudState<T> {
    fn default() -> Self {
        Self {
            collection: LiveCollection::from(RestApiResponse {
                items: Vec::new(),
                meta: Default::default(),
                links: None,
            }),
            page: 1,
            active_sort: None,
            active_filters: CrudFilters::new(),
        }
    }
}

/// Configuration for the CrudManager.
#[derive(Debug, Clone, Default)]
pub struct CrudManagerConfig {
    /// Page size. The server default applies when unset.
    pub max_results: Option<u32>,
}

impl CrudManagerConfig {
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

pub struct CrudManager<T> {
    api: Arc<dyn DataApi>,
    resource: ResourceName,
    config: CrudManagerConfig,
    state: watch::Sender<CrudState<T>>,
    cancel: CancellationToken,
}

impl<T> CrudManager<T>
where
    T: Entity + Serialize + DeserializeOwned,
{
    pub fn new(api: Arc<dyn DataApi>, resource: ResourceName) -> Self {
        Self::with_config(api, resource, CrudManagerConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn DataApi>,
        resource: ResourceName,
        config: CrudManagerConfig,
    ) -> Self {
        let (state, _) = watch::channel(CrudState::default());
        Self {
            api,
            resource,
            config,
            state,
            cancel: CancellationToken::new(),
        }
    }

    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    pub fn state(&self) -> CrudState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CrudState<T>> {
        self.state.subscribe()
    }

    /// Loads `page` (one-based) with the given sort and filters and makes
    /// them the active ones.
    pub async fn read(
        &self,
        page: u32,
        sort: Option<SortOption>,
        filters: CrudFilters,
    ) -> Result<LiveCollection<T>, DomainError> {
        let mut params = ListParams::new().page(page.max(1)).filter(filters.clone());
        if let Some(sort) = &sort {
            params = params.sort(sort.clone());
        }
        if let Some(max_results) = self.config.max_results {
            params = params.max_results(max_results);
        }

        let response = self
            .api
            .query_as::<T>(&self.resource, &params, &self.cancel)
            .await?;
        let collection = LiveCollection::from(response);
        debug!(
            resource = %self.resource,
            page,
            items = collection.len(),
            total = collection.meta.total,
            "Page loaded"
        );

        self.state.send_replace(CrudState {
            collection: collection.clone(),
            page: page.max(1),
            active_sort: sort,
            active_filters: filters,
        });
        Ok(collection)
    }

    /// Reloads the current page.
    pub async fn refresh(&self) -> Result<LiveCollection<T>, DomainError> {
        let current = self.state();
        self.read(current.page, current.active_sort, current.active_filters)
            .await
    }

    /// Applies a new sort and returns to the first page.
    pub async fn sort(&self, sort: SortOption) -> Result<LiveCollection<T>, DomainError> {
        let current = self.state();
        self.read(1, Some(sort), current.active_filters).await
    }

    /// Drops one filter and returns to the first page.
    pub async fn remove_filter(&self, field: &str) -> Result<LiveCollection<T>, DomainError> {
        let mut current = self.state();
        current.active_filters.remove(field);
        self.read(1, current.active_sort, current.active_filters)
            .await
    }

    pub async fn go_to_page(&self, page: u32) -> Result<LiveCollection<T>, DomainError> {
        let current = self.state();
        self.read(page, current.active_sort, current.active_filters)
            .await
    }

    pub async fn create(&self, item: &T) -> Result<T, DomainError> {
        let created = self
            .api
            .create_as(&self.resource, item, &self.cancel)
            .await?;
        info!(resource = %self.resource, id = created.id(), "Item created");
        self.refresh().await?;
        Ok(created)
    }

    /// Sends the difference between the held version of `item` and `item`.
    ///
    /// When the item is not on the current page its server version is
    /// fetched first.
    pub async fn update(&self, item: &T) -> Result<T, DomainError> {
        let next = serde_json::to_value(item)?;
        let current = match self.held_version(item.id())? {
            Some(current) => current,
            None => {
                let id = ItemId::new(item.id())?;
                self.api.find_one(&self.resource, &id, &self.cancel).await?
            }
        };

        let updated = self
            .api
            .patch(&self.resource, &current, &next, &self.cancel)
            .await?;
        info!(resource = %self.resource, id = item.id(), "Item updated");
        self.refresh().await?;
        Ok(serde_json::from_value(updated)?)
    }

    pub async fn delete(&self, item: &T) -> Result<(), DomainError> {
        let raw = serde_json::to_value(item)?;
        self.api.delete(&self.resource, &raw, &self.cancel).await?;
        info!(resource = %self.resource, id = item.id(), "Item deleted");
        self.refresh().await?;
        Ok(())
    }

    fn held_version(&self, id: &str) -> Result<Option<Value>, DomainError> {
        let state = self.state.borrow();
        match state.collection.items.iter().find(|held| held.id() == id) {
            Some(held) => Ok(Some(serde_json::to_value(held.as_ref())?)),
            None => Ok(None),
        }
    }
}

impl<T> Drop for CrudManager<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
