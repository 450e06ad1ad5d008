//! Data API Port - CRUD access to Eve resources.
//!
//! `DataApi` works on raw JSON so it stays object safe; `DataApiExt` layers
//! typed helpers on top for callers that own a concrete item type.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::NetworkError;
use crate::domain::collection::RestApiResponse;
use crate::domain::foundation::{DomainError, ItemId, ResourceName};
use crate::domain::query::{ListParams, QueryDescriptor};

#[async_trait]
pub trait DataApi: Send + Sync {
    async fn find_one(
        &self,
        resource: &ResourceName,
        id: &ItemId,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError>;

    async fn create(
        &self,
        resource: &ResourceName,
        item: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError>;

    async fn query(
        &self,
        resource: &ResourceName,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<RestApiResponse<Value>, NetworkError>;

    /// Runs a query descriptor through the Elasticsearch-backed search endpoint.
    async fn search(
        &self,
        resource: &ResourceName,
        query: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> Result<RestApiResponse<Value>, NetworkError>;

    /// Sends the difference between `current` and `next`. Returns `current`
    /// unchanged when there is nothing to send.
    async fn patch(
        &self,
        resource: &ResourceName,
        current: &Value,
        next: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError>;

    async fn patch_raw(
        &self,
        resource: &ResourceName,
        id: &ItemId,
        etag: Option<&str>,
        patch: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError>;

    async fn delete(
        &self,
        resource: &ResourceName,
        item: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), NetworkError>;
}

/// Typed wrappers over [`DataApi`].
#[async_trait]
pub trait DataApiExt: DataApi {
    async fn find_one_as<T>(
        &self,
        resource: &ResourceName,
        id: &ItemId,
        cancel: &CancellationToken,
    ) -> Result<T, DomainError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.find_one(resource, id, cancel).await?;
        Ok(serde_json::from_value(raw)?)
    }

    async fn query_as<T>(
        &self,
        resource: &ResourceName,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<RestApiResponse<T>, DomainError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.query(resource, params, cancel).await?;
        decode_response(raw)
    }

    async fn search_as<T>(
        &self,
        resource: &ResourceName,
        query: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> Result<RestApiResponse<T>, DomainError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.search(resource, query, cancel).await?;
        decode_response(raw)
    }

    async fn create_as<T>(
        &self,
        resource: &ResourceName,
        item: &T,
        cancel: &CancellationToken,
    ) -> Result<T, DomainError>
    where
        T: Serialize + DeserializeOwned + Sync,
    {
        let created = self
            .create(resource, serde_json::to_value(item)?, cancel)
            .await?;
        Ok(serde_json::from_value(created)?)
    }
}

impl<A: DataApi + ?Sized> DataApiExt for A {}

fn decode_response<T: DeserializeOwned>(
    raw: RestApiResponse<Value>,
) -> Result<RestApiResponse<T>, DomainError> {
    let items = raw
        .items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()?;
    Ok(RestApiResponse {
        items,
        meta: raw.meta,
        links: raw.links,
    })
}
