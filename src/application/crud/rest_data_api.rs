//! RestDataApi - `DataApi` over an `HttpTransport` speaking Eve.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::domain::collection::{Entity, RestApiResponse};
use crate::domain::foundation::{ItemId, ResourceName};
use crate::domain::patch::generate_patch;
use crate::domain::query::{to_elastic_query, ListParams, QueryDescriptor};
use crate::ports::{DataApi, HttpRequest, HttpTransport, NetworkError};

const SEARCH_PATH: &str = "/search";

#[derive(Clone)]
pub struct RestDataApi {
    transport: Arc<dyn HttpTransport>,
}

impl RestDataApi {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn decode_list(raw: Value) -> Result<RestApiResponse<Value>, NetworkError> {
        serde_json::from_value(raw).map_err(|e| NetworkError::Decode(e.to_string()))
    }

    fn item_id(item: &Value) -> Result<ItemId, NetworkError> {
        ItemId::new(item.id()).map_err(|e| NetworkError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DataApi for RestDataApi {
    async fn find_one(
        &self,
        resource: &ResourceName,
        id: &ItemId,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError> {
        self.transport
            .send(HttpRequest::get(resource.item_path(id)), cancel)
            .await
    }

    async fn create(
        &self,
        resource: &ResourceName,
        item: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError> {
        self.transport
            .send(HttpRequest::post(resource.path(), item), cancel)
            .await
    }

    async fn query(
        &self,
        resource: &ResourceName,
        params: &ListParams,
        cancel: &CancellationToken,
    ) -> Result<RestApiResponse<Value>, NetworkError> {
        let request = HttpRequest::get(resource.path()).with_params(params.to_url_params());
        let raw = self.transport.send(request, cancel).await?;
        Self::decode_list(raw)
    }

    async fn search(
        &self,
        resource: &ResourceName,
        query: &QueryDescriptor,
        cancel: &CancellationToken,
    ) -> Result<RestApiResponse<Value>, NetworkError> {
        let request = HttpRequest::get(SEARCH_PATH)
            .with_param("repo", resource.as_str())
            .with_param("source", to_elastic_query(query).to_source_param());
        let raw = self.transport.send(request, cancel).await?;
        Self::decode_list(raw)
    }

    async fn patch(
        &self,
        resource: &ResourceName,
        current: &Value,
        next: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError> {
        let patch = generate_patch(current, next);
        if patch.is_empty() {
            return Ok(current.clone());
        }
        let id = Self::item_id(current)?;
        self.patch_raw(resource, &id, current.etag(), patch, cancel)
            .await
    }

    async fn patch_raw(
        &self,
        resource: &ResourceName,
        id: &ItemId,
        etag: Option<&str>,
        patch: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, NetworkError> {
        let mut request = HttpRequest::patch(resource.item_path(id), Value::Object(patch));
        if let Some(etag) = etag {
            request = request.if_match(etag);
        }
        self.transport.send(request, cancel).await
    }

    async fn delete(
        &self,
        resource: &ResourceName,
        item: &Value,
        cancel: &CancellationToken,
    ) -> Result<(), NetworkError> {
        let id = Self::item_id(item)?;
        let mut request = HttpRequest::delete(resource.item_path(&id));
        if let Some(etag) = item.etag() {
            request = request.if_match(etag);
        }
        self.transport.send(request, cancel).await.map(|_| ())
    }
}
