//! REST list responses and the live item collections built from them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An item returned by the backend, addressable by its `_id`.
pub trait Entity: Send + Sync + 'static {
    /// The `_id` of the item.
    fn id(&self) -> &str;

    /// The `_etag` of the item, required for conditional writes.
    fn etag(&self) -> Option<&str> {
        None
    }
}

impl Entity for Value {
    fn id(&self) -> &str {
        self.get("_id").and_then(Value::as_str).unwrap_or_default()
    }

    fn etag(&self) -> Option<&str> {
        self.get("_etag").and_then(Value::as_str)
    }
}

/// Ordered item list whose members are shared, so untouched items keep
/// their identity across reconciliations.
pub type ItemList<T> = Arc<Vec<Arc<T>>>;

/// Paging metadata of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListMeta {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u64,
}

/// Eve list response: `{"_items": [...], "_meta": {...}, "_links": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestApiResponse<T> {
    #[serde(rename = "_items")]
    pub items: Vec<T>,

    #[serde(rename = "_meta", default)]
    pub meta: ListMeta,

    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Value>,
}

/// Item collection held by a live view.
#[derive(Debug)]
pub struct LiveCollection<T> {
    pub items: ItemList<T>,
    pub meta: ListMeta,
    pub links: Option<Value>,
}

impl<T> Clone for LiveCollection<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            meta: self.meta,
            links: self.links.clone(),
        }
    }
}

impl<T> LiveCollection<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns a collection holding `items`, lowering `total` by the number
    /// of items that disappeared.
    pub fn replace_items(&self, items: ItemList<T>) -> Self {
        let removed = self.items.len().saturating_sub(items.len()) as u64;
        Self {
            items,
            meta: ListMeta {
                total: self.meta.total.saturating_sub(removed),
                ..self.meta
            },
            links: self.links.clone(),
        }
    }
}

impl<T: Entity> LiveCollection<T> {
    /// Ids of the held items, in order.
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id()).collect()
    }
}

impl<T> From<RestApiResponse<T>> for LiveCollection<T> {
    fn from(response: RestApiResponse<T>) -> Self {
        Self {
            items: Arc::new(response.items.into_iter().map(Arc::new).collect()),
            meta: response.meta,
            links: response.links,
        }
    }
}
