//! Incremental refresh of a cached item list.
//!
//! Planning is done by `domain::changes::plan_reconciliation`; this module
//! fetches the refreshed items and splices them in.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::changes::{
    apply_patch, plan_reconciliation, ReconcileOptions, ReconcilePlan, ResourceChange,
};
use crate::domain::collection::{Entity, ItemList};
use crate::domain::foundation::{DomainError, ResourceName};
use crate::ports::{DataApi, DataApiExt};

/// Result of reconciling a list against a batch of changes.
#[derive(Debug)]
pub enum Reconciled<T> {
    /// The list cannot be patched; the caller must run its query again.
    RequiresRefetchingAll,
    /// The patched list. Unaffected items keep their `Arc`.
    Items(ItemList<T>),
}

impl<T> Reconciled<T> {
    pub fn requires_refetching_all(&self) -> bool {
        matches!(self, Reconciled::RequiresRefetchingAll)
    }
}

/// Applies `changes` to `items`.
///
/// Changes for other resources are ignored. When nothing applies the very
/// same list `Arc` is returned. A failed fetch of any updated item fails the
/// whole pass without touching `items`.
pub async fn fetch_changed_resources<T>(
    api: &dyn DataApi,
    resource: &ResourceName,
    changes: &[ResourceChange],
    items: &ItemList<T>,
    options: &ReconcileOptions,
    cancel: &CancellationToken,
) -> Result<Reconciled<T>, DomainError>
where
    T: Entity + DeserializeOwned,
{
    let relevant: Vec<ResourceChange> = changes
        .iter()
        .filter(|change| &change.resource == resource)
        .cloned()
        .collect();

    match plan_reconciliation(&relevant, items, options) {
        ReconcilePlan::Unchanged => Ok(Reconciled::Items(Arc::clone(items))),
        ReconcilePlan::RefetchAll => {
            debug!(%resource, changes = relevant.len(), "Changes require a full refetch");
            Ok(Reconciled::RequiresRefetchingAll)
        }
        ReconcilePlan::Patch { removed, refetch } => {
            debug!(
                %resource,
                removed = removed.len(),
                refetch = refetch.len(),
                "Patching item list"
            );
            let refreshed = try_join_all(
                refetch
                    .iter()
                    .map(|id| api.find_one_as::<T>(resource, id, cancel)),
            )
            .await?;

            let refreshed = refreshed.into_iter().map(Arc::new).collect();
            Ok(Reconciled::Items(apply_patch(items, &removed, refreshed)))
        }
    }
}
