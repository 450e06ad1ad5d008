//! Incremental reconciliation of a cached item list against change events.
//!
//! Planning is pure; fetching the refreshed items is left to the caller
//! (see `application::crud::fetch_changed_resources`).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::change::{ChangeKind, ResourceChange};
use crate::domain::collection::{Entity, ItemList};
use crate::domain::foundation::ItemId;

/// Knobs of the reconciliation algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Creations force a full refetch (they may land anywhere in a sorted, paged list).
    pub refetch_on_create: bool,
    /// Updates touching any of these fields force a full refetch.
    pub refresh_all_fields: BTreeSet<String>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            refetch_on_create: true,
            refresh_all_fields: BTreeSet::new(),
        }
    }
}

impl ReconcileOptions {
    pub fn with_refresh_all_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refresh_all_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignore_creations(mut self) -> Self {
        self.refetch_on_create = false;
        self
    }
}

/// Outcome of planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Nothing in the batch affects the list.
    Unchanged,
    /// The list cannot be patched locally.
    RefetchAll,
    /// Drop `removed`, refetch `refetch` by id and splice them back in place.
    Patch {
        removed: HashSet<ItemId>,
        refetch: Vec<ItemId>,
    },
}

/// Changes of one batch split by kind.
#[derive(Debug, Default)]
struct Partition<'a> {
    created: Vec<&'a ResourceChange>,
    updated: Vec<&'a ResourceChange>,
    deleted: HashSet<&'a ItemId>,
}

fn partition(changes: &[ResourceChange]) -> Partition<'_> {
    let mut partition = Partition::default();
    for change in changes {
        match change.kind {
            ChangeKind::Created => partition.created.push(change),
            ChangeKind::Updated { .. } => partition.updated.push(change),
            ChangeKind::Deleted => {
                partition.deleted.insert(&change.item_id);
            }
        }
    }
    partition
}

/// Decides how `items` must change to reflect `changes`.
pub fn plan_reconciliation<T: Entity>(
    changes: &[ResourceChange],
    items: &[Arc<T>],
    options: &ReconcileOptions,
) -> ReconcilePlan {
    if changes.is_empty() {
        return ReconcilePlan::Unchanged;
    }

    let partition = partition(changes);

    if options.refetch_on_create && !partition.created.is_empty() {
        return ReconcilePlan::RefetchAll;
    }

    if partition
        .updated
        .iter()
        .any(|change| change.touches_any(&options.refresh_all_fields))
    {
        return ReconcilePlan::RefetchAll;
    }

    let present: HashSet<&str> = items.iter().map(|item| item.id()).collect();

    let removed: HashSet<ItemId> = partition
        .deleted
        .iter()
        .filter(|id| present.contains(id.as_str()))
        .map(|id| (*id).clone())
        .collect();

    let mut seen = HashSet::new();
    let refetch: Vec<ItemId> = partition
        .updated
        .iter()
        .map(|change| &change.item_id)
        .filter(|id| present.contains(id.as_str()) && !partition.deleted.contains(id))
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect();

    if removed.is_empty() && refetch.is_empty() {
        ReconcilePlan::Unchanged
    } else {
        ReconcilePlan::Patch { removed, refetch }
    }
}

/// Applies a patch plan: removed items are dropped, refreshed items replace
/// the item with the same id at its original position, every other item is
/// kept as the same `Arc`.
pub fn apply_patch<T: Entity>(
    items: &ItemList<T>,
    removed: &HashSet<ItemId>,
    refreshed: Vec<Arc<T>>,
) -> ItemList<T> {
    let mut refreshed: HashMap<String, Arc<T>> = refreshed
        .into_iter()
        .map(|item| (item.id().to_string(), item))
        .collect();
    let removed: HashSet<&str> = removed.iter().map(ItemId::as_str).collect();

    let next = items
        .iter()
        .filter(|item| !removed.contains(item.id()))
        .map(|item| refreshed.remove(item.id()).unwrap_or_else(|| Arc::clone(item)))
        .collect();

    Arc::new(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ResourceName;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn archive() -> ResourceName {
        ResourceName::new("archive").unwrap()
    }

    fn id(value: &str) -> ItemId {
        ItemId::new(value).unwrap()
    }

    fn list(ids: &[&str]) -> ItemList<Value> {
        Arc::new(ids.iter().map(|i| Arc::new(json!({"_id": i}))).collect())
    }

    #[test]
    fn empty_batch_is_unchanged() {
        let items = list(&["a", "b"]);
        let plan = plan_reconciliation(&[], &items, &ReconcileOptions::default());
        assert_eq!(plan, ReconcilePlan::Unchanged);
    }

    #[test]
    fn any_creation_forces_refetch() {
        let items = list(&["a", "b", "c"]);
        let changes = vec![
            ResourceChange::deleted(archive(), id("b")),
            ResourceChange::created(archive(), id("z")),
            ResourceChange::updated(archive(), id("a"), ["headline"]),
        ];
        let plan = plan_reconciliation(&changes, &items, &ReconcileOptions::default());
        assert_eq!(plan, ReconcilePlan::RefetchAll);
    }

    #[test]
    fn suppressed_creation_is_ignored() {
        let items = list(&["a"]);
        let changes = vec![ResourceChange::created(archive(), id("z"))];
        let options = ReconcileOptions::default().ignore_creations();
        assert_eq!(
            plan_reconciliation(&changes, &items, &options),
            ReconcilePlan::Unchanged
        );
    }

    #[test]
    fn update_of_refresh_all_field_forces_refetch() {
        let items = list(&["a"]);
        let changes = vec![ResourceChange::updated(archive(), id("a"), ["state"])];
        let options = ReconcileOptions::default().with_refresh_all_fields(["state"]);
        assert_eq!(
            plan_reconciliation(&changes, &items, &options),
            ReconcilePlan::RefetchAll
        );
    }

    #[test]
    fn delete_and_update_produce_patch() {
        let items = list(&["a", "b", "c"]);
        let changes = vec![
            ResourceChange::deleted(archive(), id("b")),
            ResourceChange::updated(archive(), id("c"), ["headline"]),
            ResourceChange::updated(archive(), id("c"), ["slugline"]),
            ResourceChange::updated(archive(), id("b"), ["headline"]),
            ResourceChange::updated(archive(), id("x"), ["headline"]),
        ];
        let plan = plan_reconciliation(&changes, &items, &ReconcileOptions::default());
        assert_eq!(
            plan,
            ReconcilePlan::Patch {
                removed: [id("b")].into_iter().collect(),
                refetch: vec![id("c")],
            }
        );
    }

    #[test]
    fn delete_of_unknown_item_is_unchanged() {
        let items = list(&["a"]);
        let changes = vec![ResourceChange::deleted(archive(), id("q"))];
        assert_eq!(
            plan_reconciliation(&changes, &items, &ReconcileOptions::default()),
            ReconcilePlan::Unchanged
        );
    }

    #[test]
    fn apply_patch_removes_and_splices_in_place() {
        let items = list(&["a", "b", "c"]);
        let refreshed = Arc::new(json!({"_id": "c", "headline": "new"}));
        let next = apply_patch(
            &items,
            &[id("a")].into_iter().collect(),
            vec![Arc::clone(&refreshed)],
        );

        assert_eq!(next.len(), 2);
        assert!(Arc::ptr_eq(&next[0], &items[1]));
        assert!(Arc::ptr_eq(&next[1], &refreshed));
    }

    #[test]
    fn apply_patch_removes_scattered_ids_from_a_long_list() {
        let ids: Vec<String> = (0..500).map(|i| format!("i{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let items = list(&refs);
        let removed: HashSet<ItemId> = (0..500).step_by(7).map(|i| id(&ids[i])).collect();

        let next = apply_patch(&items, &removed, Vec::new());

        assert_eq!(next.len(), 500 - removed.len());
        assert!(next.iter().all(|item| !removed.contains(&id(item.id()))));
        assert!(Arc::ptr_eq(&next[0], &items[1]));
    }

    proptest! {
        #[test]
        fn deleting_any_subset_preserves_relative_order(
            count in 1usize..20,
            mask in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let ids: Vec<String> = (0..count).map(|i| format!("i{i}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let items = list(&refs);

            let changes: Vec<ResourceChange> = ids
                .iter()
                .zip(&mask)
                .filter(|(_, delete)| **delete)
                .map(|(i, _)| ResourceChange::deleted(archive(), id(i)))
                .collect();

            let next = match plan_reconciliation(&changes, &items, &ReconcileOptions::default()) {
                ReconcilePlan::Unchanged => Arc::clone(&items),
                ReconcilePlan::Patch { removed, refetch } => {
                    prop_assert!(refetch.is_empty());
                    apply_patch(&items, &removed, Vec::new())
                }
                ReconcilePlan::RefetchAll => unreachable!("no creations in batch"),
            };

            let expected: Vec<&str> = ids
                .iter()
                .zip(mask.iter().chain(std::iter::repeat(&false)))
                .filter(|(_, delete)| !**delete)
                .map(|(i, _)| i.as_str())
                .collect();
            let actual: Vec<&str> = next.iter().map(|item| item.id()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
