//! Resource change events announced over the notification channel.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::domain::foundation::{ItemId, ResourceName, ValidationError};

pub const RESOURCE_CREATED: &str = "resource:created";
pub const RESOURCE_UPDATED: &str = "resource:updated";
pub const RESOURCE_DELETED: &str = "resource:deleted";

/// What happened to the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    /// Changed top-level or dotted field names. Empty when the server did not say.
    Updated { fields: BTreeSet<String> },
    Deleted,
}

/// A create/update/delete of one item of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub resource: ResourceName,
    pub item_id: ItemId,
    pub kind: ChangeKind,
}

impl ResourceChange {
    pub fn created(resource: ResourceName, item_id: ItemId) -> Self {
        Self {
            resource,
            item_id,
            kind: ChangeKind::Created,
        }
    }

    pub fn updated<I, S>(resource: ResourceName, item_id: ItemId, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource,
            item_id,
            kind: ChangeKind::Updated {
                fields: fields.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn deleted(resource: ResourceName, item_id: ItemId) -> Self {
        Self {
            resource,
            item_id,
            kind: ChangeKind::Deleted,
        }
    }

    /// Reads a `resource:*` message. Returns `Ok(None)` for other events.
    ///
    /// `extra` carries `resource`, `_id` and, for updates, `fields` as either
    /// `{"name": 1}` or `["name"]`.
    pub fn from_message(event: &str, extra: &Value) -> Result<Option<Self>, ValidationError> {
        let kind = match event {
            RESOURCE_CREATED => ChangeKind::Created,
            RESOURCE_UPDATED => ChangeKind::Updated {
                fields: changed_fields(extra.get("fields")),
            },
            RESOURCE_DELETED => ChangeKind::Deleted,
            _ => return Ok(None),
        };

        let resource = extra
            .get("resource")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::empty_field("resource"))?;
        let item_id = extra
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::empty_field("_id"))?;

        Ok(Some(Self {
            resource: ResourceName::new(resource)?,
            item_id: ItemId::new(item_id)?,
            kind,
        }))
    }

    pub fn is_created(&self) -> bool {
        matches!(self.kind, ChangeKind::Created)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.kind, ChangeKind::Deleted)
    }

    /// True when this is an update touching any of `fields`.
    pub fn touches_any<'a, I>(&self, fields: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        match &self.kind {
            ChangeKind::Updated { fields: changed } => fields
                .into_iter()
                .any(|wanted| changed.iter().any(|c| fields_overlap(c, wanted))),
            _ => false,
        }
    }
}

/// Two field paths overlap when equal or when one is a dotted parent of the other
/// (`task` and `task.desk`).
pub fn fields_overlap(a: &str, b: &str) -> bool {
    fn is_parent(parent: &str, child: &str) -> bool {
        child.len() > parent.len()
            && child.starts_with(parent)
            && child.as_bytes()[parent.len()] == b'.'
    }
    a == b || is_parent(a, b) || is_parent(b, a)
}

fn changed_fields(raw: Option<&Value>) -> BTreeSet<String> {
    match raw {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn archive() -> ResourceName {
        ResourceName::new("archive").unwrap()
    }

    #[test]
    fn reads_update_with_field_map() {
        let change = ResourceChange::from_message(
            RESOURCE_UPDATED,
            &json!({"resource": "archive", "_id": "i1", "fields": {"headline": 1, "task": 1}}),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            change,
            ResourceChange::updated(archive(), ItemId::new("i1").unwrap(), ["headline", "task"])
        );
    }

    #[test]
    fn reads_update_with_field_list() {
        let change = ResourceChange::from_message(
            RESOURCE_UPDATED,
            &json!({"resource": "archive", "_id": "i1", "fields": ["slugline"]}),
        )
        .unwrap()
        .unwrap();
        assert!(change.touches_any(&["slugline".to_string()]));
    }

    #[test]
    fn missing_fields_mean_empty_set() {
        let change = ResourceChange::from_message(
            RESOURCE_UPDATED,
            &json!({"resource": "archive", "_id": "i1"}),
        )
        .unwrap()
        .unwrap();
        assert_eq!(change.kind, ChangeKind::Updated { fields: BTreeSet::new() });
    }

    #[test]
    fn other_events_are_ignored() {
        let result = ResourceChange::from_message("content:update", &json!({})).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_id_is_invalid() {
        let result = ResourceChange::from_message(RESOURCE_DELETED, &json!({"resource": "archive"}));
        assert!(result.is_err());
    }

    #[test]
    fn dotted_paths_overlap_with_parents() {
        assert!(fields_overlap("task", "task.desk"));
        assert!(fields_overlap("task.stage", "task"));
        assert!(fields_overlap("state", "state"));
        assert!(!fields_overlap("task", "tasks"));
        assert!(!fields_overlap("task.desk", "task.stage"));
    }

    #[test]
    fn create_and_delete_touch_nothing() {
        let id = ItemId::new("i").unwrap();
        let fields = vec!["state".to_string()];
        assert!(!ResourceChange::created(archive(), id.clone()).touches_any(&fields));
        assert!(!ResourceChange::deleted(archive(), id).touches_any(&fields));
    }
}
