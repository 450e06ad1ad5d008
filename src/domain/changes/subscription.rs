//! Which resource changes a data provider wants to hear about.
//!
//! Wire form, per resource:
//!
//! ```text
//! {"archive": true}
//! {"archive": {"create": true, "update": ["state", "task.desk"], "delete": true}}
//! {"archive": {"update": true}}
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

use super::change::{ChangeKind, ResourceChange};
use crate::domain::foundation::ResourceName;

/// Interest in updates of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateInterest {
    #[default]
    Ignore,
    AnyField,
    Fields(BTreeSet<String>),
}

/// Interest in one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceInterest {
    Everything,
    Selective {
        create: bool,
        update: UpdateInterest,
        delete: bool,
    },
}

impl ResourceInterest {
    pub fn matches(&self, change: &ResourceChange) -> bool {
        let (create, update, delete) = match self {
            ResourceInterest::Everything => return true,
            ResourceInterest::Selective {
                create,
                update,
                delete,
            } => (create, update, delete),
        };

        match &change.kind {
            ChangeKind::Created => *create,
            ChangeKind::Deleted => *delete,
            ChangeKind::Updated { .. } => match update {
                UpdateInterest::Ignore => false,
                UpdateInterest::AnyField => true,
                UpdateInterest::Fields(fields) => change.touches_any(fields),
            },
        }
    }
}

/// Subscription spec: resource name → interest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "HashMap<ResourceName, RawInterest>")]
pub struct ListenTo {
    resources: HashMap<ResourceName, ResourceInterest>,
}

impl ListenTo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listens to every create, update and delete of `resource`.
    pub fn everything(mut self, resource: ResourceName) -> Self {
        self.resources.insert(resource, ResourceInterest::Everything);
        self
    }

    pub fn resource(mut self, resource: ResourceName, interest: ResourceInterest) -> Self {
        self.resources.insert(resource, interest);
        self
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceName> {
        self.resources.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// True when the change concerns a subscribed resource and kind.
    pub fn matches(&self, change: &ResourceChange) -> bool {
        self.resources
            .get(&change.resource)
            .map(|interest| interest.matches(change))
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInterest {
    Flag(bool),
    Selective {
        #[serde(default)]
        create: bool,
        #[serde(default)]
        update: Option<RawUpdate>,
        #[serde(default)]
        delete: bool,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUpdate {
    Flag(bool),
    Fields(Vec<String>),
}

impl From<HashMap<ResourceName, RawInterest>> for ListenTo {
    fn from(raw: HashMap<ResourceName, RawInterest>) -> Self {
        let resources = raw
            .into_iter()
            .filter_map(|(resource, interest)| {
                let interest = match interest {
                    RawInterest::Flag(true) => ResourceInterest::Everything,
                    RawInterest::Flag(false) => return None,
                    RawInterest::Selective {
                        create,
                        update,
                        delete,
                    } => ResourceInterest::Selective {
                        create,
                        update: match update {
                            None | Some(RawUpdate::Flag(false)) => UpdateInterest::Ignore,
                            Some(RawUpdate::Flag(true)) => UpdateInterest::AnyField,
                            Some(RawUpdate::Fields(fields)) => {
                                UpdateInterest::Fields(fields.into_iter().collect())
                            }
                        },
                        delete,
                    },
                };
                Some((resource, interest))
            })
            .collect();
        Self { resources }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ItemId;
    use serde_json::json;

    fn archive() -> ResourceName {
        ResourceName::new("archive").unwrap()
    }

    fn id() -> ItemId {
        ItemId::new("i1").unwrap()
    }

    fn overview_subscription() -> ListenTo {
        serde_json::from_value(json!({
            "archive": {
                "create": true,
                "update": ["state", "task.desk", "task.stage", "slugline"]
            },
            "desks": true,
            "users": false
        }))
        .unwrap()
    }

    #[test]
    fn created_matches_when_subscribed() {
        let listen = overview_subscription();
        assert!(listen.matches(&ResourceChange::created(archive(), id())));
    }

    #[test]
    fn delete_not_subscribed_is_ignored() {
        let listen = overview_subscription();
        assert!(!listen.matches(&ResourceChange::deleted(archive(), id())));
    }

    #[test]
    fn update_matches_on_intersecting_fields() {
        let listen = overview_subscription();
        assert!(listen.matches(&ResourceChange::updated(archive(), id(), ["slugline"])));
        assert!(listen.matches(&ResourceChange::updated(archive(), id(), ["task"])));
        assert!(!listen.matches(&ResourceChange::updated(archive(), id(), ["body_html"])));
    }

    #[test]
    fn true_flag_matches_everything() {
        let listen = overview_subscription();
        let desks = ResourceName::new("desks").unwrap();
        assert!(listen.matches(&ResourceChange::deleted(desks.clone(), id())));
        assert!(listen.matches(&ResourceChange::updated(desks, id(), Vec::<String>::new())));
    }

    #[test]
    fn false_flag_and_unknown_resources_match_nothing() {
        let listen = overview_subscription();
        let users = ResourceName::new("users").unwrap();
        let stages = ResourceName::new("stages").unwrap();
        assert!(!listen.matches(&ResourceChange::created(users, id())));
        assert!(!listen.matches(&ResourceChange::created(stages, id())));
    }

    #[test]
    fn update_true_matches_any_field() {
        let listen: ListenTo = serde_json::from_value(json!({"archive": {"update": true}})).unwrap();
        assert!(listen.matches(&ResourceChange::updated(archive(), id(), ["anything"])));
        assert!(!listen.matches(&ResourceChange::created(archive(), id())));
    }
}
