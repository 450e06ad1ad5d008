//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Identifier of a backend item (the Eve `_id` field).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an ItemId, rejecting empty strings.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::empty_field("_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Name of a REST resource (e.g. `archive`, `desks`, `stages`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// Creates a ResourceName, rejecting empty strings and embedded slashes.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::empty_field("resource"));
        }
        if name.starts_with('/') {
            return Err(ValidationError::invalid_format(
                "resource",
                "must not start with '/'",
            ));
        }
        Ok(Self(name))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Collection path for this resource (`/archive`).
    pub fn path(&self) -> String {
        format!("/{}", self.0)
    }

    /// Item path for this resource (`/archive/<id>`).
    pub fn item_path(&self, id: &ItemId) -> String {
        format!("/{}/{}", self.0, id)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifies the owner of queued requests (one per provider or live container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Creates a new random OwnerId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an OwnerId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_rejects_empty() {
        assert!(ItemId::new("").is_err());
        assert_eq!(ItemId::new("urn:1").unwrap().as_str(), "urn:1");
    }

    #[test]
    fn resource_name_builds_paths() {
        let resource: ResourceName = "archive".parse().unwrap();
        let id = ItemId::new("abc").unwrap();
        assert_eq!(resource.path(), "/archive");
        assert_eq!(resource.item_path(&id), "/archive/abc");
    }

    #[test]
    fn resource_name_rejects_leading_slash() {
        assert!(ResourceName::new("/archive").is_err());
    }

    #[test]
    fn owner_ids_are_unique() {
        assert_ne!(OwnerId::new(), OwnerId::new());
    }

    #[test]
    fn item_id_serializes_transparently() {
        let id = ItemId::new("x1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"x1\"");
    }
}
