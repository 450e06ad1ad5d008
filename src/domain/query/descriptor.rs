//! Query descriptor: filter, sort order and paging for a list view.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::filter::Filter;

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Elasticsearch spelling (`asc` / `desc`).
    pub fn as_elastic(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }

    /// Eve spelling (`1` / `-1`).
    pub fn as_eve(&self) -> i8 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    fn from_elastic(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortDirection::Ascending),
            "desc" => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

/// A sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOption {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Logical query for a list of items.
///
/// Serialized in the shape list views exchange:
/// `{"filter": {...}, "sort": [{"versioncreated": "desc"}], "page": 0, "max_results": 50}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    #[serde(default, with = "elastic_sort")]
    pub sort: Vec<SortOption>,

    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,

    pub max_results: u32,

    #[serde(
        default,
        rename = "fullTextSearch",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_text_search: Option<String>,
}

impl QueryDescriptor {
    /// Query for the first page of `max_results` items with no filter.
    pub fn new(max_results: u32) -> Self {
        Self {
            filter: None,
            sort: Vec::new(),
            page: 0,
            max_results,
            full_text_search: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortOption) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_full_text_search(mut self, text: impl Into<String>) -> Self {
        self.full_text_search = Some(text.into());
        self
    }

    /// Offset of the first item on the requested page.
    pub fn offset(&self) -> u32 {
        self.page.saturating_mul(self.max_results)
    }

    /// Every field the result set depends on: filter fields plus sort keys.
    ///
    /// A change to any of these may move an item in or out of the result
    /// or reorder it, so it cannot be patched locally.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut fields = self
            .filter
            .as_ref()
            .map(Filter::fields)
            .unwrap_or_default();
        fields.extend(self.sort.iter().map(|s| s.field.clone()));
        fields
    }
}

/// `[{"field": "asc"}]` representation of sort keys.
mod elastic_sort {
    use std::collections::BTreeMap;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{SortDirection, SortOption};

    pub fn serialize<S: Serializer>(sort: &[SortOption], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(sort.iter().map(|option| {
            let mut entry = BTreeMap::new();
            entry.insert(option.field.as_str(), option.direction.as_elastic());
            entry
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SortOption>, D::Error> {
        let raw: Vec<BTreeMap<String, String>> = Vec::deserialize(deserializer)?;
        let mut sort = Vec::new();
        for entry in raw {
            for (field, direction) in entry {
                let direction = SortDirection::from_elastic(&direction)
                    .ok_or_else(|| D::Error::custom(format!("invalid sort direction '{direction}'")))?;
                sort.push(SortOption { field, direction });
            }
        }
        Ok(sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_list_view_shape() {
        let query: QueryDescriptor = serde_json::from_value(json!({
            "filter": {"$and": [{"state": {"$eq": "spiked"}}]},
            "sort": [{"versioncreated": "desc"}],
            "page": 2,
            "max_results": 25,
            "fullTextSearch": "election"
        }))
        .unwrap();

        assert_eq!(query.sort, vec![SortOption::descending("versioncreated")]);
        assert_eq!(query.offset(), 50);
        assert_eq!(query.full_text_search.as_deref(), Some("election"));
    }

    #[test]
    fn rejects_unknown_sort_direction() {
        let result = serde_json::from_value::<QueryDescriptor>(json!({
            "sort": [{"versioncreated": "sideways"}],
            "max_results": 25
        }));
        assert!(result.is_err());
    }

    #[test]
    fn serializes_sort_as_elastic_pairs() {
        let query = QueryDescriptor::new(10).with_sort(SortOption::ascending("slugline"));
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["sort"], json!([{"slugline": "asc"}]));
        assert!(value.get("filter").is_none());
    }

    #[test]
    fn referenced_fields_include_filter_and_sort() {
        let query = QueryDescriptor::new(50)
            .with_filter(Filter::eq("task.stage", "s1"))
            .with_sort(SortOption::descending("versioncreated"));

        let fields: Vec<_> = query.referenced_fields().into_iter().collect();
        assert_eq!(fields, vec!["task.stage", "versioncreated"]);
    }

    #[test]
    fn direction_spellings() {
        assert_eq!(SortDirection::Ascending.as_eve(), 1);
        assert_eq!(SortDirection::Descending.as_eve(), -1);
        assert_eq!(SortDirection::Descending.as_elastic(), "desc");
    }
}
