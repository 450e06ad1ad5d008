//! Eve list parameters for REST collection endpoints.

use serde_json::{json, Map, Value};

use super::descriptor::SortOption;
use crate::domain::foundation::ItemId;

/// Paging, sort and `where` filter for `GET /<resource>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListParams {
    /// One-based page number (Eve convention).
    pub page: Option<u32>,
    pub sort: Option<SortOption>,
    /// Raw Mongo-style `where` document.
    pub filter: Option<Map<String, Value>>,
    pub max_results: Option<u32>,
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn sort(mut self, sort: SortOption) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn filter(mut self, filter: Map<String, Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Restricts the list to the given ids: `where={"_id":{"$in":[...]}}`.
    pub fn only_ids(self, ids: &[ItemId]) -> Self {
        let mut filter = Map::new();
        filter.insert("_id".to_string(), json!({ "$in": ids }));
        self.filter(filter)
    }

    /// Renders the parameters as URL query pairs.
    ///
    /// An empty `where` document is omitted.
    pub fn to_url_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(sort) = &self.sort {
            params.push((
                "sort".to_string(),
                format!("[(\"{}\", {})]", sort.field, sort.direction.as_eve()),
            ));
        }
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            params.push(("where".to_string(), Value::Object(filter.clone()).to_string()));
        }
        if let Some(max_results) = self.max_results {
            params.push(("max_results".to_string(), max_results.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_parameters() {
        let mut filter = Map::new();
        filter.insert("desk".to_string(), json!("d1"));

        let params = ListParams::new()
            .page(2)
            .sort(SortOption::descending("_updated"))
            .filter(filter)
            .max_results(200)
            .to_url_params();

        assert_eq!(
            params,
            vec![
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "[(\"_updated\", -1)]".to_string()),
                ("where".to_string(), "{\"desk\":\"d1\"}".to_string()),
                ("max_results".to_string(), "200".to_string()),
            ]
        );
    }

    #[test]
    fn empty_where_is_omitted() {
        let params = ListParams::new().filter(Map::new()).to_url_params();
        assert!(params.is_empty());
    }

    #[test]
    fn only_ids_builds_in_filter() {
        let ids = vec![ItemId::new("a").unwrap(), ItemId::new("b").unwrap()];
        let params = ListParams::new().only_ids(&ids).to_url_params();
        assert_eq!(
            params,
            vec![("where".to_string(), "{\"_id\":{\"$in\":[\"a\",\"b\"]}}".to_string())]
        );
    }
}
