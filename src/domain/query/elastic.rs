//! Translation of logical queries into Elasticsearch request bodies.
//!
//! Translation is pure and total over the supported operator set, so it
//! returns plain values rather than `Result`s.

use serde::Serialize;
use serde_json::{json, Value};

use super::descriptor::QueryDescriptor;
use super::filter::{Comparison, Filter};

/// Body sent to the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElasticQuery {
    pub query: ElasticQueryBody,
    pub sort: Vec<Value>,
    pub size: u32,
    pub from: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElasticQueryBody {
    pub filtered: FilteredQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
}

impl ElasticQuery {
    /// JSON text for the `source` URL parameter of `/search`.
    pub fn to_source_param(&self) -> String {
        // Only strings, numbers and nested objects: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Translates a filter tree into an Elasticsearch filter.
pub fn to_elastic_filter(filter: &Filter) -> Value {
    match filter {
        Filter::And(children) => json!({ "and": children.iter().map(to_elastic_filter).collect::<Vec<_>>() }),
        Filter::Or(children) => json!({ "or": children.iter().map(to_elastic_filter).collect::<Vec<_>>() }),
        Filter::Compare { field, comparison } => comparison_to_elastic(field, comparison),
    }
}

fn comparison_to_elastic(field: &str, comparison: &Comparison) -> Value {
    match comparison {
        Comparison::Eq(value) => json!({ "term": { field: value } }),
        Comparison::Ne(value) => json!({ "not": { "term": { field: value } } }),
        Comparison::Gt(value) => range(field, "gt", value),
        Comparison::Gte(value) => range(field, "gte", value),
        Comparison::Lt(value) => range(field, "lt", value),
        Comparison::Lte(value) => range(field, "lte", value),
        Comparison::In(values) => json!({ "terms": { field: values } }),
    }
}

fn range(field: &str, bound: &str, value: &Value) -> Value {
    json!({ "range": { field: { bound: value } } })
}

/// Translates a whole query descriptor.
pub fn to_elastic_query(query: &QueryDescriptor) -> ElasticQuery {
    let full_text = query
        .full_text_search
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| {
            json!({
                "query_string": {
                    "query": text,
                    "lenient": true,
                    "default_operator": "AND"
                }
            })
        });

    ElasticQuery {
        query: ElasticQueryBody {
            filtered: FilteredQuery {
                filter: query.filter.as_ref().map(to_elastic_filter),
                query: full_text,
            },
        },
        sort: query
            .sort
            .iter()
            .map(|option| json!({ option.field.as_str(): option.direction.as_elastic() }))
            .collect(),
        size: query.max_results,
        from: query.offset(),
    }
}
