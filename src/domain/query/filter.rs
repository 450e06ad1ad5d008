//! Logical filter tree used by queries.
//!
//! The wire shape mirrors the backend's query language:
//!
//! ```text
//! {"$and": [ ... ]}
//! {"$or":  [ ... ]}
//! {"field": {"$eq": value}}
//! ```
//!
//! A field object holding several operators, or an object holding several
//! fields, is read as an implicit `$and`. `null` members of `$and`/`$or`
//! arrays are skipped so optional sub-filters can be spliced in freely.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::ValidationError;

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
}

impl Comparison {
    /// Operator token as it appears on the wire (`$eq`, `$gte`, ...).
    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::Eq(_) => "$eq",
            Comparison::Ne(_) => "$ne",
            Comparison::Gt(_) => "$gt",
            Comparison::Gte(_) => "$gte",
            Comparison::Lt(_) => "$lt",
            Comparison::Lte(_) => "$lte",
            Comparison::In(_) => "$in",
        }
    }

    /// Operand as a JSON value.
    pub fn operand(&self) -> Value {
        match self {
            Comparison::Eq(v)
            | Comparison::Ne(v)
            | Comparison::Gt(v)
            | Comparison::Gte(v)
            | Comparison::Lt(v)
            | Comparison::Lte(v) => v.clone(),
            Comparison::In(values) => Value::Array(values.clone()),
        }
    }

    fn parse(field: &str, operator: &str, operand: Value) -> Result<Self, ValidationError> {
        let comparison = match operator {
            "$eq" => Comparison::Eq(operand),
            "$ne" => Comparison::Ne(operand),
            "$gt" => Comparison::Gt(operand),
            "$gte" => Comparison::Gte(operand),
            "$lt" => Comparison::Lt(operand),
            "$lte" => Comparison::Lte(operand),
            "$in" => match operand {
                Value::Array(values) => Comparison::In(values),
                _ => {
                    return Err(ValidationError::invalid_format(
                        field,
                        "$in expects an array",
                    ))
                }
            },
            other => return Err(ValidationError::unsupported_operator(field, other)),
        };
        Ok(comparison)
    }
}

/// `$and` / `$or` tree of field comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Compare { field: String, comparison: Comparison },
}

impl Filter {
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn compare(field: impl Into<String>, comparison: Comparison) -> Self {
        Filter::Compare {
            field: field.into(),
            comparison,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq(value.into()))
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ne(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Gte(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lte(value.into()))
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::compare(
            field,
            Comparison::In(values.into_iter().map(Into::into).collect()),
        )
    }

    /// All field names the filter compares against.
    pub fn fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields(&self, into: &mut BTreeSet<String>) {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.collect_fields(into);
                }
            }
            Filter::Compare { field, .. } => {
                into.insert(field.clone());
            }
        }
    }

    fn parse_children(key: &str, value: Value) -> Result<Vec<Filter>, ValidationError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter(|item| !item.is_null())
                .map(Filter::try_from)
                .collect(),
            _ => Err(ValidationError::invalid_format(key, "expected an array")),
        }
    }

    fn parse_field(field: String, value: Value) -> Result<Filter, ValidationError> {
        let operators = match value {
            Value::Object(operators) => operators,
            _ => {
                return Err(ValidationError::invalid_format(
                    field,
                    "expected an operator object",
                ))
            }
        };

        let mut comparisons = operators
            .into_iter()
            .map(|(operator, operand)| {
                Comparison::parse(&field, &operator, operand)
                    .map(|comparison| Filter::compare(field.clone(), comparison))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match comparisons.len() {
            0 => Err(ValidationError::invalid_format(field, "no operator given")),
            1 => Ok(comparisons.remove(0)),
            _ => Ok(Filter::And(comparisons)),
        }
    }
}

impl TryFrom<Value> for Filter {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let object = match value {
            Value::Object(object) => object,
            _ => return Err(ValidationError::invalid_format("filter", "expected an object")),
        };

        let mut parts = Vec::with_capacity(object.len());
        for (key, value) in object {
            let part = if key == "$and" {
                Filter::And(Self::parse_children(&key, value)?)
            } else if key == "$or" {
                Filter::Or(Self::parse_children(&key, value)?)
            } else if key.is_empty() {
                return Err(ValidationError::empty_field("filter field"));
            } else if key.starts_with('$') {
                return Err(ValidationError::unsupported_operator("filter", key));
            } else {
                Self::parse_field(key, value)?
            };
            parts.push(part);
        }

        match parts.len() {
            0 => Err(ValidationError::invalid_format("filter", "empty filter object")),
            1 => Ok(parts.remove(0)),
            _ => Ok(Filter::And(parts)),
        }
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        let mut object = Map::new();
        match filter {
            Filter::And(children) => {
                object.insert(
                    "$and".to_string(),
                    Value::Array(children.into_iter().map(Value::from).collect()),
                );
            }
            Filter::Or(children) => {
                object.insert(
                    "$or".to_string(),
                    Value::Array(children.into_iter().map(Value::from).collect()),
                );
            }
            Filter::Compare { field, comparison } => {
                let mut operator = Map::new();
                operator.insert(comparison.operator().to_string(), comparison.operand());
                object.insert(field, Value::Object(operator));
            }
        }
        Value::Object(object)
    }
}
