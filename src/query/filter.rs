//! Filter expression tree decoded from caller input
//!
//! A node is either a composite (`and` / `or` / `not`) or a field map. Field
//! values are a scalar (implicit equality), an operator object
//! (`{"gt": 1, "lt": 5}`) or a nested expression for relation equality
//! (`{"category": {"name": "Dairy"}}`).
//!
//! Decoding is strict: mixing composite and field keys, unknown keys next to
//! operators and bare arrays are rejected as malformed input.

use std::collections::BTreeMap;

use super::value::{Scalar, Value};
use crate::error::EntityError;

/// Operator keys recognised inside a field's object value.
pub const OPERATOR_KEYS: &[&str] = &[
    "like",
    "startsWith",
    "endsWith",
    "in",
    "isNull",
    "from",
    "to",
    "gt",
    "gte",
    "lt",
    "lte",
    "not",
];

const COMPOSITE_KEYS: &[&str] = &["and", "or", "not"];

/// A decoded filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Fields(Vec<(String, FieldCondition)>),
}

/// Condition attached to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    Equals(Scalar),
    Operators(OperatorSpec),
    Nested(FilterNode),
}

/// Per-field operators. Several may be present; the resolver picks one by priority.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorSpec {
    pub like: Option<Scalar>,
    pub starts_with: Option<Scalar>,
    pub ends_with: Option<Scalar>,
    pub in_list: Option<Vec<Scalar>>,
    pub is_null: Option<bool>,
    pub from: Option<Scalar>,
    pub to: Option<Scalar>,
    pub gt: Option<Scalar>,
    pub gte: Option<Scalar>,
    pub lt: Option<Scalar>,
    pub lte: Option<Scalar>,
    pub not: Option<Scalar>,
}

impl FilterNode {
    /// Decode from a value tree (native JSON or normalized text input).
    pub fn from_value(value: Value) -> Result<Self, EntityError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(EntityError::malformed(format!(
                "search must be an object, got {}",
                other.kind()
            ))),
        }
    }

    /// Decode a JSON-encoded expression.
    pub fn from_json_str(s: &str) -> Result<Self, EntityError> {
        let json: serde_json::Value = serde_json::from_str(s)
            .map_err(|_| EntityError::malformed("search must be valid JSON"))?;
        Self::from_value(Value::from(json))
    }

    /// An expression with no conditions
    pub fn empty() -> Self {
        FilterNode::Fields(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterNode::Fields(fields) if fields.is_empty())
    }

    /// Field names referenced at this level, including those under composites.
    /// Nested relation expressions are reported by their relation name only.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_field_names(&mut names);
        names
    }

    fn collect_field_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterNode::And(nodes) | FilterNode::Or(nodes) => {
                for node in nodes {
                    node.collect_field_names(out);
                }
            }
            FilterNode::Not(inner) => inner.collect_field_names(out),
            FilterNode::Fields(fields) => out.extend(fields.iter().map(|(name, _)| name.as_str())),
        }
    }

    fn from_map(map: BTreeMap<String, Value>) -> Result<Self, EntityError> {
        let composite: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|k| COMPOSITE_KEYS.contains(k))
            .collect();

        if composite.is_empty() {
            let mut fields = Vec::with_capacity(map.len());
            for (field, value) in map {
                let condition = FieldCondition::decode(&field, value)?;
                fields.push((field, condition));
            }
            return Ok(FilterNode::Fields(fields));
        }

        if composite.len() > 1 || map.len() > 1 {
            return Err(EntityError::malformed(format!(
                "a filter node must contain exactly one of and/or/not and no field keys, got [{}]",
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            )));
        }

        let Some((key, value)) = map.into_iter().next() else {
            return Ok(FilterNode::empty());
        };
        match key.as_str() {
            "and" => Ok(FilterNode::And(Self::decode_list("and", value)?)),
            "or" => Ok(FilterNode::Or(Self::decode_list("or", value)?)),
            _ => Ok(FilterNode::Not(Box::new(Self::from_value(value)?))),
        }
    }

    fn decode_list(key: &str, value: Value) -> Result<Vec<FilterNode>, EntityError> {
        match value {
            Value::List(items) => items.into_iter().map(Self::from_value).collect(),
            other => Err(EntityError::malformed(format!(
                "`{}` must be an array of filter objects, got {}",
                key,
                other.kind()
            ))),
        }
    }
}

impl FieldCondition {
    fn decode(field: &str, value: Value) -> Result<Self, EntityError> {
        match value {
            Value::Object(map) => {
                let has_operator = map.keys().any(|k| OPERATOR_KEYS.contains(&k.as_str()));
                if has_operator {
                    OperatorSpec::decode(field, map).map(FieldCondition::Operators)
                } else {
                    FilterNode::from_map(map).map(FieldCondition::Nested)
                }
            }
            Value::List(_) => Err(EntityError::malformed(format!(
                "field `{}` cannot be compared to an array; use {{\"in\": [...]}}",
                field
            ))),
            scalar => Ok(FieldCondition::Equals(Scalar::try_from(scalar)?)),
        }
    }
}

impl OperatorSpec {
    fn decode(field: &str, map: BTreeMap<String, Value>) -> Result<Self, EntityError> {
        let mut spec = OperatorSpec::default();
        for (key, value) in map {
            let scalar = |value: Value| -> Result<Scalar, EntityError> {
                Scalar::try_from(value).map_err(|_| {
                    EntityError::malformed(format!(
                        "operator `{}` on field `{}` expects a scalar",
                        key, field
                    ))
                })
            };
            match key.as_str() {
                "like" => spec.like = Some(scalar(value)?),
                "startsWith" => spec.starts_with = Some(scalar(value)?),
                "endsWith" => spec.ends_with = Some(scalar(value)?),
                "from" => spec.from = Some(scalar(value)?),
                "to" => spec.to = Some(scalar(value)?),
                "gt" => spec.gt = Some(scalar(value)?),
                "gte" => spec.gte = Some(scalar(value)?),
                "lt" => spec.lt = Some(scalar(value)?),
                "lte" => spec.lte = Some(scalar(value)?),
                "not" => spec.not = Some(scalar(value)?),
                "in" => match value {
                    Value::List(items) => {
                        spec.in_list = Some(
                            items
                                .into_iter()
                                .map(Scalar::try_from)
                                .collect::<Result<Vec<_>, _>>()?,
                        )
                    }
                    other => {
                        return Err(EntityError::malformed(format!(
                            "operator `in` on field `{}` expects an array, got {}",
                            field,
                            other.kind()
                        )));
                    }
                },
                "isNull" => match value {
                    Value::Bool(flag) => spec.is_null = Some(flag),
                    other => {
                        return Err(EntityError::malformed(format!(
                            "operator `isNull` on field `{}` expects a boolean, got {}",
                            field,
                            other.kind()
                        )));
                    }
                },
                unknown => {
                    return Err(EntityError::malformed(format!(
                        "unknown operator `{}` on field `{}`",
                        unknown, field
                    )));
                }
            }
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn decode(json: serde_json::Value) -> Result<FilterNode, EntityError> {
        FilterNode::from_value(Value::from(json))
    }

    #[test]
    fn test_field_map_with_scalars() {
        let node = decode(json!({"name": "cheese", "inStock": true})).unwrap();
        assert_eq!(
            node,
            FilterNode::Fields(vec![
                ("inStock".into(), FieldCondition::Equals(Scalar::Bool(true))),
                ("name".into(), FieldCondition::Equals(Scalar::Text("cheese".into()))),
            ])
        );
    }

    #[test]
    fn test_composites() {
        let node = decode(json!({"or": [{"id": 1}, {"id": 2}]})).unwrap();
        assert_matches!(node, FilterNode::Or(ref items) if items.len() == 2);

        let node = decode(json!({"not": {"inStock": true}})).unwrap();
        assert_matches!(node, FilterNode::Not(_));
    }

    #[test]
    fn test_operator_and_nested_values() {
        let node = decode(json!({"price": {"gt": 1, "lte": 5}, "user": {"id": 1}})).unwrap();
        let FilterNode::Fields(fields) = node else {
            panic!("expected field map");
        };
        assert_matches!(&fields[0].1, FieldCondition::Operators(spec) if spec.gt == Some(Scalar::Int(1)));
        assert_matches!(&fields[1].1, FieldCondition::Nested(FilterNode::Fields(_)));
    }

    #[test]
    fn test_rejects_composite_mixed_with_fields() {
        let err = decode(json!({"or": [{"id": 1}], "name": "x"})).unwrap_err();
        assert_matches!(err, EntityError::MalformedInput(_));
    }

    #[test]
    fn test_rejects_unknown_key_next_to_operator() {
        let err = decode(json!({"price": {"gt": 1, "between": 5}})).unwrap_err();
        assert_matches!(err, EntityError::MalformedInput(msg) if msg.contains("between"));
    }

    #[test]
    fn test_rejects_bad_operator_values() {
        assert!(decode(json!({"id": {"in": 5}})).is_err());
        assert!(decode(json!({"id": {"isNull": "yes"}})).is_err());
        assert!(decode(json!({"id": [1, 2]})).is_err());
        assert!(decode(json!({"and": {"id": 1}})).is_err());
        assert!(decode(json!([{"id": 1}])).is_err());
    }

    #[test]
    fn test_from_json_str() {
        assert!(FilterNode::from_json_str(r#"{"id": 1}"#).is_ok());
        assert_matches!(
            FilterNode::from_json_str("{id: 1"),
            Err(EntityError::MalformedInput(_))
        );
    }

    #[test]
    fn test_field_names_walk_composites() {
        let node = decode(json!({"and": [{"name": "a"}, {"or": [{"price": 1}, {"not": {"inStock": true}}]}]}))
            .unwrap();
        assert_eq!(node.field_names(), vec!["name", "price", "inStock"]);
    }
}
