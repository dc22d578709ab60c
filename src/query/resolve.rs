//! Filter resolver: compiles a [`FilterNode`] into a store [`Predicate`]
//!
//! Operator priority per field (first match wins):
//! 1. lower (`gt`/`gte`) and upper (`lt`/`lte`) bound -> inclusive range,
//!    `gte` beats `gt` and `lte` beats `lt`
//! 2. `like`, 3. `startsWith`, 4. `endsWith` -> case-insensitive pattern
//! 5. `in`, 6. `isNull`
//! 7. `from` + `to` -> inclusive range, 8. `from`, 9. `to`
//! 10. single `gt` / `gte` / `lt` / `lte`
//! 11. `not` -> negated equality

use super::filter::{FieldCondition, FilterNode, OperatorSpec};
use super::value::Scalar;
use crate::error::EntityError;

/// Backing-store predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Conjunction of field predicates and nested groups. Empty matches everything.
    All {
        fields: Vec<(String, FieldPredicate)>,
        groups: Vec<Predicate>,
    },
    /// Disjunction of predicates
    Any(Vec<Predicate>),
    /// Negation of a predicate
    Not(Box<Predicate>),
}

/// Predicate applied to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicate {
    Eq(Scalar),
    Ne(Scalar),
    /// Case-insensitive match against a `%`-wildcard pattern
    ILike(String),
    In(Vec<Scalar>),
    IsNull,
    IsNotNull,
    /// Inclusive range
    Between(Scalar, Scalar),
    Gt(Scalar),
    Gte(Scalar),
    Lt(Scalar),
    Lte(Scalar),
    /// Predicate over a related entity (relation equality)
    Related(Box<Predicate>),
}

impl Predicate {
    /// The predicate that matches every row
    pub fn match_all() -> Self {
        Predicate::All {
            fields: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Predicate::All { fields, groups } if fields.is_empty() && groups.is_empty())
    }

    /// Single-field equality, e.g. a primary key lookup
    pub fn eq(field: impl Into<String>, value: Scalar) -> Self {
        Predicate::All {
            fields: vec![(field.into(), FieldPredicate::Eq(value))],
            groups: Vec::new(),
        }
    }

    /// AND an equality constraint onto this predicate without replacing it.
    pub fn and_eq(self, field: &str, value: Scalar) -> Self {
        match self {
            Predicate::All { mut fields, groups } if !fields.iter().any(|(f, _)| f == field) => {
                fields.insert(0, (field.to_string(), FieldPredicate::Eq(value)));
                Predicate::All { fields, groups }
            }
            other => Predicate::All {
                fields: vec![(field.to_string(), FieldPredicate::Eq(value))],
                groups: if other.is_match_all() {
                    Vec::new()
                } else {
                    vec![other]
                },
            },
        }
    }

    /// AND an arbitrary predicate onto this one.
    pub fn and(self, other: Predicate) -> Self {
        if other.is_match_all() {
            return self;
        }
        if self.is_match_all() {
            return other;
        }
        match self {
            Predicate::All { fields, mut groups } => {
                groups.push(other);
                Predicate::All { fields, groups }
            }
            current => Predicate::All {
                fields: Vec::new(),
                groups: vec![current, other],
            },
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldPredicate> {
        match self {
            Predicate::All { fields, .. } => fields.iter().find(|(f, _)| f == field).map(|(_, p)| p),
            _ => None,
        }
    }
}

/// Resolve an optional filter expression. Absent or empty input matches everything.
pub fn resolve_filter(node: Option<&FilterNode>) -> Result<Predicate, EntityError> {
    match node {
        None => Ok(Predicate::match_all()),
        Some(node) => resolve_node(node),
    }
}

fn resolve_node(node: &FilterNode) -> Result<Predicate, EntityError> {
    match node {
        FilterNode::Or(branches) => branches
            .iter()
            .map(resolve_node)
            .collect::<Result<Vec<_>, _>>()
            .map(Predicate::Any),
        FilterNode::And(branches) => {
            let mut fields: Vec<(String, FieldPredicate)> = Vec::new();
            let mut groups = Vec::new();
            for branch in branches {
                match resolve_node(branch)? {
                    Predicate::All {
                        fields: branch_fields,
                        groups: branch_groups,
                    } => {
                        for (name, predicate) in branch_fields {
                            if fields.iter().any(|(existing, _)| *existing == name) {
                                return Err(EntityError::malformed(format!(
                                    "field `{}` is constrained by more than one `and` branch; \
                                     combine the operators in a single condition",
                                    name
                                )));
                            }
                            fields.push((name, predicate));
                        }
                        groups.extend(branch_groups);
                    }
                    other => groups.push(other),
                }
            }
            Ok(Predicate::All { fields, groups })
        }
        FilterNode::Not(inner) => Ok(Predicate::Not(Box::new(resolve_node(inner)?))),
        FilterNode::Fields(conditions) => {
            let mut fields = Vec::with_capacity(conditions.len());
            for (name, condition) in conditions {
                fields.push((name.clone(), resolve_condition(condition)?));
            }
            Ok(Predicate::All {
                fields,
                groups: Vec::new(),
            })
        }
    }
}

fn resolve_condition(condition: &FieldCondition) -> Result<FieldPredicate, EntityError> {
    match condition {
        FieldCondition::Equals(value) => Ok(FieldPredicate::Eq(value.clone())),
        FieldCondition::Operators(spec) => resolve_operators(spec),
        FieldCondition::Nested(node) => Ok(FieldPredicate::Related(Box::new(resolve_node(node)?))),
    }
}

fn resolve_operators(spec: &OperatorSpec) -> Result<FieldPredicate, EntityError> {
    let lower = spec.gte.as_ref().or(spec.gt.as_ref());
    let upper = spec.lte.as_ref().or(spec.lt.as_ref());
    if let (Some(lower), Some(upper)) = (lower, upper) {
        return Ok(FieldPredicate::Between(lower.clone(), upper.clone()));
    }
    if let Some(value) = &spec.like {
        return Ok(FieldPredicate::ILike(format!("%{}%", value)));
    }
    if let Some(value) = &spec.starts_with {
        return Ok(FieldPredicate::ILike(format!("{}%", value)));
    }
    if let Some(value) = &spec.ends_with {
        return Ok(FieldPredicate::ILike(format!("%{}", value)));
    }
    if let Some(values) = &spec.in_list {
        return Ok(FieldPredicate::In(values.clone()));
    }
    if let Some(flag) = spec.is_null {
        return Ok(if flag {
            FieldPredicate::IsNull
        } else {
            FieldPredicate::IsNotNull
        });
    }
    match (&spec.from, &spec.to) {
        (Some(from), Some(to)) => return Ok(FieldPredicate::Between(from.clone(), to.clone())),
        (Some(from), None) => return Ok(FieldPredicate::Gte(from.clone())),
        (None, Some(to)) => return Ok(FieldPredicate::Lte(to.clone())),
        (None, None) => {}
    }
    if let Some(v) = &spec.gt {
        return Ok(FieldPredicate::Gt(v.clone()));
    }
    if let Some(v) = &spec.gte {
        return Ok(FieldPredicate::Gte(v.clone()));
    }
    if let Some(v) = &spec.lt {
        return Ok(FieldPredicate::Lt(v.clone()));
    }
    if let Some(v) = &spec.lte {
        return Ok(FieldPredicate::Lte(v.clone()));
    }
    match &spec.not {
        Some(v) => Ok(FieldPredicate::Ne(v.clone())),
        None => Err(EntityError::malformed("operator condition has no operators")),
    }
}
