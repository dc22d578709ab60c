//! Query option assembler
//!
//! Runs the resolvers over an [`EntityQueryOptions`] and produces the
//! [`QueryOptions`] a store executes. Every field and sort key is checked
//! against the schema here, so nothing a caller typed reaches SQL as an
//! identifier.

use super::options::{EntityQueryOptions, OrderSpec};
use super::pagination::{PageLimits, Pagination};
use super::relations::resolve_relations;
use super::resolve::{FieldPredicate, Predicate, resolve_filter};
use super::selection::{ExcludeList, Selection, resolve_selection};
use super::value::Scalar;
use crate::error::EntityError;
use crate::orm::{EntitySchema, RelationKind};

/// Fully resolved options for one store call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub predicate: Predicate,
    pub selection: Selection,
    /// Relation paths to load, validated and free of excluded relations
    pub relations: Vec<String>,
    pub order: OrderSpec,
    /// `None` means a plain listing: no skip/take and no count
    pub pagination: Option<Pagination>,
}

impl QueryOptions {
    /// Point lookup by primary key with the default selection
    pub fn by_key(schema: &EntitySchema, id: Scalar) -> Self {
        Self {
            predicate: Predicate::eq(schema.primary_key, id),
            selection: Selection::default_for(schema),
            relations: Vec::new(),
            order: OrderSpec::default(),
            pagination: None,
        }
    }

    pub fn skip(&self) -> Option<i64> {
        self.pagination.map(|p| p.skip())
    }

    pub fn take(&self) -> Option<i64> {
        self.pagination.map(|p| p.take())
    }
}

/// Assemble store options from caller options.
///
/// `identity` is AND-ed onto the caller's filter (primary key lookups).
pub fn assemble(
    schema: &EntitySchema,
    options: &EntityQueryOptions,
    identity: Option<(&str, Scalar)>,
    limits: PageLimits,
) -> Result<QueryOptions, EntityError> {
    let predicate = resolve_filter(options.search.as_ref())?;
    validate_predicate(schema, &predicate, FieldAccess::Visible)?;

    let predicate = match identity {
        Some((field, value)) => predicate.and_eq(field, value),
        None => predicate,
    };

    let excludes = ExcludeList::parse(options.exclude.as_deref());
    let relations = resolve_relations(schema, options.relations.as_ref(), &excludes)?;
    let selection = resolve_selection(schema, &relations, &excludes)?;

    validate_order(schema, &options.sort)?;

    let pagination = options
        .wants_pagination()
        .then(|| Pagination::new(options.page, options.page_size, limits));

    Ok(QueryOptions {
        predicate,
        selection,
        relations,
        order: options.sort.clone(),
        pagination,
    })
}

/// Which columns a predicate may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    /// Caller filters: always-excluded fields are off limits
    Visible,
    /// Trusted application predicates (e.g. lookup by email)
    Any,
}

/// Check every field a predicate references exists on `schema`.
pub fn validate_predicate(
    schema: &EntitySchema,
    predicate: &Predicate,
    access: FieldAccess,
) -> Result<(), EntityError> {
    match predicate {
        Predicate::All { fields, groups } => {
            for (name, field) in fields {
                validate_field(schema, name, field, access)?;
            }
            for group in groups {
                validate_predicate(schema, group, access)?;
            }
            Ok(())
        }
        Predicate::Any(branches) => {
            for branch in branches {
                validate_predicate(schema, branch, access)?;
            }
            Ok(())
        }
        Predicate::Not(inner) => validate_predicate(schema, inner, access),
    }
}

fn validate_field(
    schema: &EntitySchema,
    name: &str,
    field: &FieldPredicate,
    access: FieldAccess,
) -> Result<(), EntityError> {
    if let FieldPredicate::Related(inner) = field {
        let relation = schema.relation(name).ok_or_else(|| {
            EntityError::malformed(format!("`{}` is not a relation of {}", name, schema.name))
        })?;
        return validate_predicate(relation.target(), inner, access);
    }

    if schema.relation(name).is_some() {
        return Err(EntityError::malformed(format!(
            "relation `{}` must be filtered with a nested condition, e.g. {{\"{}\": {{\"id\": 1}}}}",
            name, name
        )));
    }
    if !schema.has_column(name) || (access == FieldAccess::Visible && schema.is_always_excluded(name)) {
        return Err(EntityError::malformed(format!(
            "unknown filter field `{}` on {}",
            name, schema.name
        )));
    }
    Ok(())
}

fn validate_order(schema: &EntitySchema, order: &OrderSpec) -> Result<(), EntityError> {
    for (key, _) in order.iter() {
        let valid = match key.split_once('.') {
            None => schema.has_column(key) && !schema.is_always_excluded(key),
            Some((relation, column)) => match schema.relation(relation) {
                Some(rel) if matches!(rel.kind, RelationKind::BelongsTo { .. }) => {
                    let target = rel.target();
                    target.has_column(column) && !target.is_always_excluded(column)
                }
                _ => false,
            },
        };
        if !valid {
            return Err(EntityError::malformed(format!(
                "cannot sort {} by `{}`",
                schema.name, key
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{product, user};
    use crate::query::options::SortDirection;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn options(json: serde_json::Value) -> EntityQueryOptions {
        EntityQueryOptions::from_json(&json).unwrap()
    }

    fn build(json: serde_json::Value) -> Result<QueryOptions, EntityError> {
        assemble(product::schema(), &options(json), None, PageLimits::default())
    }

    #[test]
    fn test_plain_listing_has_no_pagination() {
        let q = build(json!({})).unwrap();
        assert!(q.predicate.is_match_all());
        assert!(q.pagination.is_none());
        assert_eq!(q.skip(), None);
        assert!(q.relations.is_empty());
    }

    #[test]
    fn test_page_or_page_size_enables_pagination() {
        let q = build(json!({"pageSize": 5})).unwrap();
        assert_eq!(q.skip(), Some(0));
        assert_eq!(q.take(), Some(5));

        let q = build(json!({"page": 3})).unwrap();
        assert_eq!(q.skip(), Some(20));
        assert_eq!(q.take(), Some(10));
    }

    #[test]
    fn test_max_page_size_clamps() {
        let limits = PageLimits {
            default_page_size: 10,
            max_page_size: 25,
        };
        let q = assemble(product::schema(), &options(json!({"pageSize": 500})), None, limits).unwrap();
        assert_eq!(q.take(), Some(25));
    }

    #[test]
    fn test_identity_is_anded_with_search() {
        let q = assemble(
            product::schema(),
            &options(json!({"search": {"name": "milk"}})),
            Some(("id", Scalar::Int(4))),
            PageLimits::default(),
        )
        .unwrap();
        assert_eq!(q.predicate.get("id"), Some(&FieldPredicate::Eq(Scalar::Int(4))));
        assert!(q.predicate.get("name").is_some());
    }

    #[test]
    fn test_unknown_search_field_is_rejected() {
        assert_matches!(
            build(json!({"search": {"colour": "red"}})),
            Err(EntityError::MalformedInput(msg)) if msg.contains("colour")
        );
        assert!(build(json!({"search": {"category": {"shade": 1}}})).is_err());
        assert!(build(json!({"search": {"category": 3}})).is_err());
    }

    #[test]
    fn test_relation_search_is_accepted() {
        let q = build(json!({"search": {"category": {"name": "Dairy"}}})).unwrap();
        assert_matches!(q.predicate.get("category"), Some(FieldPredicate::Related(_)));
    }

    #[test]
    fn test_hidden_fields_cannot_be_searched_or_sorted() {
        let opts = options(json!({"search": {"password": "x"}}));
        assert!(assemble(user::schema(), &opts, None, PageLimits::default()).is_err());

        let opts = options(json!({"sort": {"creator": {"password": "ASC"}}}));
        assert!(assemble(product::schema(), &opts, None, PageLimits::default()).is_err());
    }

    #[test]
    fn test_sort_validation() {
        let q = build(json!({"sort": {"category": {"name": "DESC"}, "price": "ASC"}})).unwrap();
        assert_eq!(
            q.order.0,
            vec![
                ("category.name".to_string(), SortDirection::Desc),
                ("price".to_string(), SortDirection::Asc),
            ]
        );
        assert!(build(json!({"sort": {"weight": "ASC"}})).is_err());
        assert!(build(json!({"sort": {"category": {"parent": {"name": "ASC"}}}})).is_err());
    }

    #[test]
    fn test_exclude_shapes_selection_and_relations() {
        let q = build(json!({"relations": "category,creator", "exclude": "price,creator,category.name"})).unwrap();
        assert_eq!(q.relations, vec!["category"]);
        assert!(!q.selection.includes("price"));
        let category = q.selection.relation("category").unwrap();
        assert!(!category.columns.contains(&"name"));
        assert!(q.selection.relation("creator").is_none());
    }

    #[test]
    fn test_trusted_predicate_may_use_hidden_fields() {
        let predicate = Predicate::eq("password", Scalar::from("hash"));
        assert!(validate_predicate(user::schema(), &predicate, FieldAccess::Any).is_ok());
        assert!(validate_predicate(user::schema(), &predicate, FieldAccess::Visible).is_err());
    }
}
