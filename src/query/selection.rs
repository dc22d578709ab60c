//! Field selection: which columns to fetch for the root entity and each relation
//!
//! Root columns drop the entity's always-excluded fields and every
//! non-dotted exclude. Each included relation path gets its own column list,
//! dropping the target's always-excluded fields and `<path>.<field>` excludes.

use crate::error::EntityError;
use crate::orm::EntitySchema;

/// Caller-supplied exclusions, e.g. `"price, category.name"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeList(Vec<String>);

impl ExcludeList {
    pub fn parse(raw: Option<&str>) -> Self {
        let entries = raw
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Self(entries)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|e| e == path)
    }

    /// Excluded fields directly under `path` (`path.field`, not deeper)
    pub fn fields_under<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter().filter_map(move |e| {
            e.strip_prefix(path)
                .and_then(|rest| rest.strip_prefix('.'))
                .filter(|field| !field.contains('.'))
        })
    }

    /// Excluded root fields (no dot)
    pub fn root_fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).filter(|e| !e.contains('.'))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Columns selected for one relation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSelection {
    pub path: String,
    pub columns: Vec<&'static str>,
}

/// Column-selection map for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub columns: Vec<&'static str>,
    pub relations: Vec<RelationSelection>,
}

impl Selection {
    /// Every column of the schema except always-excluded ones
    pub fn default_for(schema: &EntitySchema) -> Self {
        Self {
            columns: visible_columns(schema, std::iter::empty()),
            relations: Vec::new(),
        }
    }

    pub fn includes(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
    }

    pub fn relation(&self, path: &str) -> Option<&RelationSelection> {
        self.relations.iter().find(|r| r.path == path)
    }
}

fn visible_columns<'a>(
    schema: &EntitySchema,
    excluded: impl Iterator<Item = &'a str>,
) -> Vec<&'static str> {
    let excluded: Vec<&str> = excluded.collect();
    schema
        .columns
        .iter()
        .map(|c| c.name)
        .filter(|name| !schema.is_always_excluded(name) && !excluded.contains(name))
        .collect()
}

/// Compute the selection for `schema` with the final relation list.
///
/// Relation paths must already be validated; intermediate paths of dotted
/// relations (`category` for `category.parent`) get a selection too.
pub fn resolve_selection(
    schema: &EntitySchema,
    relations: &[String],
    excludes: &ExcludeList,
) -> Result<Selection, EntityError> {
    let columns = visible_columns(schema, excludes.root_fields());

    let mut paths: Vec<String> = Vec::new();
    for relation in relations {
        let segments: Vec<&str> = relation.split('.').collect();
        for depth in 1..=segments.len() {
            let prefix = segments[..depth].join(".");
            if !paths.contains(&prefix) {
                paths.push(prefix);
            }
        }
    }

    let mut selections = Vec::with_capacity(paths.len());
    for path in paths {
        let target = schema.schema_at(&path).ok_or_else(|| {
            EntityError::malformed(format!("unknown relation `{}` on {}", path, schema.name))
        })?;
        selections.push(RelationSelection {
            columns: visible_columns(target, excludes.fields_under(&path)),
            path,
        });
    }

    Ok(Selection {
        columns,
        relations: selections,
    })
}
