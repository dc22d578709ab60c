//! Relation list resolution
//!
//! Callers name relations as a comma-delimited string (`"category, shop"`),
//! an array (`["category"]`) or a map whose keys are the paths
//! (`{"category": true}`). The result is a canonical, de-duplicated list of
//! relation paths with excluded relations removed.

use serde_json::Value as JsonValue;

use super::selection::ExcludeList;
use crate::error::EntityError;
use crate::orm::EntitySchema;

/// Raw `relations` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationsInput {
    Delimited(String),
    List(Vec<String>),
    /// Keys of a mapping, in insertion order
    Map(Vec<String>),
}

impl RelationsInput {
    pub fn from_json(json: &JsonValue) -> Result<Self, EntityError> {
        match json {
            JsonValue::String(s) => Ok(RelationsInput::Delimited(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => Ok(s.clone()),
                    other => Err(EntityError::malformed(format!(
                        "relations entries must be strings, got {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>, EntityError>>()
                .map(RelationsInput::List),
            JsonValue::Object(map) => Ok(RelationsInput::Map(map.keys().cloned().collect())),
            JsonValue::Null => Ok(RelationsInput::List(Vec::new())),
            other => Err(EntityError::malformed(format!(
                "relations must be a string, array or object, got {}",
                other
            ))),
        }
    }

    /// Trimmed, non-empty paths in input order
    pub fn paths(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            RelationsInput::Delimited(s) => s.split(',').collect(),
            RelationsInput::List(items) | RelationsInput::Map(items) => {
                items.iter().map(String::as_str).collect()
            }
        };
        let mut paths: Vec<String> = Vec::with_capacity(raw.len());
        for path in raw.into_iter().map(str::trim).filter(|p| !p.is_empty()) {
            if !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
        paths
    }
}

/// Resolve the relations to load.
///
/// A relation whose path is excluded is dropped together with the paths
/// below it. Unknown relation paths are rejected.
pub fn resolve_relations(
    schema: &EntitySchema,
    input: Option<&RelationsInput>,
    excludes: &ExcludeList,
) -> Result<Vec<String>, EntityError> {
    let Some(input) = input else {
        return Ok(Vec::new());
    };

    let mut relations = Vec::new();
    for path in input.paths() {
        if is_excluded(&path, excludes) {
            continue;
        }
        if schema.relation_chain(&path).is_none() {
            return Err(EntityError::malformed(format!(
                "unknown relation `{}` on {}",
                path, schema.name
            )));
        }
        relations.push(path);
    }
    Ok(relations)
}

fn is_excluded(path: &str, excludes: &ExcludeList) -> bool {
    let mut prefix = String::new();
    for segment in path.split('.') {
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(segment);
        if excludes.contains(&prefix) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn resolve(input: JsonValue, exclude: Option<&str>) -> Result<Vec<String>, EntityError> {
        let input = RelationsInput::from_json(&input)?;
        resolve_relations(product::schema(), Some(&input), &ExcludeList::parse(exclude))
    }

    #[test]
    fn test_string_array_and_map_inputs() {
        assert_eq!(resolve(json!("category, creator"), None).unwrap(), vec!["category", "creator"]);
        assert_eq!(resolve(json!(["category", "creator"]), None).unwrap(), vec!["category", "creator"]);
        assert_eq!(
            resolve(json!({"creator": true, "category": true}), None).unwrap(),
            vec!["creator", "category"]
        );
    }

    #[test]
    fn test_nested_paths_are_kept_verbatim() {
        assert_eq!(
            resolve(json!("category.parent,creator"), None).unwrap(),
            vec!["category.parent", "creator"]
        );
    }

    #[test]
    fn test_excluded_relation_is_dropped() {
        assert_eq!(resolve(json!("category,creator"), Some("creator")).unwrap(), vec!["category"]);
        assert!(resolve(json!("category.parent"), Some("category")).unwrap().is_empty());
        // a field exclusion does not drop the relation itself
        assert_eq!(resolve(json!("category"), Some("category.id")).unwrap(), vec!["category"]);
    }

    #[test]
    fn test_duplicates_and_blanks() {
        assert_eq!(resolve(json!(" category ,, category"), None).unwrap(), vec!["category"]);
    }

    #[test]
    fn test_unknown_relation_is_rejected() {
        assert_matches!(resolve(json!("shop"), None), Err(EntityError::MalformedInput(_)));
        assert_matches!(resolve(json!(42), None), Err(EntityError::MalformedInput(_)));
    }

    #[test]
    fn test_absent_input() {
        let none = resolve_relations(product::schema(), None, &ExcludeList::default()).unwrap();
        assert!(none.is_empty());
    }
}
