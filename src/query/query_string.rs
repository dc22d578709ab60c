//! Bracket-notation query string decoding
//!
//! `search[price][gt]=100&search[id][in][]=1&relations[]=category` becomes
//! `{"search": {"price": {"gt": "100"}, "id": {"in": ["1"]}}, "relations": ["category"]}`.
//! Every leaf stays a string; typing is the normalizer's job.

use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

use crate::error::EntityError;

/// Decode a raw query string (without the leading `?`) into a JSON tree.
pub fn parse(query: &str) -> Result<Map<String, JsonValue>, EntityError> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut root = Node::Map(Vec::new());

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let path = split_key(&key)?;
        root.insert(&path, value.into_owned())
            .map_err(|_| EntityError::malformed(format!("conflicting query parameter `{}`", key)))?;
    }

    match root.into_json() {
        JsonValue::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Parameters decoded so far. Indexed list entries are kept by index and
/// compacted in index order, so `a[1]=x&a[0]=y` yields `["y", "x"]`.
#[derive(Debug)]
enum Node {
    Empty,
    Text(String),
    Map(Vec<(String, Node)>),
    List {
        indexed: BTreeMap<usize, Node>,
        appended: Vec<Node>,
    },
}

impl Node {
    fn list() -> Self {
        Node::List {
            indexed: BTreeMap::new(),
            appended: Vec::new(),
        }
    }

    fn insert(&mut self, path: &[String], value: String) -> Result<(), ()> {
        let Some((head, rest)) = path.split_first() else {
            match self {
                Node::Empty => *self = Node::Text(value),
                Node::List { appended, .. } => appended.push(Node::Text(value)),
                // repeated plain key collects into a list
                Node::Text(_) => {
                    let previous = std::mem::replace(self, Node::Empty);
                    *self = Node::List {
                        indexed: BTreeMap::new(),
                        appended: vec![previous, Node::Text(value)],
                    };
                }
                Node::Map(_) => return Err(()),
            }
            return Ok(());
        };

        let index = head.parse::<usize>().ok();
        if head.is_empty() || index.is_some() {
            if matches!(self, Node::Empty) {
                *self = Node::list();
            }
            let Node::List { indexed, appended } = self else {
                return Err(());
            };
            return match index {
                Some(index) => indexed.entry(index).or_insert(Node::Empty).insert(rest, value),
                None => {
                    let mut child = Node::Empty;
                    child.insert(rest, value)?;
                    appended.push(child);
                    Ok(())
                }
            };
        }

        if matches!(self, Node::Empty) {
            *self = Node::Map(Vec::new());
        }
        let Node::Map(entries) = self else {
            return Err(());
        };
        let position = match entries.iter().position(|(name, _)| name == head) {
            Some(position) => position,
            None => {
                entries.push((head.clone(), Node::Empty));
                entries.len() - 1
            }
        };
        entries[position].1.insert(rest, value)
    }

    fn into_json(self) -> JsonValue {
        match self {
            Node::Empty => JsonValue::Null,
            Node::Text(text) => JsonValue::String(text),
            Node::Map(entries) => JsonValue::Object(
                entries
                    .into_iter()
                    .map(|(name, node)| (name, node.into_json()))
                    .collect(),
            ),
            Node::List { indexed, appended } => JsonValue::Array(
                indexed
                    .into_values()
                    .chain(appended)
                    .map(Node::into_json)
                    .collect(),
            ),
        }
    }
}

/// `a[b][]` -> `["a", "b", ""]`
fn split_key(key: &str) -> Result<Vec<String>, EntityError> {
    let Some(open) = key.find('[') else {
        return Ok(vec![key.to_string()]);
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let close = match (rest.strip_prefix('['), rest.find(']')) {
            (Some(_), Some(close)) => close,
            _ => {
                return Err(EntityError::malformed(format!(
                    "malformed query parameter name `{}`",
                    key
                )));
            }
        };
        segments.push(rest[1..close].to_string());
        rest = &rest[close + 1..];
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_plain_pairs() {
        let map = parse("page=2&pageSize=5&exclude=price").unwrap();
        assert_eq!(JsonValue::Object(map), json!({"page": "2", "pageSize": "5", "exclude": "price"}));
    }

    #[test]
    fn test_bracket_notation() {
        let map = parse("search[price][gt]=100&search[id][in][]=1&search[id][in][]=2&sort[price]=DESC").unwrap();
        assert_eq!(
            JsonValue::Object(map),
            json!({
                "search": {"price": {"gt": "100"}, "id": {"in": ["1", "2"]}},
                "sort": {"price": "DESC"}
            })
        );
    }

    #[test]
    fn test_indexed_arrays() {
        let map = parse("search[or][0][id]=1&search[or][1][name]=milk&search[or][0][inStock]=true").unwrap();
        assert_eq!(
            map["search"],
            json!({"or": [{"id": "1", "inStock": "true"}, {"name": "milk"}]})
        );
    }

    #[test]
    fn test_indices_order_entries_not_arrival() {
        let map = parse("search[or][1][name]=Gift%20card&search[or][0][id]=1").unwrap();
        assert_eq!(
            map["search"],
            json!({"or": [{"id": "1"}, {"name": "Gift card"}]})
        );

        let map = parse("ids[2]=c&ids[0]=a&ids[1]=b").unwrap();
        assert_eq!(map["ids"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_percent_decoding_and_repeats() {
        let map = parse("?search%5Bname%5D%5Blike%5D=goat%20cheese&relations=category&relations=creator").unwrap();
        assert_eq!(map["search"], json!({"name": {"like": "goat cheese"}}));
        assert_eq!(map["relations"], json!(["category", "creator"]));
    }

    #[test]
    fn test_conflicts_and_malformed_names() {
        assert!(parse("search=1&search[id]=2").is_err());
        assert!(parse("search[id=2").is_err());
    }
}
