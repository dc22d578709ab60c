//! Caller-facing request options
//!
//! Options arrive either as a native JSON body or as a query string. Both
//! channels end in the same [`EntityQueryOptions`]; only the text channel
//! runs its leaves through the normalizer.

use serde_json::{Map, Value as JsonValue};

use super::filter::FilterNode;
use super::normalize::normalize;
use super::query_string;
use super::relations::RelationsInput;
use super::value::Value;
use crate::error::EntityError;

/// Sort direction of one order key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Accepts `asc`/`desc` in any case and `1`/`-1`.
    pub fn from_json(field: &str, json: &JsonValue) -> Result<Self, EntityError> {
        let parsed = match json {
            JsonValue::String(s) => match s.trim().to_ascii_uppercase().as_str() {
                "ASC" | "1" => Some(SortDirection::Asc),
                "DESC" | "-1" => Some(SortDirection::Desc),
                _ => None,
            },
            JsonValue::Number(n) => match n.as_i64() {
                Some(1) => Some(SortDirection::Asc),
                Some(-1) => Some(SortDirection::Desc),
                _ => None,
            },
            _ => None,
        };
        parsed.ok_or_else(|| {
            EntityError::malformed(format!(
                "invalid sort direction for `{}`: expected ASC or DESC, got {}",
                field, json
            ))
        })
    }
}

/// Ordered sort keys. Nested objects flatten to dotted relation paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec(pub Vec<(String, SortDirection)>);

impl OrderSpec {
    pub fn from_json(json: &JsonValue) -> Result<Self, EntityError> {
        match json {
            JsonValue::Null => Ok(Self::default()),
            JsonValue::Object(map) => {
                let mut keys = Vec::with_capacity(map.len());
                flatten_order(map, "", &mut keys)?;
                Ok(Self(keys))
            }
            JsonValue::String(s) => {
                let parsed: JsonValue = serde_json::from_str(s)
                    .map_err(|_| EntityError::malformed("sort must be valid JSON"))?;
                match parsed {
                    JsonValue::Object(_) => Self::from_json(&parsed),
                    other => Err(EntityError::malformed(format!("sort must be an object, got {}", other))),
                }
            }
            other => Err(EntityError::malformed(format!("sort must be an object, got {}", other))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.0.iter().map(|(field, dir)| (field.as_str(), *dir))
    }
}

fn flatten_order(
    map: &Map<String, JsonValue>,
    prefix: &str,
    out: &mut Vec<(String, SortDirection)>,
) -> Result<(), EntityError> {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            JsonValue::Object(nested) => flatten_order(nested, &path, out)?,
            direction => {
                let direction = SortDirection::from_json(&path, direction)?;
                out.push((path, direction));
            }
        }
    }
    Ok(())
}

/// Everything a caller may say about a read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQueryOptions {
    pub relations: Option<RelationsInput>,
    /// Comma-delimited field paths to leave out of the response
    pub exclude: Option<String>,
    pub search: Option<FilterNode>,
    pub sort: OrderSpec,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl EntityQueryOptions {
    /// Decode a native JSON body. Unknown keys are ignored.
    pub fn from_json(json: &JsonValue) -> Result<Self, EntityError> {
        match json {
            JsonValue::Null => Ok(Self::default()),
            JsonValue::Object(map) => Self::from_map(map, Channel::Json),
            other => Err(EntityError::malformed(format!(
                "query options must be an object, got {}",
                other
            ))),
        }
    }

    /// Decode a query string such as `search[price][gt]=100&page=1`.
    pub fn from_query_str(query: &str) -> Result<Self, EntityError> {
        let map = query_string::parse(query)?;
        Self::from_map(&map, Channel::Text)
    }

    /// Whether the caller asked for a paginated listing
    pub fn wants_pagination(&self) -> bool {
        self.page.is_some() || self.page_size.is_some()
    }

    pub fn with_search(mut self, search: FilterNode) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_relations(mut self, relations: &str) -> Self {
        self.relations = Some(RelationsInput::Delimited(relations.to_string()));
        self
    }

    pub fn with_exclude(mut self, exclude: &str) -> Self {
        self.exclude = Some(exclude.to_string());
        self
    }

    pub fn with_page(mut self, page: i64, page_size: i64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    fn from_map(map: &Map<String, JsonValue>, channel: Channel) -> Result<Self, EntityError> {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "relations" => options.relations = Some(RelationsInput::from_json(value)?),
                "exclude" => options.exclude = decode_exclude(value)?,
                "search" => options.search = decode_search(value, channel)?,
                "sort" => options.sort = OrderSpec::from_json(value)?,
                "page" => options.page = decode_integer("page", value)?,
                "pageSize" => options.page_size = decode_integer("pageSize", value)?,
                _ => {}
            }
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Json,
    Text,
}

fn decode_search(value: &JsonValue, channel: Channel) -> Result<Option<FilterNode>, EntityError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) if s.trim().is_empty() => Ok(None),
        JsonValue::String(s) => FilterNode::from_json_str(s).map(Some),
        JsonValue::Object(_) => {
            let tree = match channel {
                Channel::Json => Value::from(value.clone()),
                Channel::Text => normalize(Some(value)).unwrap_or(Value::Null),
            };
            FilterNode::from_value(tree).map(Some)
        }
        other => Err(EntityError::malformed(format!("search must be an object, got {}", other))),
    }
}

fn decode_exclude(value: &JsonValue) -> Result<Option<String>, EntityError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s.clone())),
        JsonValue::Array(items) => {
            let mut fields = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    JsonValue::String(s) => fields.push(s.as_str()),
                    other => {
                        return Err(EntityError::malformed(format!(
                            "exclude entries must be strings, got {}",
                            other
                        )));
                    }
                }
            }
            Ok(Some(fields.join(",")))
        }
        other => Err(EntityError::malformed(format!("exclude must be a string, got {}", other))),
    }
}

fn decode_integer(name: &str, value: &JsonValue) -> Result<Option<i64>, EntityError> {
    let parsed = match value {
        JsonValue::Null => return Ok(None),
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| EntityError::malformed(format!("{} must be an integer, got {}", name, value)))
}
