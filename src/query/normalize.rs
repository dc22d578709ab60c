//! Value normalizer for text-encoded query input
//!
//! Query strings carry every leaf as a string. Before such input reaches the
//! filter decoder, string leaves are coerced:
//! - "true" / "false" -> booleans
//! - "null" -> null, "undefined" -> key removed
//! - numeric text -> Int / Float
//! - ISO date prefixed text (YYYY-MM-DD...) that parses -> Date
//!
//! Nested objects are walked recursively, including objects inside arrays
//! (`or` / `and` lists). Scalar array elements such as `in` lists keep their
//! text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::value::Value;

static ISO_DATE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

/// Normalize an optional text-channel value. `None` stays `None`.
pub fn normalize(input: Option<&JsonValue>) -> Option<Value> {
    input.map(normalize_value)
}

fn normalize_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Object(map) => Value::Object(
            map.iter()
                .filter_map(|(key, value)| match value {
                    JsonValue::String(s) if s == "undefined" => None,
                    other => Some((key.clone(), normalize_value(other))),
                })
                .collect(),
        ),
        JsonValue::Array(items) => Value::List(
            items
                .iter()
                .map(|item| match item {
                    JsonValue::Object(_) => normalize_value(item),
                    other => Value::from(other.clone()),
                })
                .collect(),
        ),
        JsonValue::String(s) => coerce_str(s),
        other => Value::from(other.clone()),
    }
}

/// Coerce a single string leaf.
pub fn coerce_str(s: &str) -> Value {
    match s {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Some(number) = parse_number(s) {
        return number;
    }

    if ISO_DATE_PREFIX.is_match(s) {
        if let Some(date) = parse_date(s) {
            return Value::Date(date);
        }
    }

    Value::Text(s.to_string())
}

fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::Int(i));
    }
    // f64 parsing accepts "inf" and "nan"; only plain decimal text counts
    let plain = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if !plain {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
