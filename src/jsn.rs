use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Top-level fields of a mutation payload.
///
/// Objects yield their own fields. Arrays (bulk payloads) yield the union of
/// their elements' fields, first occurrence wins, and set the array flag.
pub fn tree(value: &Value) -> Result<(Map<String, Value>, bool)> {
    match value {
        Value::Object(fields) => Ok((fields.clone(), false)),
        Value::Array(items) => {
            let mut fields = Map::new();
            for item in items {
                let obj = item.as_object().ok_or_else(|| {
                    Error::InvalidPayload("bulk payload items must be objects".to_string())
                })?;
                for (key, val) in obj {
                    if !fields.contains_key(key) {
                        fields.insert(key.clone(), val.clone());
                    }
                }
            }
            Ok((fields, true))
        }
        other => Err(Error::InvalidPayload(format!(
            "expected an object or an array, found {}",
            kind(other)
        ))),
    }
}

/// Whether a payload field holds nested data rather than a column value.
pub fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.first().map_or(false, Value::is_object),
        _ => false,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
