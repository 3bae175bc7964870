//! Canonical conversions between `Value` and `serde_json::Value`.
//!
//! Two directions, two modes out:
//! - **Strict** (`value_to_json`): errors on NaN/Infinity and on values
//!   with no JSON rendering (blocks, environments, bridges).
//! - **Lossy** (`value_to_json_lossy`): NaN/Infinity→null, opaque values
//!   →their print string.
//!
//! Symbols travel as `{"#": name}` in both directions.

use std::collections::BTreeMap;

use crate::error::SonError;
use crate::value::{resolve, Value};

/// Convert a JSON tree (AST or data) to a SON value.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            n.as_f64().map(Value::Number).unwrap_or(Value::Null)
        }
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(arr) => {
            Value::array(arr.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(obj) => {
            if obj.len() == 1 {
                if let Some(serde_json::Value::String(name)) = obj.get("#") {
                    return Value::symbol(name);
                }
            }
            let mut map = BTreeMap::new();
            for (k, v) in obj {
                map.insert(k.clone(), json_to_value(v));
            }
            Value::object(map)
        }
    }
}

/// Integral doubles render as JSON integers so that ASTs which came in as
/// integers leave as integers.
fn number_to_json(n: f64) -> Option<serde_json::Value> {
    if n.fract() == 0.0 && n.is_finite() && n.abs() <= i64::MAX as f64 {
        return Some(serde_json::Value::Number((n as i64).into()));
    }
    serde_json::Number::from_f64(n).map(serde_json::Value::Number)
}

/// Convert a SON value to JSON, erroring on NaN/Infinity and opaque types.
pub fn value_to_json(val: &Value) -> Result<serde_json::Value, SonError> {
    match val {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => number_to_json(*n)
            .ok_or_else(|| SonError::eval("cannot encode NaN/Infinity as JSON")),
        Value::String(s) => Ok(serde_json::Value::String(s.to_string())),
        Value::Symbol(s) => Ok(serde_json::json!({"#": resolve(*s)})),
        Value::Array(items) => {
            let arr: Result<Vec<_>, _> = items.iter().map(value_to_json).collect();
            Ok(serde_json::Value::Array(arr?))
        }
        Value::Object(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map.borrow().iter() {
                obj.insert(k.clone(), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(obj))
        }
        _ => Err(SonError::eval(format!(
            "cannot encode {} as JSON",
            val.type_name()
        ))),
    }
}

/// Convert a SON value to JSON without erroring. NaN/Infinity become
/// null, opaque values become their print string.
pub fn value_to_json_lossy(val: &Value) -> serde_json::Value {
    match val {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n).unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Symbol(s) => serde_json::json!({"#": resolve(*s)}),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json_lossy).collect())
        }
        Value::Object(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map.borrow().iter() {
                obj.insert(k.clone(), value_to_json_lossy(v));
            }
            serde_json::Value::Object(obj)
        }
        other => serde_json::Value::String(other.print_string()),
    }
}
