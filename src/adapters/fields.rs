// Lenient readers for vendor JSON fields that change type between firmware
// releases (an integer in one, a boolean or numeric string in the next).

use serde_json::Value;

pub(crate) fn as_bool_lenient(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" => Some(true),
            "false" | "off" | "no" | "" => Some(false),
            other => other.parse::<f64>().ok().map(|f| f != 0.0),
        },
        _ => None,
    }
}

pub(crate) fn as_f64_lenient(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub(crate) fn as_i64_lenient(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

pub(crate) fn f64_or(value: Option<&Value>, default: f64) -> f64 {
    as_f64_lenient(value).unwrap_or(default)
}

pub(crate) fn i64_or(value: Option<&Value>, default: i64) -> i64 {
    as_i64_lenient(value).unwrap_or(default)
}

pub(crate) fn u64_or_zero(value: Option<&Value>) -> u64 {
    as_i64_lenient(value).map(|v| v.max(0) as u64).unwrap_or(0)
}

pub(crate) fn u32_or_zero(value: Option<&Value>) -> u32 {
    as_i64_lenient(value).map(|v| v.clamp(0, u32::MAX as i64) as u32).unwrap_or(0)
}

pub(crate) fn string_or_empty(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// "x,y,z" or [x, y, z] into an ordered vector.
pub(crate) fn coordinates(value: Option<&Value>) -> Vec<f64> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .filter_map(|p| p.trim().parse::<f64>().ok())
            .collect(),
        Some(Value::Array(items)) => items.iter().filter_map(|v| as_f64_lenient(Some(v))).collect(),
        _ => Vec::new(),
    }
}

/// Nested lookup, e.g. `path(v, &["Status", "PrintInfo"])`.
pub(crate) fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |v, k| v.get(*k))
}
