//! Shorthand JSON for values.
//!
//! Section configs write values the way stylesheet authors do: `0.4`, `"120"`,
//! `"brightness(0.4) blur(2px)"`. [`parse_value`] turns those, or the canonical
//! `{ "type": ..., "data": ... }` form, into a [`Value`].

use serde_json::Value as JsonValue;

use crate::filter::FilterValue;
use crate::value::{Value, ValueError};

/// Parse shorthand or canonical value JSON.
pub fn parse_value(json: &JsonValue) -> Result<Value, ValueError> {
    match json {
        JsonValue::Number(n) => n
            .as_f64()
            .map(|v| Value::Float(v as f32))
            .ok_or_else(|| ValueError::Parse(format!("non-finite number {n}"))),
        JsonValue::String(s) => parse_value_str(s),
        JsonValue::Object(_) => serde_json::from_value(json.clone())
            .map_err(|e| ValueError::Parse(format!("value object: {e}"))),
        other => Err(ValueError::Parse(format!("unsupported value json {other}"))),
    }
}

/// Parse a textual value: a bare number (units like `px`/`deg` are dropped) or a filter.
pub fn parse_value_str(s: &str) -> Result<Value, ValueError> {
    let trimmed = s.trim();
    let numeric_end = trimmed
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+'))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    if numeric_end > 0 {
        let unit = &trimmed[numeric_end..];
        if matches!(unit, "" | "px" | "deg" | "%" | "vh" | "vw" | "vmax" | "vmin") {
            if let Ok(v) = trimmed[..numeric_end].parse::<f32>() {
                return Ok(Value::Float(v));
            }
        }
    }
    trimmed.parse::<FilterValue>().map(Value::Filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_shorthand_forms() {
        assert_eq!(parse_value(&json!(0.5)).unwrap(), Value::Float(0.5));
        assert_eq!(parse_value(&json!("12px")).unwrap(), Value::Float(12.0));
        assert_eq!(parse_value(&json!("-45deg")).unwrap(), Value::Float(-45.0));
        let f = parse_value(&json!("blur(10px)")).unwrap();
        assert_eq!(f.to_css(), "blur(10px)");
    }

    #[test]
    fn parses_canonical_form() {
        let v = parse_value(&json!({ "type": "float", "data": 3.0 })).unwrap();
        assert_eq!(v, Value::Float(3.0));
    }

    #[test]
    fn rejects_bools_and_arrays() {
        assert!(parse_value(&json!(true)).is_err());
        assert!(parse_value(&json!([1, 2])).is_err());
    }
}
