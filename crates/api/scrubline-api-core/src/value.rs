//! Value: the resolved state of one animatable property.
//! All numeric types use f32.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::filter::FilterValue;

/// Coarse kind used for quick dispatch and mismatch diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Float,
    Filter,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Float => f.write_str("float"),
            ValueKind::Filter => f.write_str("filter"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Value {
    /// Scalar float (translation, scale, rotation, opacity, custom fields)
    Float(f32),

    /// Composite filter string such as `brightness(0.4) blur(2px)`
    Filter(FilterValue),
}

/// Errors produced when values of different shapes meet in one operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("value kind mismatch: {left} vs {right}")]
    KindMismatch { left: ValueKind, right: ValueKind },
    #[error("filter '{function}' unit mismatch: '{left}' vs '{right}'")]
    UnitMismatch {
        function: String,
        left: String,
        right: String,
    },
    #[error("value parse error: {0}")]
    Parse(String),
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Filter(_) => ValueKind::Filter,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Filter(_) => None,
        }
    }

    /// True when every numeric component is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(v) => v.is_finite(),
            Value::Filter(f) => f.functions().iter().all(|func| func.amount.is_finite()),
        }
    }

    /// Largest absolute component-wise difference, or `None` if the shapes differ.
    pub fn max_abs_diff(&self, other: &Value) -> Option<f32> {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => Some((a - b).abs()),
            (Value::Filter(a), Value::Filter(b)) => a.max_abs_diff(b),
            _ => None,
        }
    }

    /// CSS-ish textual form, used by hosts that write style strings.
    pub fn to_css(&self) -> String {
        match self {
            Value::Float(v) => format!("{v}"),
            Value::Filter(f) => f.to_string(),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<FilterValue> for Value {
    fn from(v: FilterValue) -> Self {
        Value::Filter(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_tagged_lowercase_form() {
        let v = Value::Float(1.5);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "float", "data": 1.5 }));
        let back: Value = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn diff_is_none_across_kinds() {
        let f = Value::Filter("blur(2px)".parse().unwrap());
        assert_eq!(Value::Float(0.0).max_abs_diff(&f), None);
        assert_eq!(Value::Float(1.0).max_abs_diff(&Value::Float(3.5)), Some(2.5));
    }
}
