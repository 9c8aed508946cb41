//! Composite filter values (`brightness(0.4) blur(2px)`).
//!
//! A filter is an ordered list of functions, each carrying one numeric amount and
//! an optional unit. Two filters interpolate function-by-function; a function
//! present on only one side is paired with its identity amount on the other
//! (`brightness(1)`, `blur(0)`), so `none` tweens cleanly into any filter.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::value::ValueError;

#[derive(Clone, Debug, PartialEq)]
pub struct FilterFn {
    pub name: String,
    pub amount: f32,
    /// Unit suffix as written (`px`, `deg`, `%`) or empty.
    pub unit: String,
}

impl FilterFn {
    pub fn new(name: impl Into<String>, amount: f32, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount,
            unit: unit.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterValue(Vec<FilterFn>);

/// Amount at which a filter function leaves the element unchanged.
pub fn identity_amount(name: &str) -> f32 {
    match name {
        "brightness" | "contrast" | "saturate" | "opacity" => 1.0,
        _ => 0.0,
    }
}

impl FilterValue {
    pub fn new(functions: Vec<FilterFn>) -> Self {
        Self(functions)
    }

    /// The empty filter (`none`).
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn functions(&self) -> &[FilterFn] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.0.iter().find(|f| f.name == name)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Combine two filters function-by-function. Functions missing on one side are
    /// filled from `fill_a` / `fill_b`. Order follows `a`, then functions only in `b`.
    pub fn merge_with(
        a: &FilterValue,
        b: &FilterValue,
        fill_a: fn(&str) -> f32,
        fill_b: fn(&str) -> f32,
        mut f: impl FnMut(f32, f32) -> f32,
    ) -> Result<FilterValue, ValueError> {
        let mut out = Vec::with_capacity(a.0.len().max(b.0.len()));
        for fa in &a.0 {
            let (amount_b, unit) = match b.get(&fa.name) {
                Some(fb) => (fb.amount, pick_unit(&fa.name, &fa.unit, &fb.unit)?),
                None => (fill_b(&fa.name), fa.unit.clone()),
            };
            out.push(FilterFn::new(fa.name.clone(), f(fa.amount, amount_b), unit));
        }
        for fb in b.0.iter().filter(|fb| a.get(&fb.name).is_none()) {
            out.push(FilterFn::new(
                fb.name.clone(),
                f(fill_a(&fb.name), fb.amount),
                fb.unit.clone(),
            ));
        }
        Ok(FilterValue(out))
    }

    pub fn max_abs_diff(&self, other: &FilterValue) -> Option<f32> {
        let mut max = 0.0f32;
        FilterValue::merge_with(self, other, identity_amount, identity_amount, |a, b| {
            max = max.max((a - b).abs());
            a
        })
        .ok()?;
        Some(max)
    }
}

fn pick_unit(name: &str, left: &str, right: &str) -> Result<String, ValueError> {
    if left == right || right.is_empty() {
        return Ok(left.to_string());
    }
    if left.is_empty() {
        return Ok(right.to_string());
    }
    Err(ValueError::UnitMismatch {
        function: name.to_string(),
        left: left.to_string(),
        right: right.to_string(),
    })
}

fn split_amount(arg: &str) -> Result<(f32, String), ValueError> {
    let arg = arg.trim();
    let split = arg
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+'))
        .map(|(i, _)| i)
        .unwrap_or(arg.len());
    let (num, unit) = arg.split_at(split);
    let amount = num
        .parse::<f32>()
        .map_err(|_| ValueError::Parse(format!("invalid filter amount '{arg}'")))?;
    Ok((amount, unit.trim().to_string()))
}

impl FromStr for FilterValue {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim();
        if rest.is_empty() || rest == "none" {
            return Ok(FilterValue::none());
        }
        let mut functions = Vec::new();
        while !rest.is_empty() {
            let open = rest
                .find('(')
                .ok_or_else(|| ValueError::Parse(format!("expected '(' in filter '{s}'")))?;
            let close = rest[open..]
                .find(')')
                .map(|i| i + open)
                .ok_or_else(|| ValueError::Parse(format!("unclosed '(' in filter '{s}'")))?;
            let name = rest[..open].trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
                return Err(ValueError::Parse(format!(
                    "invalid filter function name '{name}'"
                )));
            }
            let (amount, unit) = split_amount(&rest[open + 1..close])?;
            functions.push(FilterFn::new(name, amount, unit));
            rest = rest[close + 1..].trim_start();
        }
        Ok(FilterValue(functions))
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        for (i, func) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}({}{})", func.name, func.amount, func.unit)?;
        }
        Ok(())
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
