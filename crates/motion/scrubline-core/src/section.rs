//! Declarative section configs: everything one page section mounts, as data.
//!
//! A section is mounted into its own scope, so unmounting it is one
//! `dispose_scope` call.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use scrubline_api_core::json::parse_value;
use scrubline_api_core::{PropertyKey, TargetHandle, Value};

use crate::error::EngineResult;
use crate::signals::PointerBindingConfig;
use crate::timeline::TimelineConfig;
use crate::tween::TweenConfig;

fn any_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    let json = JsonValue::deserialize(deserializer)?;
    parse_value(&json).map_err(serde::de::Error::custom)
}

/// Immediate value assignment, applied before any tween resolves its start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetConfig {
    pub target: TargetHandle,
    pub property: PropertyKey,
    #[serde(deserialize_with = "any_value")]
    pub value: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub set: Vec<SetConfig>,
    #[serde(default)]
    pub tweens: Vec<TweenConfig>,
    #[serde(default)]
    pub timelines: Vec<TimelineConfig>,
    #[serde(default)]
    pub pointer: Vec<PointerBindingConfig>,
}

impl SectionConfig {
    pub fn from_json_str(s: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json(json: JsonValue) -> EngineResult<Self> {
        Ok(serde_json::from_value(json)?)
    }

    /// Every target the section touches, without duplicates.
    pub fn targets(&self) -> Vec<TargetHandle> {
        let mut out: Vec<TargetHandle> = Vec::new();
        let mut push = |t: &TargetHandle| {
            if !out.contains(t) {
                out.push(t.clone());
            }
        };
        self.set.iter().for_each(|s| push(&s.target));
        self.tweens.iter().for_each(|t| push(&t.target));
        for tl in &self.timelines {
            for item in &tl.items {
                match item {
                    crate::timeline::TimelineItem::Tween(e) => push(&e.tween.target),
                    crate::timeline::TimelineItem::Group(g) => g.targets.iter().for_each(&mut push),
                }
            }
        }
        self.pointer.iter().for_each(|p| push(&p.target));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_section() {
        let section = SectionConfig::from_json(serde_json::json!({
            "name": "contact",
            "set": [{ "target": "line-1", "property": "opacity", "value": 0 }],
            "timelines": [{
                "trigger": { "trigger": "contact", "start": "top 70%" },
                "tweens": [{
                    "targets": ["line-1", "line-2"],
                    "tween": { "target": "_", "property": "opacity", "to": 1, "duration": 0.8 },
                    "stagger": 0.15
                }]
            }]
        }))
        .unwrap();
        assert_eq!(section.name.as_deref(), Some("contact"));
        assert_eq!(section.set[0].value, Value::Float(0.0));
        assert_eq!(
            section.targets(),
            vec![TargetHandle::new("line-1"), TargetHandle::new("line-2")]
        );
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        let err = SectionConfig::from_json_str("{ \"tweens\": 3 }").unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Parse(_)));
    }
}
