//! Tween declarations, timing and endpoint resolution.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use scrubline_api_core::blend::{delta, lerp};
use scrubline_api_core::json::{parse_value, parse_value_str};
use scrubline_api_core::{PropertyKey, TargetHandle, Value};

use crate::ease::Ease;
use crate::error::{EngineError, EngineResult};
use crate::ids::{TimelineId, TweenId};

/// What happens when a tween starts on a (target, property) pair that already
/// has an active tween from another owner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// Cancel the other tweens; the new one starts from the current value.
    #[default]
    #[serde(alias = "replace")]
    ReplaceExisting,
    /// Sum this tween's offset with whatever else is running.
    #[serde(alias = "additive", alias = "add")]
    CoexistAdditively,
    /// Drop this tween if anything else is animating the pair.
    #[serde(alias = "ignore")]
    IgnoreIfActive,
}

/// Repeat count after the first play. `-1` in JSON means forever.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RepeatCount {
    #[default]
    Never,
    Times(u32),
    Infinite,
}

impl RepeatCount {
    /// Total number of plays, or `None` if infinite.
    pub fn cycles(&self) -> Option<u32> {
        match self {
            RepeatCount::Never => Some(1),
            RepeatCount::Times(n) => Some(n.saturating_add(1)),
            RepeatCount::Infinite => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, RepeatCount::Infinite)
    }
}

impl Serialize for RepeatCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RepeatCount::Never => serializer.serialize_i64(0),
            RepeatCount::Times(n) => serializer.serialize_i64(i64::from(*n)),
            RepeatCount::Infinite => serializer.serialize_i64(-1),
        }
    }
}

impl<'de> Deserialize<'de> for RepeatCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = i64::deserialize(deserializer)?;
        match n {
            -1 => Ok(RepeatCount::Infinite),
            0 => Ok(RepeatCount::Never),
            n if n > 0 => u32::try_from(n)
                .map(RepeatCount::Times)
                .map_err(de::Error::custom),
            n => Err(de::Error::custom(format!("invalid repeat count {n}"))),
        }
    }
}

/// Where a tween starts.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum FromSpec {
    /// The pair's value when the tween is resolved.
    #[default]
    Current,
    Value(Value),
    /// The end value of the tween labelled `label`.
    EndOf(String),
}

/// Where a tween ends.
#[derive(Clone, Debug, PartialEq)]
pub enum ToSpec {
    Absolute(Value),
    /// `"+=8"` / `"-=8"`: relative to the resolved start value.
    Relative(f32),
}

fn parse_relative(s: &str) -> Option<f32> {
    let s = s.trim();
    let (sign, rest) = if let Some(r) = s.strip_prefix("+=") {
        (1.0, r)
    } else if let Some(r) = s.strip_prefix("-=") {
        (-1.0, r)
    } else {
        return None;
    };
    let num = rest.trim().trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%');
    num.parse::<f32>().ok().map(|v| sign * v)
}

impl ToSpec {
    fn from_json(json: &JsonValue) -> Result<Self, String> {
        if let Some(s) = json.as_str() {
            if s.starts_with("+=") || s.starts_with("-=") {
                return parse_relative(s)
                    .map(ToSpec::Relative)
                    .ok_or_else(|| format!("invalid relative value '{s}'"));
            }
            return parse_value_str(s).map(ToSpec::Absolute).map_err(|e| e.to_string());
        }
        parse_value(json).map(ToSpec::Absolute).map_err(|e| e.to_string())
    }
}

impl Serialize for ToSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToSpec::Absolute(v) => v.serialize(serializer),
            ToSpec::Relative(d) if *d < 0.0 => serializer.serialize_str(&format!("-={}", -d)),
            ToSpec::Relative(d) => serializer.serialize_str(&format!("+={d}")),
        }
    }
}

impl<'de> Deserialize<'de> for ToSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        ToSpec::from_json(&json).map_err(de::Error::custom)
    }
}

impl Serialize for FromSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FromSpec::Current => serializer.serialize_str("current"),
            FromSpec::Value(v) => v.serialize(serializer),
            FromSpec::EndOf(label) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("endOf", label)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FromSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = JsonValue::deserialize(deserializer)?;
        match &json {
            JsonValue::Null => Ok(FromSpec::Current),
            JsonValue::String(s) if s == "current" => Ok(FromSpec::Current),
            JsonValue::String(s) => parse_value_str(s)
                .map(FromSpec::Value)
                .map_err(de::Error::custom),
            JsonValue::Object(map) if map.contains_key("endOf") => map
                .get("endOf")
                .and_then(JsonValue::as_str)
                .map(|l| FromSpec::EndOf(l.to_string()))
                .ok_or_else(|| de::Error::custom("'endOf' expects a label string")),
            other => parse_value(other)
                .map(FromSpec::Value)
                .map_err(de::Error::custom),
        }
    }
}

/// A single tween declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweenConfig {
    pub target: TargetHandle,
    pub property: PropertyKey,
    #[serde(default)]
    pub to: Option<ToSpec>,
    #[serde(default)]
    pub from: FromSpec,
    #[serde(default)]
    pub duration: Option<f32>,
    #[serde(default)]
    pub delay: f32,
    #[serde(default)]
    pub ease: Option<Ease>,
    #[serde(default)]
    pub conflict: ConflictPolicy,
    #[serde(default)]
    pub repeat: RepeatCount,
    #[serde(default)]
    pub yoyo: bool,
    /// Name other tweens can refer to with `from: { "endOf": label }`.
    #[serde(default)]
    pub label: Option<String>,
    /// Round every sampled value to a multiple of this increment.
    #[serde(default)]
    pub snap: Option<f32>,
}

impl TweenConfig {
    pub fn to(
        target: impl Into<TargetHandle>,
        property: PropertyKey,
        to: impl Into<Value>,
    ) -> Self {
        Self {
            target: target.into(),
            property,
            to: Some(ToSpec::Absolute(to.into())),
            from: FromSpec::Current,
            duration: None,
            delay: 0.0,
            ease: None,
            conflict: ConflictPolicy::default(),
            repeat: RepeatCount::Never,
            yoyo: false,
            label: None,
            snap: None,
        }
    }

    pub fn by(target: impl Into<TargetHandle>, property: PropertyKey, offset: f32) -> Self {
        Self {
            to: Some(ToSpec::Relative(offset)),
            ..Self::to(target, property, 0.0)
        }
    }

    pub fn from_value(mut self, from: impl Into<Value>) -> Self {
        self.from = FromSpec::Value(from.into());
        self
    }

    pub fn from_end_of(mut self, label: impl Into<String>) -> Self {
        self.from = FromSpec::EndOf(label.into());
        self
    }

    pub fn duration(mut self, secs: f32) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn delay(mut self, secs: f32) -> Self {
        self.delay = secs;
        self
    }

    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = Some(ease);
        self
    }

    pub fn conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    pub fn repeat(mut self, repeat: RepeatCount, yoyo: bool) -> Self {
        self.repeat = repeat;
        self.yoyo = yoyo;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn snap(mut self, increment: f32) -> Self {
        self.snap = Some(increment);
        self
    }

    /// Short name used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{}.{}", self.target, self.property),
        }
    }

    /// Checks that need no engine state.
    pub fn validate(&self) -> EngineResult<()> {
        let to = self.to.as_ref().ok_or_else(|| EngineError::MissingTo {
            target: self.target.clone(),
            property: self.property.clone(),
        })?;
        let kind_err = |value: &Value| {
            EngineError::value(
                &self.target,
                &self.property,
                scrubline_api_core::ValueError::KindMismatch {
                    left: self.property.value_kind(),
                    right: value.kind(),
                },
            )
        };
        match to {
            ToSpec::Absolute(v) if !self.property.accepts(v) => return Err(kind_err(v)),
            ToSpec::Relative(_) if self.property == PropertyKey::Filter => {
                return Err(EngineError::InvalidTiming(format!(
                    "relative values are not supported for '{}'",
                    self.property
                )))
            }
            _ => {}
        }
        if let FromSpec::Value(v) = &self.from {
            if !self.property.accepts(v) {
                return Err(kind_err(v));
            }
        }
        let check = |what: &str, v: f32| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(EngineError::InvalidTiming(format!(
                    "{what} {v} on '{}'",
                    self.describe()
                )))
            }
        };
        if let Some(d) = self.duration {
            check("duration", d)?;
        }
        if let Some(step) = self.snap {
            if self.property == PropertyKey::Filter || !(step.is_finite() && step > 0.0) {
                return Err(EngineError::InvalidTiming(format!(
                    "snap {step} on '{}'",
                    self.describe()
                )));
            }
        }
        check("delay", self.delay)
    }

    /// Resolve the end value against a start value.
    pub fn resolve_to(&self, from: &Value) -> EngineResult<Value> {
        let to = match &self.to {
            Some(ToSpec::Absolute(v)) => v.clone(),
            Some(ToSpec::Relative(d)) => match from {
                Value::Float(f) => Value::Float(f + d),
                Value::Filter(_) => {
                    return Err(EngineError::InvalidTiming(format!(
                        "relative value on '{}'",
                        self.describe()
                    )))
                }
            },
            None => {
                return Err(EngineError::MissingTo {
                    target: self.target.clone(),
                    property: self.property.clone(),
                })
            }
        };
        // Interpolating once catches kind and filter unit mismatches up front.
        lerp(from, &to, 0.5).map_err(|e| EngineError::value(&self.target, &self.property, e))?;
        if !to.is_finite() {
            return Err(EngineError::InvalidTiming(format!(
                "non-finite end value on '{}'",
                self.describe()
            )));
        }
        Ok(to)
    }
}

/// Delay, duration and repeat for one tween, in seconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TweenTiming {
    pub delay: f32,
    pub duration: f32,
    pub repeat: RepeatCount,
    pub yoyo: bool,
}

impl TweenTiming {
    /// Time from start to the end of the last cycle, or `None` if it repeats forever.
    pub fn span(&self) -> Option<f32> {
        self.repeat
            .cycles()
            .map(|c| self.delay + self.duration * c as f32)
    }

    /// Linear progress and whether the tween has finished, `elapsed` seconds
    /// after it started. Equals `clamp((elapsed - delay) / duration, 0, 1)` for
    /// a single cycle; a zero duration is a step at the delay.
    pub fn progress_at(&self, elapsed: f32) -> (f32, bool) {
        let t = elapsed - self.delay;
        if t < 0.0 || (t == 0.0 && self.duration > 0.0) {
            return (0.0, false);
        }
        let cycles = self.repeat.cycles();
        if self.duration <= 0.0 {
            let end = match cycles {
                Some(c) if self.yoyo && c % 2 == 0 => 0.0,
                _ => 1.0,
            };
            return (end, cycles.is_some());
        }
        if let Some(c) = cycles {
            if t >= self.duration * c as f32 {
                let end = if self.yoyo && c % 2 == 0 { 0.0 } else { 1.0 };
                return (end, true);
            }
        }
        let cycle = (t / self.duration).floor();
        let frac = ((t - cycle * self.duration) / self.duration).clamp(0.0, 1.0);
        if self.yoyo && (cycle as u64) % 2 == 1 {
            (1.0 - frac, false)
        } else {
            (frac, false)
        }
    }
}

/// Lifecycle of a scheduled tween.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TweenState {
    Created,
    Active,
    Settled,
    Disposed,
}

/// Who drives a tween's progress.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Driven by its own clock.
    Standalone,
    /// Driven by a timeline.
    Timeline(TimelineId),
    /// Driven by its own clock, and superseded by the next tween from the same
    /// pointer binding.
    Binding(crate::ids::SubscriptionId),
}

/// A tween with both endpoints fixed.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTween {
    pub id: TweenId,
    pub target: TargetHandle,
    pub property: PropertyKey,
    pub from: Value,
    pub to: Value,
    pub ease: Ease,
    pub timing: TweenTiming,
    pub conflict: ConflictPolicy,
    pub label: Option<String>,
    pub snap: Option<f32>,
}

impl ResolvedTween {
    /// Value at linear progress `p`, rounded to the snap increment if any.
    pub fn value_at(&self, p: f32) -> Value {
        let value =
            lerp(&self.from, &self.to, self.ease.apply(p)).unwrap_or_else(|_| self.from.clone());
        match (self.snap, value) {
            (Some(step), Value::Float(v)) if step > 0.0 => Value::Float((v / step).round() * step),
            (_, value) => value,
        }
    }

    /// Offset from `anchor` at linear progress `p`.
    pub fn offset_at(&self, p: f32, anchor: &Value) -> Value {
        let v = self.value_at(p);
        delta(anchor, &v).unwrap_or_else(|_| scrubline_api_core::blend::zero_delta(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(duration: f32, repeat: RepeatCount, yoyo: bool) -> TweenTiming {
        TweenTiming {
            delay: 0.0,
            duration,
            repeat,
            yoyo,
        }
    }

    #[test]
    fn missing_to_is_rejected() {
        let mut cfg = TweenConfig::to("card", PropertyKey::Y, 10.0);
        cfg.to = None;
        assert!(matches!(cfg.validate(), Err(EngineError::MissingTo { .. })));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let cfg = TweenConfig::to("card", PropertyKey::Filter, 1.0);
        assert!(matches!(cfg.validate(), Err(EngineError::Value { .. })));
        let cfg = TweenConfig::to("card", PropertyKey::Y, 1.0).duration(-1.0);
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidTiming(_))));
    }

    #[test]
    fn relative_to_resolves_against_from() {
        let cfg = TweenConfig::by("blob", PropertyKey::XPercent, -5.0);
        assert_eq!(cfg.resolve_to(&Value::Float(10.0)).unwrap(), Value::Float(5.0));
    }

    #[test]
    fn single_cycle_progress_is_linear_and_exact() {
        let t = timing(2.0, RepeatCount::Never, false);
        assert_eq!(t.progress_at(0.0), (0.0, false));
        assert_eq!(t.progress_at(1.0), (0.5, false));
        assert_eq!(t.progress_at(2.0), (1.0, true));
        assert_eq!(t.progress_at(9.0), (1.0, true));
    }

    #[test]
    fn yoyo_reverses_odd_cycles() {
        let t = timing(1.0, RepeatCount::Times(1), true);
        assert_eq!(t.progress_at(0.25), (0.25, false));
        assert_eq!(t.progress_at(1.25), (0.75, false));
        assert_eq!(t.progress_at(2.0), (0.0, true));
        assert_eq!(t.span(), Some(2.0));
    }

    #[test]
    fn infinite_repeat_never_finishes() {
        let t = timing(1.0, RepeatCount::Infinite, false);
        assert_eq!(t.span(), None);
        assert_eq!(t.progress_at(100.5), (0.5, false));
    }

    #[test]
    fn zero_duration_is_a_step() {
        let t = TweenTiming {
            delay: 1.0,
            ..timing(0.0, RepeatCount::Never, false)
        };
        assert_eq!(t.progress_at(0.5), (0.0, false));
        assert_eq!(t.progress_at(1.0), (1.0, true));
    }

    /// it should round sampled values to the snap increment
    #[test]
    fn snap_rounds_samples() {
        let tween = ResolvedTween {
            id: TweenId(0),
            target: "counter".into(),
            property: PropertyKey::Y,
            from: Value::Float(0.0),
            to: Value::Float(10.0),
            ease: crate::ease::Ease::Linear,
            timing: timing(1.0, RepeatCount::Never, false),
            conflict: ConflictPolicy::ReplaceExisting,
            label: None,
            snap: Some(1.0),
        };
        assert_eq!(tween.value_at(0.33), Value::Float(3.0));
        assert_eq!(tween.value_at(0.37), Value::Float(4.0));
        assert_eq!(tween.value_at(1.0), Value::Float(10.0));

        let bad = TweenConfig::to("counter", PropertyKey::Y, 10.0).snap(0.0);
        assert!(matches!(bad.validate(), Err(EngineError::InvalidTiming(_))));
        let none = scrubline_api_core::FilterValue::none();
        let bad = TweenConfig::to("card", PropertyKey::Filter, none).snap(1.0);
        assert!(matches!(bad.validate(), Err(EngineError::InvalidTiming(_))));
    }

    #[test]
    fn json_forms() {
        let cfg: TweenConfig = serde_json::from_value(serde_json::json!({
            "target": "card-1",
            "property": "filter",
            "from": "brightness(1) blur(0px)",
            "to": "brightness(0.4) blur(2px)",
            "ease": "power2.out",
            "repeat": -1,
            "conflict": "additive"
        }))
        .unwrap();
        assert!(matches!(cfg.from, FromSpec::Value(Value::Filter(_))));
        assert_eq!(cfg.repeat, RepeatCount::Infinite);
        assert_eq!(cfg.conflict, ConflictPolicy::CoexistAdditively);

        let cfg: TweenConfig = serde_json::from_value(serde_json::json!({
            "target": "galaxy",
            "property": "xPercent",
            "to": "-=5",
            "from": { "endOf": "drift" }
        }))
        .unwrap();
        assert_eq!(cfg.to, Some(ToSpec::Relative(-5.0)));
        assert_eq!(cfg.from, FromSpec::EndOf("drift".into()));
    }
}
