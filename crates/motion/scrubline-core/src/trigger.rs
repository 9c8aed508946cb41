//! Trigger declarations: where a scroll range starts and ends, whether it pins
//! and how it drives its timeline.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use scrubline_api_core::TargetHandle;

use crate::error::{EngineError, EngineResult};
use crate::geometry::{LayoutBox, Viewport};

/// `"<anchor edge> <viewport edge>"`, e.g. `top 70%`: fires when the anchor's
/// top edge reaches 70% of the viewport height. Edges are stored as fractions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewportThreshold {
    pub anchor: f32,
    pub viewport: f32,
}

/// Either an absolute threshold, or (for range ends) a distance past the start.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Threshold {
    At(ViewportThreshold),
    /// `+=500` pixels past the start.
    AfterStartPx(f32),
    /// `+=600%` of the viewport height past the start.
    AfterStartViewport(f32),
}

fn parse_edge(token: &str, src: &str) -> EngineResult<f32> {
    let bad = || EngineError::InvalidThreshold(src.to_string());
    match token {
        "top" | "left" => Ok(0.0),
        "center" => Ok(0.5),
        "bottom" | "right" => Ok(1.0),
        pct => {
            let n = pct.strip_suffix('%').ok_or_else(bad)?;
            let v = n.parse::<f32>().map_err(|_| bad())?;
            if v.is_finite() {
                Ok(v / 100.0)
            } else {
                Err(bad())
            }
        }
    }
}

impl FromStr for Threshold {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let src = s.trim();
        let bad = || EngineError::InvalidThreshold(src.to_string());
        if let Some(rest) = src.strip_prefix("+=") {
            let rest = rest.trim();
            let (num, viewport_relative) = match rest.strip_suffix('%') {
                Some(n) => (n, true),
                None => (rest.strip_suffix("px").unwrap_or(rest), false),
            };
            let v = num.trim().parse::<f32>().map_err(|_| bad())?;
            if !v.is_finite() || v < 0.0 {
                return Err(bad());
            }
            return Ok(if viewport_relative {
                Threshold::AfterStartViewport(v / 100.0)
            } else {
                Threshold::AfterStartPx(v)
            });
        }
        let mut parts = src.split_whitespace();
        let anchor = parts.next().ok_or_else(bad)?;
        let viewport = parts.next().unwrap_or(anchor);
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Threshold::At(ViewportThreshold {
            anchor: parse_edge(anchor, src)?,
            viewport: parse_edge(viewport, src)?,
        }))
    }
}

fn fmt_edge(f: &mut fmt::Formatter<'_>, v: f32) -> fmt::Result {
    match v {
        x if x == 0.0 => f.write_str("top"),
        x if x == 0.5 => f.write_str("center"),
        x if x == 1.0 => f.write_str("bottom"),
        x => write!(f, "{}%", x * 100.0),
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::At(t) => {
                fmt_edge(f, t.anchor)?;
                f.write_str(" ")?;
                fmt_edge(f, t.viewport)
            }
            Threshold::AfterStartPx(px) => write!(f, "+={px}"),
            Threshold::AfterStartViewport(frac) => write!(f, "+={}%", frac * 100.0),
        }
    }
}

impl Serialize for Threshold {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// How a trigger's progress reaches its timeline.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum ScrubMode {
    /// Progress only fires toggle actions.
    #[default]
    Off,
    /// Timeline position tracks scroll progress exactly.
    Immediate,
    /// Timeline position approaches scroll progress, taking roughly this many
    /// seconds to catch up.
    Smoothed(f32),
}

impl ScrubMode {
    pub fn is_scrubbing(&self) -> bool {
        !matches!(self, ScrubMode::Off)
    }
}

impl Serialize for ScrubMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScrubMode::Off => serializer.serialize_bool(false),
            ScrubMode::Immediate => serializer.serialize_bool(true),
            ScrubMode::Smoothed(secs) => serializer.serialize_f32(*secs),
        }
    }
}

impl<'de> Deserialize<'de> for ScrubMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Lag(f32),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(ScrubMode::Off),
            Raw::Flag(true) => Ok(ScrubMode::Immediate),
            Raw::Lag(secs) if secs.is_finite() && secs > 0.0 => Ok(ScrubMode::Smoothed(secs)),
            Raw::Lag(secs) if secs == 0.0 => Ok(ScrubMode::Immediate),
            Raw::Lag(secs) => Err(de::Error::custom(format!("invalid scrub lag {secs}"))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleAction {
    Play,
    Pause,
    Resume,
    Reverse,
    Restart,
    Reset,
    Complete,
    #[default]
    None,
}

impl FromStr for ToggleAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "play" => ToggleAction::Play,
            "pause" => ToggleAction::Pause,
            "resume" => ToggleAction::Resume,
            "reverse" => ToggleAction::Reverse,
            "restart" => ToggleAction::Restart,
            "reset" => ToggleAction::Reset,
            "complete" => ToggleAction::Complete,
            "none" => ToggleAction::None,
            other => return Err(EngineError::Parse(format!("unknown toggle action '{other}'"))),
        })
    }
}

/// Which way the scroll position crossed a trigger boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Crossing {
    /// Forward across the start.
    Enter,
    /// Forward across the end.
    Leave,
    /// Backward across the end.
    EnterBack,
    /// Backward across the start.
    LeaveBack,
}

/// Actions for enter, leave, enter-back and leave-back, written like
/// `"play none none reverse"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ToggleActions {
    pub on_enter: ToggleAction,
    pub on_leave: ToggleAction,
    pub on_enter_back: ToggleAction,
    pub on_leave_back: ToggleAction,
}

impl Default for ToggleActions {
    fn default() -> Self {
        Self {
            on_enter: ToggleAction::Play,
            on_leave: ToggleAction::None,
            on_enter_back: ToggleAction::None,
            on_leave_back: ToggleAction::None,
        }
    }
}

impl ToggleActions {
    pub fn for_crossing(&self, crossing: Crossing) -> ToggleAction {
        match crossing {
            Crossing::Enter => self.on_enter,
            Crossing::Leave => self.on_leave,
            Crossing::EnterBack => self.on_enter_back,
            Crossing::LeaveBack => self.on_leave_back,
        }
    }
}

impl FromStr for ToggleActions {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 4 {
            return Err(EngineError::Parse(format!(
                "toggle actions need four entries, got '{s}'"
            )));
        }
        Ok(Self {
            on_enter: parts[0].parse()?,
            on_leave: parts[1].parse()?,
            on_enter_back: parts[2].parse()?,
            on_leave_back: parts[3].parse()?,
        })
    }
}

impl Serialize for ToggleActions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let name = |a: ToggleAction| match a {
            ToggleAction::Play => "play",
            ToggleAction::Pause => "pause",
            ToggleAction::Resume => "resume",
            ToggleAction::Reverse => "reverse",
            ToggleAction::Restart => "restart",
            ToggleAction::Reset => "reset",
            ToggleAction::Complete => "complete",
            ToggleAction::None => "none",
        };
        serializer.serialize_str(&format!(
            "{} {} {} {}",
            name(self.on_enter),
            name(self.on_leave),
            name(self.on_enter_back),
            name(self.on_leave_back)
        ))
    }
}

impl<'de> Deserialize<'de> for ToggleActions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

fn default_start() -> Threshold {
    Threshold::At(ViewportThreshold {
        anchor: 0.0,
        viewport: 1.0,
    })
}

fn default_end() -> Threshold {
    Threshold::At(ViewportThreshold {
        anchor: 1.0,
        viewport: 0.0,
    })
}

/// Declarative trigger, usually attached to a timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Element whose position defines the range (and which is pinned).
    #[serde(alias = "trigger")]
    pub anchor: TargetHandle,
    #[serde(default = "default_start")]
    pub start: Threshold,
    #[serde(default = "default_end")]
    pub end: Threshold,
    #[serde(default)]
    pub pin: bool,
    #[serde(default)]
    pub scrub: ScrubMode,
    #[serde(default)]
    pub toggle_actions: ToggleActions,
}

impl TriggerConfig {
    pub fn new(anchor: impl Into<TargetHandle>, start: &str, end: &str) -> EngineResult<Self> {
        let cfg = Self {
            anchor: anchor.into(),
            start: start.parse()?,
            end: end.parse()?,
            pin: false,
            scrub: ScrubMode::Off,
            toggle_actions: ToggleActions::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn pinned(mut self) -> Self {
        self.pin = true;
        self
    }

    pub fn scrub(mut self, scrub: ScrubMode) -> Self {
        self.scrub = scrub;
        self
    }

    pub fn toggle_actions(mut self, actions: ToggleActions) -> Self {
        self.toggle_actions = actions;
        self
    }

    /// Checks that need no geometry.
    pub fn validate(&self) -> EngineResult<()> {
        if !matches!(self.start, Threshold::At(_)) {
            return Err(EngineError::InvalidThreshold(format!(
                "start '{}' cannot be relative",
                self.start
            )));
        }
        if let ScrubMode::Smoothed(secs) = self.scrub {
            if !secs.is_finite() || secs < 0.0 {
                return Err(EngineError::InvalidTiming(format!("scrub lag {secs}")));
            }
        }
        Ok(())
    }

    /// Resolve both thresholds to document scroll offsets. An end that lands
    /// before the start is rejected, never clamped.
    pub fn resolve(&self, anchor: LayoutBox, viewport: Viewport) -> EngineResult<ResolvedRange> {
        let at = |t: ViewportThreshold| {
            anchor.top + t.anchor * anchor.height - t.viewport * viewport.height
        };
        let start = match self.start {
            Threshold::At(t) => at(t),
            _ => return Err(EngineError::InvalidThreshold(self.start.to_string())),
        };
        let end = match self.end {
            Threshold::At(t) => at(t),
            Threshold::AfterStartPx(px) => start + px,
            Threshold::AfterStartViewport(frac) => start + frac * viewport.height,
        };
        if end < start {
            return Err(EngineError::EndBeforeStart {
                anchor: self.anchor.clone(),
                start,
                end,
            });
        }
        Ok(ResolvedRange { start, end })
    }
}

/// Start and end scroll offsets of an active trigger.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start: f32,
    pub end: f32,
}

/// Where a scroll offset sits relative to a range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Zone {
    Before,
    Inside,
    After,
}

impl ResolvedRange {
    pub fn span(&self) -> f32 {
        self.end - self.start
    }

    /// Linear progress clamped to [0, 1]. A zero-length range is a step at its
    /// start.
    pub fn progress(&self, scroll: f32) -> f32 {
        let span = self.span();
        if span <= 0.0 {
            return if scroll >= self.start { 1.0 } else { 0.0 };
        }
        ((scroll - self.start) / span).clamp(0.0, 1.0)
    }

    pub fn zone(&self, scroll: f32) -> Zone {
        if scroll < self.start {
            Zone::Before
        } else if scroll > self.end {
            Zone::After
        } else {
            Zone::Inside
        }
    }
}

/// Boundary crossings for a move between zones, in the order they happen.
pub fn crossings(from: Zone, to: Zone) -> &'static [Crossing] {
    use Zone::*;
    match (from, to) {
        (Before, Inside) => &[Crossing::Enter],
        (Before, After) => &[Crossing::Enter, Crossing::Leave],
        (Inside, After) => &[Crossing::Leave],
        (After, Inside) => &[Crossing::EnterBack],
        (After, Before) => &[Crossing::EnterBack, Crossing::LeaveBack],
        (Inside, Before) => &[Crossing::LeaveBack],
        _ => &[],
    }
}
