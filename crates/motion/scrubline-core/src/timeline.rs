//! Timelines: ordered tweens driven either by a clock or by scroll progress.
//!
//! A timeline is bound to one driver when it is built. A tween placed at
//! `start` with duration `d` reads local progress
//! `clamp((position - start) / d, 0, 1)`, where `position` is the timeline's
//! playhead in seconds (`progress * duration` for scroll-driven timelines).

use hashbrown::HashMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use scrubline_api_core::{TargetHandle, Value};

use crate::error::{EngineError, EngineResult};
use crate::ids::{TimelineId, TriggerId, TweenId};
use crate::scheduler::ChannelKey;
use crate::stagger::{StaggerConfig, StaggerPlanner};
use crate::trigger::{ScrubMode, ToggleAction, TriggerConfig};
use crate::tween::{ConflictPolicy, FromSpec, RepeatCount, TweenConfig, TweenTiming};

/// Smoothed scrubbing snaps to its target inside this distance.
const SCRUB_SNAP: f32 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Clock,
    Scrub,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Clock => f.write_str("clock"),
            Driver::Scrub => f.write_str("scrub"),
        }
    }
}

/// Where a tween goes in its timeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Position {
    /// Seconds from the timeline start.
    At(f32),
    /// Relative to the current end of the timeline (`"+=0.2"`, `"-=0.1"`).
    AfterEnd(f32),
    /// Relative to the start of the previous item (`"<"`, `"<0.1"`).
    WithPrevious(f32),
    /// Relative to the end of the previous item (`">"`, `">0.1"`).
    AfterPrevious(f32),
}

impl Default for Position {
    fn default() -> Self {
        Position::AfterEnd(0.0)
    }
}

impl Position {
    pub fn resolve(&self, timeline_end: f32, prev_start: f32, prev_end: f32) -> f32 {
        match *self {
            Position::At(t) => t,
            Position::AfterEnd(d) => timeline_end + d,
            Position::WithPrevious(d) => prev_start + d,
            Position::AfterPrevious(d) => prev_end + d,
        }
    }
}

fn parse_offset(rest: &str, src: &str) -> EngineResult<f32> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(0.0);
    }
    let rest = rest.strip_prefix("+=").unwrap_or(rest);
    let (sign, num) = match rest.strip_prefix("-=") {
        Some(n) => (-1.0, n),
        None => (1.0, rest),
    };
    num.trim()
        .parse::<f32>()
        .map(|v| sign * v)
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EngineError::InvalidPosition(src.to_string()))
}

impl FromStr for Position {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let src = s.trim();
        if let Some(rest) = src.strip_prefix('<') {
            return parse_offset(rest, src).map(Position::WithPrevious);
        }
        if let Some(rest) = src.strip_prefix('>') {
            return parse_offset(rest, src).map(Position::AfterPrevious);
        }
        if src.starts_with("+=") || src.starts_with("-=") {
            return parse_offset(src, src).map(Position::AfterEnd);
        }
        src.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Position::At)
            .ok_or_else(|| EngineError::InvalidPosition(src.to_string()))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signed = |f: &mut fmt::Formatter<'_>, d: f32| {
            if d < 0.0 {
                write!(f, "-={}", -d)
            } else {
                write!(f, "+={d}")
            }
        };
        match *self {
            Position::At(t) => write!(f, "{t}"),
            Position::AfterEnd(d) => signed(f, d),
            Position::WithPrevious(d) => {
                f.write_str("<")?;
                signed(f, d)
            }
            Position::AfterPrevious(d) => {
                f.write_str(">")?;
                signed(f, d)
            }
        }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Position::At(t) => serializer.serialize_f32(*t),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Secs(f32),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Secs(t) => Ok(Position::At(t)),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

/// One tween at a position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub tween: TweenConfig,
    #[serde(default, alias = "startOffset")]
    pub position: Position,
}

/// One tween template applied to several targets with staggered starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaggerGroup {
    pub targets: Vec<TargetHandle>,
    /// Template; its `target` is replaced by each entry of `targets`.
    pub tween: TweenConfig,
    #[serde(default)]
    pub stagger: StaggerConfig,
    #[serde(default, alias = "startOffset")]
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimelineItem {
    Group(StaggerGroup),
    Tween(TimelineEntry),
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineConfig {
    /// Inferred from the trigger when absent: scrubbed triggers drive by scroll.
    #[serde(default)]
    pub driver: Option<Driver>,
    #[serde(default, alias = "scrollTrigger")]
    pub trigger: Option<TriggerConfig>,
    #[serde(default, rename = "tweens")]
    pub items: Vec<TimelineItem>,
    #[serde(default)]
    pub repeat: RepeatCount,
    #[serde(default)]
    pub yoyo: bool,
    /// Clock timelines without a trigger start playing unless paused.
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub label: Option<String>,
}

impl TimelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn driver(mut self, driver: Driver) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn add(mut self, tween: TweenConfig, position: Position) -> Self {
        self.items.push(TimelineItem::Tween(TimelineEntry { tween, position }));
        self
    }

    pub fn stagger(
        mut self,
        targets: Vec<TargetHandle>,
        tween: TweenConfig,
        stagger: StaggerConfig,
        position: Position,
    ) -> Self {
        self.items.push(TimelineItem::Group(StaggerGroup {
            targets,
            tween,
            stagger,
            position,
        }));
        self
    }

    pub fn repeat(mut self, repeat: RepeatCount, yoyo: bool) -> Self {
        self.repeat = repeat;
        self.yoyo = yoyo;
        self
    }

    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    /// The driver this timeline is bound to.
    pub fn resolve_driver(&self) -> EngineResult<Driver> {
        let scrubbed = self
            .trigger
            .as_ref()
            .is_some_and(|t| t.scrub.is_scrubbing());
        match (self.driver, scrubbed) {
            (None, true) => Ok(Driver::Scrub),
            (None, false) => Ok(Driver::Clock),
            (Some(Driver::Clock), true) => Err(EngineError::InvalidTiming(
                "a scrubbed trigger cannot drive a clock timeline".into(),
            )),
            (Some(driver), _) => Ok(driver),
        }
    }
}

/// A tween config with its absolute start inside the timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub config: TweenConfig,
    pub start: f32,
    pub timing: TweenTiming,
}

fn timing_of(cfg: &TweenConfig, default_duration: f32) -> TweenTiming {
    TweenTiming {
        delay: 0.0,
        duration: cfg.duration.unwrap_or(default_duration),
        repeat: cfg.repeat,
        yoyo: cfg.yoyo,
    }
}

fn span_or_cycle(timing: &TweenTiming) -> f32 {
    timing.span().unwrap_or(timing.duration)
}

/// Flatten items into placed tweens. Delays fold into the start offset.
pub fn layout(items: &[TimelineItem], default_duration: f32) -> EngineResult<Vec<Placement>> {
    let mut out = Vec::new();
    let mut end = 0.0f32;
    let mut prev_start = 0.0f32;
    let mut prev_end = 0.0f32;
    let check = |start: f32, what: &Position| {
        if start.is_finite() && start >= 0.0 {
            Ok(start)
        } else {
            Err(EngineError::InvalidPosition(format!("{what} resolves to {start}")))
        }
    };

    for item in items {
        match item {
            TimelineItem::Tween(entry) => {
                entry.tween.validate()?;
                let at = check(entry.position.resolve(end, prev_start, prev_end), &entry.position)?;
                let start = at + entry.tween.delay;
                let timing = timing_of(&entry.tween, default_duration);
                let item_end = start + span_or_cycle(&timing);
                out.push(Placement {
                    config: entry.tween.clone(),
                    start,
                    timing,
                });
                prev_start = at;
                prev_end = item_end;
                end = end.max(item_end);
            }
            TimelineItem::Group(group) => {
                let offsets = StaggerPlanner::plan_config(group.targets.len(), &group.stagger)?;
                let at = check(group.position.resolve(end, prev_start, prev_end), &group.position)?;
                let mut group_end = at;
                for (i, (target, offset)) in group.targets.iter().zip(offsets).enumerate() {
                    let mut cfg = group.tween.clone();
                    cfg.target = target.clone();
                    if group.targets.len() > 1 {
                        cfg.label = cfg.label.map(|l| format!("{l}.{i}"));
                    }
                    cfg.validate()?;
                    let start = at + offset + cfg.delay;
                    let timing = timing_of(&cfg, default_duration);
                    group_end = group_end.max(start + span_or_cycle(&timing));
                    out.push(Placement {
                        config: cfg,
                        start,
                        timing,
                    });
                }
                prev_start = at;
                prev_end = group_end;
                end = end.max(group_end);
            }
        }
    }
    Ok(out)
}

#[derive(Clone, Debug)]
enum Mark {
    Unvisited,
    Visiting,
    Done(Value, Value),
}

/// Resolves every placement's endpoints, following `endOf` labels and the
/// implicit "start where the previous tween on this pair ended" rule.
struct EndpointResolver<'a, C, L> {
    placements: &'a [Placement],
    marks: Vec<Mark>,
    labels: HashMap<&'a str, usize>,
    current: C,
    external: L,
}

impl<'a, C, L> EndpointResolver<'a, C, L>
where
    C: Fn(&ChannelKey, ConflictPolicy) -> Value,
    L: Fn(&str) -> Option<Value>,
{
    fn name(&self, i: usize) -> String {
        let cfg = &self.placements[i].config;
        match &cfg.label {
            Some(label) => label.clone(),
            None => format!("#{i} {}.{}", cfg.target, cfg.property),
        }
    }

    fn predecessor(&self, i: usize) -> Option<usize> {
        let me = &self.placements[i];
        self.placements
            .iter()
            .enumerate()
            .filter(|(j, p)| {
                *j != i
                    && p.config.target == me.config.target
                    && p.config.property == me.config.property
                    && (p.start < me.start || (p.start == me.start && *j < i))
            })
            .max_by(|(ja, a), (jb, b)| a.start.total_cmp(&b.start).then(ja.cmp(jb)))
            .map(|(j, _)| j)
    }

    fn depend(&mut self, i: usize, j: usize) -> EngineResult<Value> {
        if matches!(self.marks[j], Mark::Visiting) {
            return Err(EngineError::ConflictDeadlock {
                tween: self.name(i),
                depends_on: self.name(j),
            });
        }
        self.visit(j).map(|(_, to)| to)
    }

    fn visit(&mut self, i: usize) -> EngineResult<(Value, Value)> {
        if let Mark::Done(from, to) = &self.marks[i] {
            return Ok((from.clone(), to.clone()));
        }
        self.marks[i] = Mark::Visiting;
        let placements = self.placements;
        let cfg = &placements[i].config;
        let from = match &cfg.from {
            FromSpec::Value(v) => v.clone(),
            FromSpec::EndOf(label) => match self.labels.get(label.as_str()).copied() {
                Some(j) => self.depend(i, j)?,
                None => (self.external)(label)
                    .ok_or_else(|| EngineError::UnknownLabel(label.clone()))?,
            },
            FromSpec::Current => match self.predecessor(i) {
                Some(j) => self.depend(i, j)?,
                None => (self.current)(
                    &ChannelKey::new(cfg.target.clone(), cfg.property.clone()),
                    cfg.conflict,
                ),
            },
        };
        let to = cfg.resolve_to(&from)?;
        self.marks[i] = Mark::Done(from.clone(), to.clone());
        Ok((from, to))
    }
}

/// Fix `(from, to)` for every placement.
///
/// `current` supplies a pair's value for tweens with no earlier tween on the same
/// pair; `external` looks up labels defined outside this batch. A cycle of
/// dependencies is reported as [`EngineError::ConflictDeadlock`].
pub fn resolve_endpoints(
    placements: &[Placement],
    current: impl Fn(&ChannelKey, ConflictPolicy) -> Value,
    external: impl Fn(&str) -> Option<Value>,
) -> EngineResult<Vec<(Value, Value)>> {
    let labels = placements
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.config.label.as_deref().map(|l| (l, i)))
        .collect();
    let mut resolver = EndpointResolver {
        placements,
        marks: vec![Mark::Unvisited; placements.len()],
        labels,
        current,
        external,
    };
    (0..placements.len()).map(|i| resolver.visit(i)).collect()
}

/// A tween placed inside a running timeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlacedTween {
    pub tween: TweenId,
    pub start: f32,
    pub timing: TweenTiming,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimelineEvent {
    Completed,
    ReverseCompleted,
}

/// Runtime state of one timeline.
#[derive(Debug)]
pub struct Timeline {
    id: TimelineId,
    driver: Driver,
    smoothing: Option<f32>,
    entries: Vec<PlacedTween>,
    duration: f32,
    open_ended: bool,
    repeat: RepeatCount,
    yoyo: bool,
    time: f32,
    playing: bool,
    reversed: bool,
    progress: f32,
    target_progress: f32,
    trigger: Option<TriggerId>,
    label: Option<String>,
}

impl Timeline {
    pub fn new(id: TimelineId, driver: Driver) -> Self {
        Self {
            id,
            driver,
            smoothing: None,
            entries: Vec::new(),
            duration: 0.0,
            open_ended: false,
            repeat: RepeatCount::Never,
            yoyo: false,
            time: 0.0,
            playing: false,
            reversed: false,
            progress: 0.0,
            target_progress: 0.0,
            trigger: None,
            label: None,
        }
    }

    /// Build runtime state from a config. Tweens are added separately once
    /// they have ids.
    pub fn from_config(id: TimelineId, cfg: &TimelineConfig) -> EngineResult<Self> {
        let driver = cfg.resolve_driver()?;
        if driver == Driver::Scrub && cfg.repeat.is_infinite() {
            return Err(EngineError::InfiniteInScrub(id));
        }
        let mut tl = Self::new(id, driver);
        tl.repeat = cfg.repeat;
        tl.yoyo = cfg.yoyo;
        tl.label = cfg.label.clone();
        if let Some(ScrubMode::Smoothed(secs)) = cfg.trigger.as_ref().map(|t| t.scrub) {
            tl.smoothing = Some(secs);
        }
        tl.playing = driver == Driver::Clock && cfg.trigger.is_none() && !cfg.paused;
        Ok(tl)
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn trigger(&self) -> Option<TriggerId> {
        self.trigger
    }

    pub fn bind_trigger(&mut self, trigger: TriggerId) {
        self.trigger = Some(trigger);
    }

    pub fn entries(&self) -> &[PlacedTween] {
        &self.entries
    }

    /// Length of one pass in seconds.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Place a tween. Scroll-driven timelines reject tweens that never end.
    pub fn add_tween(
        &mut self,
        tween: TweenId,
        start_offset: f32,
        timing: TweenTiming,
    ) -> EngineResult<()> {
        if !start_offset.is_finite() || start_offset < 0.0 {
            return Err(EngineError::InvalidPosition(start_offset.to_string()));
        }
        let span = match timing.span() {
            Some(span) => span,
            None if self.driver == Driver::Scrub => {
                return Err(EngineError::InfiniteInScrub(self.id))
            }
            None => {
                self.open_ended = true;
                timing.delay + timing.duration
            }
        };
        self.duration = self.duration.max(start_offset + span);
        self.entries.push(PlacedTween {
            tween,
            start: start_offset,
            timing,
        });
        Ok(())
    }

    pub fn remove_tween(&mut self, tween: TweenId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.tween != tween);
        before != self.entries.len()
    }

    /// Total clock time across repeats, or `None` if it never ends.
    pub fn total_time(&self) -> Option<f32> {
        if self.open_ended {
            return None;
        }
        self.repeat.cycles().map(|c| self.duration * c as f32)
    }

    /// Scroll-driven only: move the playhead to `fraction` of the duration.
    pub fn set_progress(&mut self, fraction: f32) -> EngineResult<()> {
        if self.driver != Driver::Scrub {
            return Err(EngineError::DriverMismatch {
                timeline: self.id,
                driver: self.driver,
            });
        }
        let p = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.target_progress = p;
        if self.smoothing.is_none() {
            self.progress = p;
        }
        Ok(())
    }

    /// Clock-driven only: seek to `elapsed` seconds.
    pub fn set_clock(&mut self, elapsed: f32) -> EngineResult<()> {
        if self.driver != Driver::Clock {
            return Err(EngineError::DriverMismatch {
                timeline: self.id,
                driver: self.driver,
            });
        }
        let t = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        self.time = match self.total_time() {
            Some(total) => t.min(total),
            None => t,
        };
        Ok(())
    }

    /// Advance clock time or smoothed scrubbing by `dt` seconds.
    pub fn advance(&mut self, dt: f32) -> Option<TimelineEvent> {
        match self.driver {
            Driver::Scrub => {
                if let Some(lag) = self.smoothing {
                    let gap = self.target_progress - self.progress;
                    if gap.abs() <= SCRUB_SNAP {
                        self.progress = self.target_progress;
                    } else if lag > 0.0 {
                        let alpha = 1.0 - (-dt * 3.0 / lag).exp();
                        self.progress += gap * alpha;
                    } else {
                        self.progress = self.target_progress;
                    }
                }
                None
            }
            Driver::Clock => {
                if !self.playing || dt <= 0.0 {
                    return None;
                }
                if self.reversed {
                    self.time -= dt;
                    if self.time <= 0.0 {
                        self.time = 0.0;
                        self.playing = false;
                        return Some(TimelineEvent::ReverseCompleted);
                    }
                    return None;
                }
                self.time += dt;
                match self.total_time() {
                    Some(total) if self.time >= total => {
                        self.time = total;
                        self.playing = false;
                        Some(TimelineEvent::Completed)
                    }
                    _ => None,
                }
            }
        }
    }

    /// Playhead within the current pass, in seconds.
    pub fn position(&self) -> f32 {
        match self.driver {
            Driver::Scrub => self.progress * self.duration,
            Driver::Clock => {
                if self.open_ended || self.duration <= 0.0 {
                    return self.time;
                }
                let cycles = self.repeat.cycles();
                let pass = (self.time / self.duration).floor();
                if let Some(c) = cycles {
                    if pass >= c as f32 {
                        return if self.yoyo && c % 2 == 0 {
                            0.0
                        } else {
                            self.duration
                        };
                    }
                }
                let pos = self.time - pass * self.duration;
                if self.yoyo && (pass as u64) % 2 == 1 {
                    self.duration - pos
                } else {
                    pos
                }
            }
        }
    }

    /// Overall progress in [0, 1] of the current pass.
    pub fn progress(&self) -> f32 {
        match self.driver {
            Driver::Scrub => self.progress,
            Driver::Clock if self.duration > 0.0 && !self.open_ended => {
                (self.position() / self.duration).clamp(0.0, 1.0)
            }
            Driver::Clock => {
                if self.time > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Local `(progress, started)` for every tween at the current playhead.
    pub fn sample(&self) -> Vec<(TweenId, f32, bool)> {
        let pos = self.position();
        let zero_length = self.duration <= 0.0;
        let stepped = match self.driver {
            Driver::Scrub => self.progress > 0.0,
            Driver::Clock => self.time > 0.0,
        };
        self.entries
            .iter()
            .map(|e| {
                if zero_length {
                    return (e.tween, if stepped { 1.0 } else { 0.0 }, true);
                }
                if pos <= 0.0 {
                    return (e.tween, 0.0, e.start <= 0.0);
                }
                let (p, _) = e.timing.progress_at(pos - e.start);
                (e.tween, p, pos >= e.start)
            })
            .collect()
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.reversed = false;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn resume(&mut self) {
        self.playing = true;
    }

    pub fn reverse(&mut self) {
        self.playing = true;
        self.reversed = true;
    }

    pub fn restart(&mut self) {
        self.time = 0.0;
        self.play();
    }

    pub fn reset(&mut self) {
        self.time = 0.0;
        self.playing = false;
        self.reversed = false;
    }

    pub fn complete(&mut self) {
        if let Some(total) = self.total_time() {
            self.time = total;
        }
        self.playing = false;
    }

    /// Apply a trigger toggle action. Scroll-driven timelines ignore them.
    pub fn apply(&mut self, action: ToggleAction) {
        if self.driver != Driver::Clock {
            return;
        }
        match action {
            ToggleAction::Play => self.play(),
            ToggleAction::Pause => self.pause(),
            ToggleAction::Resume => self.resume(),
            ToggleAction::Reverse => self.reverse(),
            ToggleAction::Restart => self.restart(),
            ToggleAction::Reset => self.reset(),
            ToggleAction::Complete => self.complete(),
            ToggleAction::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrubline_api_core::PropertyKey;

    /// it should print drivers under the same names the config uses
    #[test]
    fn driver_display_matches_config_names() {
        for driver in [Driver::Clock, Driver::Scrub] {
            let json = serde_json::to_value(driver).unwrap();
            assert_eq!(json.as_str(), Some(driver.to_string().as_str()));
        }
    }

    fn timing(duration: f32) -> TweenTiming {
        TweenTiming {
            delay: 0.0,
            duration,
            repeat: RepeatCount::Never,
            yoyo: false,
        }
    }

    #[test]
    fn parses_positions() {
        assert_eq!("<".parse::<Position>().unwrap(), Position::WithPrevious(0.0));
        assert_eq!("<0.1".parse::<Position>().unwrap(), Position::WithPrevious(0.1));
        assert_eq!(">".parse::<Position>().unwrap(), Position::AfterPrevious(0.0));
        assert_eq!("+=0.5".parse::<Position>().unwrap(), Position::AfterEnd(0.5));
        assert_eq!("-=0.2".parse::<Position>().unwrap(), Position::AfterEnd(-0.2));
        assert_eq!("1.5".parse::<Position>().unwrap(), Position::At(1.5));
        assert!("soon".parse::<Position>().is_err());
    }

    #[test]
    fn layout_appends_by_default() {
        let cfg = TimelineConfig::new()
            .add(TweenConfig::to("a", PropertyKey::Y, 1.0).duration(1.0), Position::default())
            .add(TweenConfig::to("b", PropertyKey::Y, 1.0).duration(1.0), Position::default())
            .add(TweenConfig::to("c", PropertyKey::Y, 1.0).duration(1.0), "<0.5".parse().unwrap());
        let placed = layout(&cfg.items, 0.5).unwrap();
        let starts: Vec<f32> = placed.iter().map(|p| p.start).collect();
        assert_eq!(starts, vec![0.0, 1.0, 1.5]);
    }

    #[test]
    fn layout_rejects_negative_start() {
        let cfg = TimelineConfig::new()
            .add(TweenConfig::to("a", PropertyKey::Y, 1.0), "-=1".parse().unwrap());
        assert!(matches!(layout(&cfg.items, 0.5), Err(EngineError::InvalidPosition(_))));
    }

    #[test]
    fn stagger_group_expands_per_target() {
        let targets = (1..=5).map(|i| TargetHandle::new(format!("line-{i}"))).collect();
        let cfg = TimelineConfig::new().stagger(
            targets,
            TweenConfig::to("_", PropertyKey::Opacity, 1.0).duration(0.4),
            StaggerConfig::each(0.15),
            Position::default(),
        );
        let placed = layout(&cfg.items, 0.5).unwrap();
        assert_eq!(placed.len(), 5);
        assert_eq!(placed[3].config.target.as_str(), "line-4");
        assert!((placed[4].start - 0.6).abs() < 1e-6);
    }

    #[test]
    fn implicit_from_chains_through_pair() {
        let cfg = TimelineConfig::new()
            .add(TweenConfig::to("a", PropertyKey::Y, 10.0), Position::default())
            .add(TweenConfig::to("a", PropertyKey::Y, 30.0), Position::default());
        let placed = layout(&cfg.items, 0.5).unwrap();
        let ends = resolve_endpoints(&placed, |_, _| Value::Float(2.0), |_| None).unwrap();
        assert_eq!(ends[0], (Value::Float(2.0), Value::Float(10.0)));
        assert_eq!(ends[1], (Value::Float(10.0), Value::Float(30.0)));
    }

    #[test]
    fn mutual_end_of_is_a_deadlock() {
        let cfg = TimelineConfig::new()
            .add(
                TweenConfig::to("a", PropertyKey::X, 1.0).label("left").from_end_of("right"),
                Position::default(),
            )
            .add(
                TweenConfig::to("b", PropertyKey::X, 1.0).label("right").from_end_of("left"),
                Position::default(),
            );
        let placed = layout(&cfg.items, 0.5).unwrap();
        let err = resolve_endpoints(&placed, |_, _| Value::Float(0.0), |_| None).unwrap_err();
        match err {
            EngineError::ConflictDeadlock { tween, depends_on } => {
                assert_eq!(tween, "right");
                assert_eq!(depends_on, "left");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn scrub_rejects_clock_seek_and_vice_versa() {
        let mut scrub = Timeline::new(TimelineId(1), Driver::Scrub);
        assert!(matches!(
            scrub.set_clock(1.0),
            Err(EngineError::DriverMismatch { .. })
        ));
        let mut clock = Timeline::new(TimelineId(2), Driver::Clock);
        assert!(matches!(
            clock.set_progress(0.5),
            Err(EngineError::DriverMismatch { .. })
        ));
    }

    #[test]
    fn scrub_rejects_infinite_tweens() {
        let mut tl = Timeline::new(TimelineId(0), Driver::Scrub);
        let forever = TweenTiming {
            repeat: RepeatCount::Infinite,
            ..timing(1.0)
        };
        assert!(matches!(
            tl.add_tween(TweenId(0), 0.0, forever),
            Err(EngineError::InfiniteInScrub(_))
        ));
    }

    #[test]
    fn three_tweens_at_half_progress() {
        let mut tl = Timeline::new(TimelineId(0), Driver::Scrub);
        for i in 0..3 {
            tl.add_tween(TweenId(i), i as f32, timing(1.0)).unwrap();
        }
        tl.set_progress(0.5).unwrap();
        let s = tl.sample();
        assert_eq!(s[0], (TweenId(0), 1.0, true));
        assert_eq!(s[1], (TweenId(1), 0.5, true));
        assert_eq!(s[2], (TweenId(2), 0.0, false));
    }

    #[test]
    fn zero_duration_is_a_step() {
        let mut tl = Timeline::new(TimelineId(0), Driver::Scrub);
        tl.add_tween(TweenId(0), 0.0, timing(0.0)).unwrap();
        assert_eq!(tl.sample()[0].1, 0.0);
        tl.set_progress(0.01).unwrap();
        assert_eq!(tl.sample()[0].1, 1.0);
    }

    #[test]
    fn clock_plays_reverses_and_completes() {
        let mut tl = Timeline::new(TimelineId(0), Driver::Clock);
        tl.add_tween(TweenId(0), 0.0, timing(1.0)).unwrap();
        tl.play();
        assert_eq!(tl.advance(0.5), None);
        assert_eq!(tl.progress(), 0.5);
        assert_eq!(tl.advance(0.6), Some(TimelineEvent::Completed));
        assert_eq!(tl.progress(), 1.0);
        tl.apply(ToggleAction::Reverse);
        assert_eq!(tl.advance(2.0), Some(TimelineEvent::ReverseCompleted));
        assert_eq!(tl.progress(), 0.0);
    }

    #[test]
    fn smoothed_scrub_approaches_target() {
        let mut tl = Timeline::new(TimelineId(0), Driver::Scrub);
        tl.smoothing = Some(1.0);
        tl.add_tween(TweenId(0), 0.0, timing(1.0)).unwrap();
        tl.set_progress(1.0).unwrap();
        assert_eq!(tl.progress(), 0.0);
        tl.advance(0.1);
        let p = tl.progress();
        assert!(p > 0.0 && p < 1.0);
        for _ in 0..200 {
            tl.advance(0.1);
        }
        assert_eq!(tl.progress(), 1.0);
    }

    #[test]
    fn infinite_clock_timeline_loops() {
        let mut tl = Timeline::new(TimelineId(0), Driver::Clock);
        tl.repeat = RepeatCount::Infinite;
        tl.add_tween(TweenId(0), 0.0, timing(2.0)).unwrap();
        tl.play();
        for _ in 0..5 {
            assert_eq!(tl.advance(1.0), None);
        }
        assert_eq!(tl.position(), 1.0);
        assert_eq!(tl.total_time(), None);
    }
}
