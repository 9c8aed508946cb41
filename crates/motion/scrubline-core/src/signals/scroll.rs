//! Scroll offset and trigger progress.
//!
//! Scroll events only record the latest offset; progress is computed once per
//! tick in [`ScrollSignal::compute`], which is also the measurement pass where
//! deferred triggers are retried.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scrubline_api_core::TargetHandle;

use crate::error::{EngineError, EngineResult};
use crate::geometry::{GeometryProbe, LayoutBox, LayoutSource};
use crate::ids::{SubscriptionId, TriggerId};
use crate::signals::Listeners;
use crate::trigger::{crossings, Crossing, ResolvedRange, TriggerConfig, Zone};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScrollDirection {
    Forward,
    Backward,
    Still,
}

/// Passed to progress callbacks.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub trigger: TriggerId,
    pub progress: f32,
    pub previous: f32,
    pub direction: ScrollDirection,
    pub scroll: f32,
}

/// Per-tick state of one active trigger.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerFrame {
    pub trigger: TriggerId,
    pub range: ResolvedRange,
    /// Natural document top of the anchor, used for pinning.
    pub anchor_top: f32,
    pub progress: f32,
    pub previous: f32,
    pub crossings: Vec<Crossing>,
    pub scroll: f32,
    /// Resolved for the first time during this pass.
    pub activated: bool,
    /// Progress, range or zone moved since the last pass.
    pub changed: bool,
}

/// Result of one measurement pass.
#[derive(Debug, Default)]
pub struct ScrollPass {
    pub frames: Vec<TriggerFrame>,
    /// Triggers whose geometry was still unavailable.
    pub deferred: Vec<(TriggerId, TargetHandle)>,
    /// Triggers that resolved to an invalid range and were disabled.
    pub failed: Vec<(TriggerId, EngineError)>,
    pub direction: Option<ScrollDirection>,
}

#[derive(Clone, Copy, Debug)]
enum SlotState {
    Pending,
    Active {
        range: ResolvedRange,
        anchor: LayoutBox,
    },
    Failed,
}

#[derive(Debug)]
struct TriggerSlot {
    config: TriggerConfig,
    state: SlotState,
    zone: Option<Zone>,
    progress: f32,
    dirty: bool,
}

/// Whether a freshly registered trigger could be measured.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TriggerStatus {
    Active(ResolvedRange),
    Deferred,
}

#[derive(Debug, Default)]
pub struct ScrollSignal {
    offset: f32,
    pending_offset: Option<f32>,
    triggers: IndexMap<TriggerId, TriggerSlot>,
    progress: Listeners<TriggerId, ProgressUpdate>,
}

fn resolve(
    config: &TriggerConfig,
    probe: &mut GeometryProbe,
    source: &mut dyn LayoutSource,
) -> EngineResult<(ResolvedRange, LayoutBox)> {
    let viewport = probe.viewport(source)?;
    let anchor = probe.layout(source, &config.anchor)?;
    let range = config.resolve(anchor, viewport)?;
    Ok((range, anchor))
}

impl ScrollSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset as of the last measurement pass.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Record a scroll event. Applied at the next [`ScrollSignal::compute`].
    pub fn set_offset(&mut self, offset: f32) {
        if offset.is_finite() {
            self.pending_offset = Some(offset);
        }
    }

    /// Register a trigger. Configuration errors (including an end before its
    /// start) are returned now; missing geometry defers the trigger instead.
    pub fn register(
        &mut self,
        id: TriggerId,
        config: TriggerConfig,
        probe: &mut GeometryProbe,
        source: &mut dyn LayoutSource,
    ) -> EngineResult<TriggerStatus> {
        config.validate()?;
        let (state, outcome) = match resolve(&config, probe, source) {
            Ok((range, anchor)) => (
                SlotState::Active { range, anchor },
                TriggerStatus::Active(range),
            ),
            Err(EngineError::GeometryUnavailable { target }) => {
                debug!(trigger = id.0, %target, "trigger deferred until geometry is available");
                (SlotState::Pending, TriggerStatus::Deferred)
            }
            Err(err) => return Err(err),
        };
        self.triggers.insert(
            id,
            TriggerSlot {
                config,
                state,
                zone: None,
                progress: 0.0,
                dirty: false,
            },
        );
        Ok(outcome)
    }

    /// Remove a trigger and every progress callback attached to it.
    pub fn unregister(&mut self, id: TriggerId) -> bool {
        self.progress.remove_key(&id);
        self.triggers.shift_remove(&id).is_some()
    }

    pub fn config(&self, id: TriggerId) -> Option<&TriggerConfig> {
        self.triggers.get(&id).map(|s| &s.config)
    }

    pub fn contains(&self, id: TriggerId) -> bool {
        self.triggers.contains_key(&id)
    }

    pub fn is_pending(&self, id: TriggerId) -> bool {
        matches!(
            self.triggers.get(&id).map(|s| s.state),
            Some(SlotState::Pending)
        )
    }

    pub fn range(&self, id: TriggerId) -> Option<ResolvedRange> {
        match self.triggers.get(&id)?.state {
            SlotState::Active { range, .. } => Some(range),
            _ => None,
        }
    }

    pub fn progress(&self, id: TriggerId) -> Option<f32> {
        self.triggers.get(&id).map(|s| s.progress)
    }

    /// Re-measure triggers anchored on `target` at the next pass.
    pub fn invalidate_anchor(&mut self, target: &TargetHandle) {
        for slot in self.triggers.values_mut() {
            if &slot.config.anchor == target {
                slot.dirty = true;
            }
        }
    }

    pub fn invalidate_all(&mut self) {
        for slot in self.triggers.values_mut() {
            slot.dirty = true;
        }
    }

    pub fn on_progress(
        &mut self,
        sub: SubscriptionId,
        trigger: TriggerId,
        callback: impl FnMut(&ProgressUpdate) + 'static,
    ) -> EngineResult<()> {
        if !self.triggers.contains_key(&trigger) {
            return Err(EngineError::UnknownTrigger(trigger));
        }
        self.progress.add(sub, trigger, callback);
        Ok(())
    }

    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        self.progress.remove(sub)
    }

    /// Shared handle to the progress subscriber list.
    pub fn subscribers(&self) -> Listeners<TriggerId, ProgressUpdate> {
        self.progress.clone()
    }

    /// True while anything still consumes scroll offsets.
    pub fn is_listening(&self) -> bool {
        !self.triggers.is_empty() || !self.progress.is_empty()
    }

    /// The measurement pass: apply the latest offset, retry deferred and dirty
    /// triggers, then compute progress and crossings for every active trigger.
    pub fn compute(
        &mut self,
        probe: &mut GeometryProbe,
        source: &mut dyn LayoutSource,
    ) -> ScrollPass {
        let previous_offset = self.offset;
        if let Some(offset) = self.pending_offset.take() {
            self.offset = offset;
        }
        let scroll = self.offset;
        let direction = if scroll > previous_offset {
            ScrollDirection::Forward
        } else if scroll < previous_offset {
            ScrollDirection::Backward
        } else {
            ScrollDirection::Still
        };

        let mut pass = ScrollPass {
            direction: Some(direction),
            ..ScrollPass::default()
        };
        for (&id, slot) in self.triggers.iter_mut() {
            let mut activated = false;
            let mut range_moved = false;
            let needs_resolve = slot.dirty || matches!(slot.state, SlotState::Pending);
            if needs_resolve {
                slot.dirty = false;
                match resolve(&slot.config, probe, source) {
                    Ok((range, anchor)) => {
                        match slot.state {
                            SlotState::Pending => activated = true,
                            SlotState::Active { range: old, .. } => range_moved = old != range,
                            SlotState::Failed => {}
                        }
                        slot.state = SlotState::Active { range, anchor };
                    }
                    Err(EngineError::GeometryUnavailable { target }) => {
                        if matches!(slot.state, SlotState::Pending) {
                            pass.deferred.push((id, target));
                        }
                        // An active trigger keeps its last range until the
                        // anchor becomes measurable again.
                    }
                    Err(err) => {
                        warn!(trigger = id.0, error = %err, "trigger disabled");
                        slot.state = SlotState::Failed;
                        pass.failed.push((id, err));
                    }
                }
            }

            let SlotState::Active { range, anchor } = slot.state else {
                continue;
            };
            let progress = range.progress(scroll);
            let zone = range.zone(scroll);
            let crossed = crossings(slot.zone.unwrap_or(Zone::Before), zone).to_vec();
            let previous = slot.progress;
            let changed =
                activated || range_moved || progress != previous || !crossed.is_empty();
            slot.zone = Some(zone);
            slot.progress = progress;
            pass.frames.push(TriggerFrame {
                trigger: id,
                range,
                anchor_top: anchor.top,
                progress,
                previous,
                crossings: crossed,
                scroll,
                activated,
                changed,
            });
        }
        pass
    }

    /// Run progress callbacks for frames that changed.
    pub fn dispatch(&self, pass: &ScrollPass) {
        let direction = pass.direction.unwrap_or(ScrollDirection::Still);
        for frame in pass.frames.iter().filter(|f| f.changed) {
            let update = ProgressUpdate {
                trigger: frame.trigger,
                progress: frame.progress,
                previous: frame.previous,
                direction,
                scroll: frame.scroll,
            };
            self.progress.emit(&frame.trigger, &update);
        }
    }
}
