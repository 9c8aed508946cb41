//! Pinning: holding an anchor fixed on screen while its trigger range scrolls by.
//!
//! While attached, a pin reserves `end - start` pixels of spacer after the anchor
//! so content below does not slide underneath it. The anchor's screen position is
//! continuous across both range boundaries:
//!
//! ```text
//! before:  top = natural_top - scroll
//! pinned:  top = natural_top - start
//! after:   top = natural_top - scroll + (end - start)
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use scrubline_api_core::TargetHandle;

use crate::ids::TriggerId;
use crate::trigger::{ResolvedRange, Zone};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PinState {
    Before,
    Pinned,
    After,
    /// Detached; the anchor is back in natural flow with no spacer.
    Released,
}

/// What the host applies to a pinned anchor this frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinFrame {
    pub trigger: TriggerId,
    pub target: TargetHandle,
    pub state: PinState,
    /// Anchor top relative to the viewport.
    pub screen_top: f32,
    /// Translation to add to the anchor's natural position.
    pub offset_y: f32,
    /// Extra space reserved after the anchor.
    pub spacer: f32,
}

#[derive(Debug)]
struct PinSlot {
    target: TargetHandle,
    last: Option<PinFrame>,
}

#[derive(Debug, Default)]
pub struct PinController {
    pins: IndexMap<TriggerId, PinSlot>,
}

/// Compute a pin frame for `scroll` against a resolved range.
pub fn pin_frame(
    trigger: TriggerId,
    target: TargetHandle,
    natural_top: f32,
    range: ResolvedRange,
    scroll: f32,
) -> PinFrame {
    let span = range.span().max(0.0);
    let (state, offset_y) = match range.zone(scroll) {
        Zone::Before => (PinState::Before, 0.0),
        Zone::Inside => (PinState::Pinned, scroll - range.start),
        Zone::After => (PinState::After, span),
    };
    PinFrame {
        trigger,
        target,
        state,
        screen_top: natural_top - scroll + offset_y,
        offset_y,
        spacer: span,
    }
}

impl PinController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, trigger: TriggerId, target: TargetHandle) {
        self.pins.insert(trigger, PinSlot { target, last: None });
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Frame for this tick, or `None` if nothing changed since the last one.
    pub fn update(
        &mut self,
        trigger: TriggerId,
        natural_top: f32,
        range: ResolvedRange,
        scroll: f32,
    ) -> Option<PinFrame> {
        let slot = self.pins.get_mut(&trigger)?;
        let frame = pin_frame(trigger, slot.target.clone(), natural_top, range, scroll);
        if slot.last.as_ref() == Some(&frame) {
            return None;
        }
        slot.last = Some(frame.clone());
        Some(frame)
    }

    /// Latest frame emitted for a pin.
    pub fn current(&self, trigger: TriggerId) -> Option<&PinFrame> {
        self.pins.get(&trigger)?.last.as_ref()
    }

    /// Detach a pin, returning the frame that puts the anchor back in flow.
    pub fn release(&mut self, trigger: TriggerId) -> Option<PinFrame> {
        let slot = self.pins.shift_remove(&trigger)?;
        let screen_top = slot
            .last
            .as_ref()
            .map(|f| f.screen_top - f.offset_y)
            .unwrap_or(0.0);
        Some(PinFrame {
            trigger,
            target: slot.target,
            state: PinState::Released,
            screen_top,
            offset_y: 0.0,
            spacer: 0.0,
        })
    }
}
