//! Per-tick outputs to the host: property writes, pin frames and events.

use serde::{Deserialize, Serialize};

use scrubline_api_core::{TargetHandle, WriteBatch};

use crate::ids::{ScopeId, TimelineId, TriggerId, TweenId};
use crate::pin::PinFrame;
use crate::trigger::Crossing;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
#[non_exhaustive]
pub enum CoreEvent {
    /// Anchor geometry was unavailable; the trigger will be retried.
    TriggerDeferred {
        trigger: TriggerId,
        anchor: TargetHandle,
    },
    /// A deferred trigger was measured.
    TriggerActivated {
        trigger: TriggerId,
        start: f32,
        end: f32,
    },
    TriggerToggled {
        trigger: TriggerId,
        crossing: Crossing,
    },
    TimelineCompleted {
        timeline: TimelineId,
    },
    TimelineReverseCompleted {
        timeline: TimelineId,
    },
    TweenSettled {
        tween: TweenId,
    },
    ScopeDisposed {
        scope: ScopeId,
    },
    /// The engine started or stopped needing scroll events.
    ScrollListening {
        listening: bool,
    },
    /// The engine started or stopped needing pointer events.
    PointerListening {
        listening: bool,
    },
    Error {
        message: String,
    },
}

/// Everything produced by one `update` call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    /// At most one write per (target, property).
    pub writes: WriteBatch,
    pub pins: Vec<PinFrame>,
    pub events: Vec<CoreEvent>,
}

impl Outputs {
    pub fn clear(&mut self) {
        self.writes.clear();
        self.pins.clear();
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.pins.is_empty() && self.events.is_empty()
    }
}
