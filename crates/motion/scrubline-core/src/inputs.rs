//! Per-tick inputs from the host.
//!
//! Hosts can also call the event methods on the engine directly; `Inputs` batches
//! the same events for adapters that deliver everything once per frame.

use serde::{Deserialize, Serialize};

use scrubline_api_core::TargetHandle;

use crate::geometry::Viewport;
use crate::ids::TimelineId;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Inputs {
    /// Latest scroll offset in document pixels.
    pub scroll: Option<f32>,
    /// New viewport size; implies a resize.
    pub viewport: Option<Viewport>,
    pub pointer: Vec<PointerInput>,
    /// Targets whose layout changed without a resize.
    pub invalidate: Vec<TargetHandle>,
    pub invalidate_all: bool,
    pub timeline_cmds: Vec<TimelineCommand>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PointerInput {
    Move { x: f32, y: f32 },
    Leave,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimelineCommand {
    Play { timeline: TimelineId },
    Pause { timeline: TimelineId },
    Resume { timeline: TimelineId },
    Reverse { timeline: TimelineId },
    Restart { timeline: TimelineId },
    Reset { timeline: TimelineId },
    Complete { timeline: TimelineId },
    /// Clock-driven timelines only.
    Seek { timeline: TimelineId, time: f32 },
    /// Scroll-driven timelines only.
    SetProgress { timeline: TimelineId, progress: f32 },
}

impl TimelineCommand {
    pub fn timeline(&self) -> TimelineId {
        match self {
            TimelineCommand::Play { timeline }
            | TimelineCommand::Pause { timeline }
            | TimelineCommand::Resume { timeline }
            | TimelineCommand::Reverse { timeline }
            | TimelineCommand::Restart { timeline }
            | TimelineCommand::Reset { timeline }
            | TimelineCommand::Complete { timeline }
            | TimelineCommand::Seek { timeline, .. }
            | TimelineCommand::SetProgress { timeline, .. } => *timeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_json() {
        let inputs: Inputs = serde_json::from_value(serde_json::json!({
            "scroll": 120.0,
            "viewport": { "width": 1280.0, "height": 720.0 },
            "pointer": [{ "type": "move", "x": 10.0, "y": 20.0 }, { "type": "leave" }],
            "invalidateAll": true,
            "timelineCmds": [{ "type": "setProgress", "timeline": 2, "progress": 0.5 }]
        }))
        .unwrap();
        assert_eq!(inputs.scroll, Some(120.0));
        assert_eq!(inputs.pointer.len(), 2);
        assert!(inputs.invalidate_all);
        assert_eq!(inputs.timeline_cmds[0].timeline(), TimelineId(2));
    }
}
