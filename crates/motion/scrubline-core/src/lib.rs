//! Scrubline Core (host-agnostic)
//!
//! Scroll-synchronized tweens and timelines. The host feeds scroll offsets,
//! viewport sizes and pointer positions through [`Inputs`]; each
//! [`Engine::update`] returns the property writes, pin frames and events for
//! that frame in [`Outputs`]. Layout is read through the [`LayoutSource`] trait
//! so the same engine runs against a browser, a test double or a fixture file.

pub mod config;
pub mod ease;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod inputs;
pub mod outputs;
pub mod pin;
pub mod scheduler;
pub mod scope;
pub mod section;
pub mod signals;
pub mod stagger;
pub mod timeline;
pub mod trigger;
pub mod tween;

// Re-exports for consumers (adapters)
pub use config::Config;
pub use ease::{Ease, EaseDir};
pub use engine::{Engine, ScopeCtx};
pub use error::{EngineError, EngineResult};
pub use geometry::{GeometryProbe, LayoutBox, LayoutSource, Measurement, StaticLayout, Viewport};
pub use ids::{ScopeId, SubscriptionId, TimelineId, TriggerId, TweenId};
pub use inputs::{Inputs, PointerInput, TimelineCommand};
pub use outputs::{CoreEvent, Outputs};
pub use pin::{PinFrame, PinState};
pub use scheduler::{ChannelKey, Scheduled};
pub use scope::DisposeReport;
pub use scrubline_api_core::{
    FilterValue, PropertyKey, TargetHandle, Value, ValueKind, WriteBatch, WriteOp,
};
pub use section::{SectionConfig, SetConfig};
pub use signals::{
    Axis, PointerBindingConfig, PointerSample, PointerSpace, ProgressUpdate, ScrollDirection,
};
pub use stagger::{StaggerConfig, StaggerFrom, StaggerPlanner};
pub use timeline::{Driver, Position, Timeline, TimelineConfig, TimelineItem};
pub use trigger::{
    Crossing, ResolvedRange, ScrubMode, Threshold, ToggleAction, ToggleActions, TriggerConfig,
};
pub use tween::{ConflictPolicy, RepeatCount, TweenConfig, TweenState};
