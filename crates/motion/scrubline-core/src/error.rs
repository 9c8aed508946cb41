//! Engine error type.
//!
//! Configuration-class errors are returned synchronously from registration calls.
//! Geometry that is not yet measurable is never an error at registration time:
//! the trigger is deferred and retried on the next measurement pass.

use scrubline_api_core::{PropertyKey, TargetHandle, ValueError};
use thiserror::Error;

use crate::ids::{TimelineId, TriggerId};
use crate::timeline::Driver;

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("tween on '{target}.{property}' has no 'to' value")]
    MissingTo {
        target: TargetHandle,
        property: PropertyKey,
    },

    #[error("invalid threshold '{0}'")]
    InvalidThreshold(String),

    #[error("trigger on '{anchor}' ends at {end}px before it starts at {start}px")]
    EndBeforeStart {
        anchor: TargetHandle,
        start: f32,
        end: f32,
    },

    #[error("invalid timing: {0}")]
    InvalidTiming(String),

    #[error("invalid position '{0}'")]
    InvalidPosition(String),

    #[error("invalid ease '{0}'")]
    InvalidEase(String),

    #[error("'{target}.{property}': {source}")]
    Value {
        target: TargetHandle,
        property: PropertyKey,
        #[source]
        source: ValueError,
    },

    #[error("infinite repeat is not allowed inside scroll-scrubbed timeline {0:?}")]
    InfiniteInScrub(TimelineId),

    #[error("timeline {timeline:?} is {driver}-driven")]
    DriverMismatch { timeline: TimelineId, driver: Driver },

    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    #[error("unknown timeline {0:?}")]
    UnknownTimeline(TimelineId),

    #[error("unknown trigger {0:?}")]
    UnknownTrigger(TriggerId),

    #[error("geometry unavailable for '{target}'")]
    GeometryUnavailable { target: TargetHandle },

    #[error("start value of '{tween}' depends on '{depends_on}', which depends back on it")]
    ConflictDeadlock { tween: String, depends_on: String },

    #[error("config parse error: {0}")]
    Parse(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// True for mistakes in the declared configuration, as opposed to runtime
    /// conditions like missing geometry.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, EngineError::GeometryUnavailable { .. })
    }

    pub(crate) fn value(target: &TargetHandle, property: &PropertyKey, source: ValueError) -> Self {
        EngineError::Value {
            target: target.clone(),
            property: property.clone(),
            source,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}
