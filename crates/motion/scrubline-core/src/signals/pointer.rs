//! Pointer position.
//!
//! Raw `on_move` callbacks run at event time, at whatever rate the host delivers
//! pointer events. Declarative bindings are sampled once per tick, after scroll
//! propagation, and turn the latest position into tween intents.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use scrubline_api_core::{PropertyKey, TargetHandle};

use crate::ease::Ease;
use crate::geometry::{Measurement, Viewport};
use crate::ids::SubscriptionId;
use crate::signals::Listeners;
use crate::tween::ConflictPolicy;

/// Pointer position in viewport (client) pixels.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    pub viewport: Viewport,
}

impl PointerSample {
    /// Position as a fraction of the viewport, 0 at the top-left.
    pub fn normalized(&self) -> (f32, f32) {
        if !self.viewport.is_measurable() {
            return (0.5, 0.5);
        }
        (self.x / self.viewport.width, self.y / self.viewport.height)
    }

    /// Position in [-1, 1] with 0 at the viewport center.
    pub fn centered(&self) -> (f32, f32) {
        let (nx, ny) = self.normalized();
        (nx * 2.0 - 1.0, ny * 2.0 - 1.0)
    }

    /// Pixel offset from the viewport center.
    pub fn from_center(&self) -> (f32, f32) {
        (
            self.x - self.viewport.width / 2.0,
            self.y - self.viewport.height / 2.0,
        )
    }
}

/// What happened to the pointer since the last tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PointerFrame {
    Move(PointerSample),
    Leave,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
}

/// Coordinate space a binding reads the pointer in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerSpace {
    /// [-1, 1] across the viewport.
    #[default]
    Centered,
    /// [0, 1] across the viewport.
    Normalized,
    /// Pixels from the viewport center.
    FromCenter,
    /// Raw client pixels.
    Client,
    /// Pixels from the center of a reference element.
    Element,
}

fn one() -> f32 {
    1.0
}

/// Declarative pointer-to-property mapping:
/// `to = sample(axis, space) * factor + offset`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerBindingConfig {
    pub target: TargetHandle,
    pub property: PropertyKey,
    #[serde(default)]
    pub axis: Axis,
    #[serde(default)]
    pub space: PointerSpace,
    #[serde(default = "one")]
    pub factor: f32,
    #[serde(default)]
    pub offset: f32,
    #[serde(default)]
    pub duration: Option<f32>,
    #[serde(default)]
    pub ease: Option<Ease>,
    #[serde(default)]
    pub conflict: ConflictPolicy,
    /// Tween back to `reset_to` (or the property's default) when the pointer
    /// leaves the viewport.
    #[serde(default)]
    pub reset_on_leave: bool,
    #[serde(default)]
    pub reset_to: Option<f32>,
    /// Element measured for [`PointerSpace::Element`]; defaults to the target.
    #[serde(default)]
    pub reference: Option<TargetHandle>,
}

impl PointerBindingConfig {
    pub fn new(target: impl Into<TargetHandle>, property: PropertyKey, axis: Axis) -> Self {
        Self {
            target: target.into(),
            property,
            axis,
            space: PointerSpace::default(),
            factor: 1.0,
            offset: 0.0,
            duration: None,
            ease: None,
            conflict: ConflictPolicy::default(),
            reset_on_leave: false,
            reset_to: None,
            reference: None,
        }
    }

    pub fn space(mut self, space: PointerSpace) -> Self {
        self.space = space;
        self
    }

    pub fn factor(mut self, factor: f32) -> Self {
        self.factor = factor;
        self
    }

    pub fn conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    pub fn reset_on_leave(mut self) -> Self {
        self.reset_on_leave = true;
        self
    }

    pub fn reference_target(&self) -> &TargetHandle {
        self.reference.as_ref().unwrap_or(&self.target)
    }

    /// Target value for one sample. Element space needs the reference element's
    /// measurement and yields `None` without it.
    pub fn sample(&self, sample: &PointerSample, element: Option<&Measurement>) -> Option<f32> {
        let pick = |(x, y): (f32, f32)| match self.axis {
            Axis::X => x,
            Axis::Y => y,
        };
        let raw = match self.space {
            PointerSpace::Centered => pick(sample.centered()),
            PointerSpace::Normalized => pick(sample.normalized()),
            PointerSpace::FromCenter => pick(sample.from_center()),
            PointerSpace::Client => pick((sample.x, sample.y)),
            PointerSpace::Element => {
                let m = element?;
                pick((
                    sample.x - (m.left + m.width / 2.0),
                    sample.y - (m.top + m.height / 2.0),
                ))
            }
        };
        let v = raw * self.factor + self.offset;
        v.is_finite().then_some(v)
    }

    /// Value a binding returns to on leave.
    pub fn rest_value(&self) -> f32 {
        self.reset_to
            .or_else(|| self.property.default_value().as_float())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Default)]
pub struct PointerSignal {
    frame: Option<PointerFrame>,
    raw: Listeners<(), PointerSample>,
    bindings: IndexMap<SubscriptionId, PointerBindingConfig>,
}

impl PointerSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a move and run raw callbacks immediately.
    pub fn record_move(&mut self, x: f32, y: f32, viewport: Viewport) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        let sample = PointerSample { x, y, viewport };
        self.frame = Some(PointerFrame::Move(sample));
        self.raw.emit(&(), &sample);
    }

    pub fn record_leave(&mut self) {
        self.frame = Some(PointerFrame::Leave);
    }

    /// The pending frame for this tick, if the pointer did anything.
    pub fn take_frame(&mut self) -> Option<PointerFrame> {
        self.frame.take()
    }

    pub fn on_move(&mut self, sub: SubscriptionId, callback: impl FnMut(&PointerSample) + 'static) {
        self.raw.add(sub, (), callback);
    }

    pub fn bind(&mut self, sub: SubscriptionId, binding: PointerBindingConfig) {
        self.bindings.insert(sub, binding);
    }

    pub fn bindings(&self) -> impl Iterator<Item = (SubscriptionId, &PointerBindingConfig)> {
        self.bindings.iter().map(|(id, b)| (*id, b))
    }

    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        let raw = self.raw.remove(sub);
        let bound = self.bindings.shift_remove(&sub).is_some();
        raw || bound
    }

    pub fn contains(&self, sub: SubscriptionId) -> bool {
        self.bindings.contains_key(&sub) || self.raw.contains(sub)
    }

    pub fn subscribers(&self) -> Listeners<(), PointerSample> {
        self.raw.clone()
    }

    pub fn is_listening(&self) -> bool {
        !self.bindings.is_empty() || !self.raw.is_empty()
    }
}
