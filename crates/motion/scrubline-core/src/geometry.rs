//! Layout measurement.
//!
//! The host owns the document; the engine only asks it where a target sits in
//! its natural (unpinned, untransformed) flow position, in document coordinates.
//! [`GeometryProbe`] caches those answers until a resize or an explicit
//! invalidation, and treats a zero-sized box as "not laid out yet".

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use scrubline_api_core::TargetHandle;

use crate::error::{EngineError, EngineResult};

/// A target's box in document coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutBox {
    pub fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Zero-sized or non-finite boxes cannot anchor anything.
    pub fn is_measurable(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.top.is_finite()
            && self.left.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_measurable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

/// A target's position relative to the viewport at one scroll offset.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Distance from the viewport's top edge to the target's top edge.
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
    /// Document offset of the viewport's top edge (the scroll offset).
    pub viewport_top: f32,
    /// Document offset of the viewport's bottom edge.
    pub viewport_bottom: f32,
}

/// Host-side layout queries.
pub trait LayoutSource {
    /// Natural layout box of `target`, or `None` if the host cannot find it.
    fn layout_box(&mut self, target: &TargetHandle) -> Option<LayoutBox>;

    /// Current viewport, if the source knows it. Resize events take precedence.
    fn viewport(&mut self) -> Option<Viewport> {
        None
    }
}

#[derive(Clone, Copy, Debug)]
struct CachedBox {
    generation: u64,
    layout: LayoutBox,
}

/// Cached layout measurements, invalidated by resize.
#[derive(Debug, Default)]
pub struct GeometryProbe {
    cache: HashMap<TargetHandle, CachedBox>,
    generation: u64,
    viewport: Option<Viewport>,
}

impl GeometryProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Natural layout of `target`. Unmeasurable results are not cached so the
    /// next pass asks the host again.
    pub fn layout(
        &mut self,
        source: &mut dyn LayoutSource,
        target: &TargetHandle,
    ) -> EngineResult<LayoutBox> {
        if let Some(hit) = self.cache.get(target) {
            if hit.generation == self.generation {
                return Ok(hit.layout);
            }
        }
        match source.layout_box(target) {
            Some(layout) if layout.is_measurable() => {
                self.cache.insert(
                    target.clone(),
                    CachedBox {
                        generation: self.generation,
                        layout,
                    },
                );
                Ok(layout)
            }
            _ => Err(EngineError::GeometryUnavailable {
                target: target.clone(),
            }),
        }
    }

    pub fn viewport(&mut self, source: &mut dyn LayoutSource) -> EngineResult<Viewport> {
        if let Some(vp) = self.viewport {
            return Ok(vp);
        }
        match source.viewport() {
            Some(vp) if vp.is_measurable() => {
                self.viewport = Some(vp);
                Ok(vp)
            }
            _ => Err(EngineError::GeometryUnavailable {
                target: TargetHandle::new("viewport"),
            }),
        }
    }

    /// Measure `target` relative to the viewport at scroll offset `scroll`.
    pub fn measure(
        &mut self,
        source: &mut dyn LayoutSource,
        target: &TargetHandle,
        scroll: f32,
    ) -> EngineResult<Measurement> {
        let vp = self.viewport(source)?;
        let layout = self.layout(source, target)?;
        Ok(Measurement {
            top: layout.top - scroll,
            left: layout.left,
            width: layout.width,
            height: layout.height,
            viewport_top: scroll,
            viewport_bottom: scroll + vp.height,
        })
    }

    /// Record a new viewport and drop every cached box.
    pub fn on_resize(&mut self, viewport: Viewport) {
        self.viewport = viewport.is_measurable().then_some(viewport);
        self.invalidate_all();
    }

    pub fn invalidate(&mut self, target: &TargetHandle) {
        self.cache.remove(target);
    }

    pub fn invalidate_all(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cache.clear();
    }
}

#[derive(Debug, Default)]
struct StaticLayoutInner {
    boxes: HashMap<TargetHandle, LayoutBox>,
    viewport: Option<Viewport>,
    queries: usize,
}

/// In-memory [`LayoutSource`] for headless hosts and tests.
///
/// Clones share state, so a test can keep a handle and move layout around
/// after handing the source to an engine.
#[derive(Clone, Debug, Default)]
pub struct StaticLayout {
    inner: Rc<RefCell<StaticLayoutInner>>,
}

impl StaticLayout {
    pub fn new(viewport: Viewport) -> Self {
        let layout = Self::default();
        layout.inner.borrow_mut().viewport = Some(viewport);
        layout
    }

    pub fn with_box(self, target: impl Into<TargetHandle>, layout: LayoutBox) -> Self {
        self.set_box(target, layout);
        self
    }

    pub fn set_box(&self, target: impl Into<TargetHandle>, layout: LayoutBox) {
        self.inner.borrow_mut().boxes.insert(target.into(), layout);
    }

    pub fn remove_box(&self, target: &TargetHandle) {
        self.inner.borrow_mut().boxes.remove(target);
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.inner.borrow_mut().viewport = Some(viewport);
    }

    /// Number of `layout_box` calls answered so far.
    pub fn queries(&self) -> usize {
        self.inner.borrow().queries
    }
}

impl LayoutSource for StaticLayout {
    fn layout_box(&mut self, target: &TargetHandle) -> Option<LayoutBox> {
        let mut inner = self.inner.borrow_mut();
        inner.queries += 1;
        inner.boxes.get(target).copied()
    }

    fn viewport(&mut self) -> Option<Viewport> {
        self.inner.borrow().viewport
    }
}
