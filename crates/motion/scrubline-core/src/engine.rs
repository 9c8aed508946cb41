//! Engine: owns every signal, timeline and tween, and runs the per-frame tick.
//!
//! Tick order inside [`Engine::update`]:
//! 1. host inputs (resize, invalidation, scroll, pointer, timeline commands)
//! 2. measurement pass: deferred triggers retried, scroll progress computed
//! 3. scroll propagation: pins, toggle actions, scrubbed timelines, callbacks
//! 4. clocks: timelines and standalone tweens advance
//! 5. pointer bindings schedule tweens from the latest pointer position
//! 6. channels evaluate; at most one write per (target, property)
//!
//! The engine is single-threaded. Callbacks receive values, never the engine, so
//! nothing can register or dispose mid-tick.

use hashbrown::HashMap;
use indexmap::IndexMap;
use std::fmt;
use tracing::{debug, warn};

use scrubline_api_core::{PropertyKey, TargetHandle, Value};

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{GeometryProbe, LayoutSource, Viewport};
use crate::ids::{IdAllocator, ScopeId, SubscriptionId, TimelineId, TriggerId, TweenId};
use crate::inputs::{Inputs, PointerInput, TimelineCommand};
use crate::outputs::{CoreEvent, Outputs};
use crate::pin::{PinController, PinFrame};
use crate::scheduler::{ChannelKey, Scheduled, TweenScheduler};
use crate::scope::{DisposeReport, Registration, ScopeRegistry};
use crate::section::SectionConfig;
use crate::signals::{
    PointerBindingConfig, PointerFrame, PointerSample, PointerSignal, PointerSpace,
    ProgressUpdate, ScrollSignal, TriggerStatus,
};
use crate::timeline::{self, Driver, Timeline, TimelineConfig, TimelineEvent};
use crate::trigger::{ResolvedRange, TriggerConfig};
use crate::tween::{
    ConflictPolicy, FromSpec, Owner, RepeatCount, ResolvedTween, ToSpec, TweenConfig, TweenState,
    TweenTiming,
};

/// Callback run each time a timeline plays through to its end.
struct Completion {
    timeline: TimelineId,
    callback: Box<dyn FnMut(TimelineId)>,
}

#[derive(Copy, Clone, Debug)]
struct TriggerLink {
    timeline: Option<TimelineId>,
    pinned: bool,
}

pub struct Engine {
    cfg: Config,
    ids: IdAllocator,
    layout: Box<dyn LayoutSource>,
    probe: GeometryProbe,

    // Signals
    scroll: ScrollSignal,
    pointer: PointerSignal,

    // Motion
    scheduler: TweenScheduler,
    timelines: IndexMap<TimelineId, Timeline>,
    links: HashMap<TriggerId, TriggerLink>,
    pins: PinController,
    scopes: ScopeRegistry,
    completions: IndexMap<SubscriptionId, Completion>,

    // Produced between ticks, flushed by the next update
    pending_events: Vec<CoreEvent>,
    pending_pins: Vec<PinFrame>,
    scroll_listening: bool,
    pointer_listening: bool,

    outputs: Outputs,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("cfg", &self.cfg)
            .field("tweens", &self.scheduler.len())
            .field("timelines", &self.timelines.len())
            .field("pins", &self.pins.len())
            .field("scopes", &self.scopes.len())
            .finish_non_exhaustive()
    }
}

/// Registration handle passed to [`Engine::scope`] setup closures. Everything
/// registered through it is torn down by one `dispose_scope`.
pub struct ScopeCtx<'a> {
    engine: &'a mut Engine,
    scope: ScopeId,
}

impl ScopeCtx<'_> {
    pub fn id(&self) -> ScopeId {
        self.scope
    }

    pub fn tween(&mut self, cfg: TweenConfig) -> EngineResult<Scheduled> {
        self.engine.register_tween(cfg, Some(self.scope), Owner::Standalone)
    }

    pub fn get_timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.engine.get_timeline(id)
    }

    pub fn timeline(&mut self, cfg: TimelineConfig) -> EngineResult<TimelineId> {
        self.engine.register_timeline(cfg, Some(self.scope))
    }

    pub fn trigger(&mut self, cfg: TriggerConfig) -> EngineResult<TriggerId> {
        self.engine.register_trigger(cfg, None, Some(self.scope))
    }

    pub fn on_progress(
        &mut self,
        trigger: TriggerId,
        callback: impl FnMut(&ProgressUpdate) + 'static,
    ) -> EngineResult<SubscriptionId> {
        self.engine.register_progress(trigger, callback, Some(self.scope))
    }

    pub fn on_complete(
        &mut self,
        timeline: TimelineId,
        callback: impl FnMut(TimelineId) + 'static,
    ) -> EngineResult<SubscriptionId> {
        self.engine.register_completion(timeline, callback, Some(self.scope))
    }

    pub fn on_pointer_move(
        &mut self,
        callback: impl FnMut(&PointerSample) + 'static,
    ) -> SubscriptionId {
        self.engine.register_pointer_move(callback, Some(self.scope))
    }

    pub fn bind_pointer(&mut self, cfg: PointerBindingConfig) -> EngineResult<SubscriptionId> {
        self.engine.register_binding(cfg, Some(self.scope))
    }

    pub fn set(
        &mut self,
        target: impl Into<TargetHandle>,
        property: PropertyKey,
        value: impl Into<Value>,
    ) -> EngineResult<()> {
        self.engine.set(target, property, value)
    }
}

impl Engine {
    pub fn new(cfg: Config, layout: Box<dyn LayoutSource>) -> Self {
        Self {
            cfg,
            ids: IdAllocator::new(),
            layout,
            probe: GeometryProbe::new(),
            scroll: ScrollSignal::new(),
            pointer: PointerSignal::new(),
            scheduler: TweenScheduler::new(),
            timelines: IndexMap::new(),
            links: HashMap::new(),
            pins: PinController::new(),
            scopes: ScopeRegistry::new(),
            completions: IndexMap::new(),
            pending_events: Vec::new(),
            pending_pins: Vec::new(),
            scroll_listening: false,
            pointer_listening: false,
            outputs: Outputs::default(),
        }
    }

    /// Engine with default config.
    pub fn with_layout(layout: impl LayoutSource + 'static) -> Self {
        Self::new(Config::default(), Box::new(layout))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    // ----- host events -----

    /// Record the latest scroll offset. Progress is computed on the next update.
    pub fn scroll_to(&mut self, offset: f32) {
        self.scroll.set_offset(offset);
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll.offset()
    }

    /// Viewport changed: every cached measurement and trigger range is stale.
    pub fn resize(&mut self, viewport: Viewport) {
        self.probe.on_resize(viewport);
        self.scroll.invalidate_all();
    }

    /// A target's layout changed without a resize.
    pub fn invalidate(&mut self, target: &TargetHandle) {
        self.probe.invalidate(target);
        self.scroll.invalidate_anchor(target);
    }

    pub fn invalidate_all(&mut self) {
        self.probe.invalidate_all();
        self.scroll.invalidate_all();
    }

    /// Record a pointer move in client pixels. Raw move callbacks run now.
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        let viewport = self.probe.viewport(self.layout.as_mut()).unwrap_or_default();
        self.pointer.record_move(x, y, viewport);
    }

    pub fn pointer_left(&mut self) {
        self.pointer.record_leave();
    }

    // ----- registration -----

    pub fn tween(&mut self, cfg: TweenConfig) -> EngineResult<Scheduled> {
        self.register_tween(cfg, None, Owner::Standalone)
    }

    pub fn timeline(&mut self, cfg: TimelineConfig) -> EngineResult<TimelineId> {
        self.register_timeline(cfg, None)
    }

    /// Standalone trigger, useful for progress callbacks without a timeline.
    pub fn trigger(&mut self, cfg: TriggerConfig) -> EngineResult<TriggerId> {
        self.register_trigger(cfg, None, None)
    }

    pub fn on_progress(
        &mut self,
        trigger: TriggerId,
        callback: impl FnMut(&ProgressUpdate) + 'static,
    ) -> EngineResult<SubscriptionId> {
        self.register_progress(trigger, callback, None)
    }

    /// Call `callback` every time `timeline` plays through to its end.
    pub fn on_complete(
        &mut self,
        timeline: TimelineId,
        callback: impl FnMut(TimelineId) + 'static,
    ) -> EngineResult<SubscriptionId> {
        self.register_completion(timeline, callback, None)
    }

    pub fn on_pointer_move(
        &mut self,
        callback: impl FnMut(&PointerSample) + 'static,
    ) -> SubscriptionId {
        self.register_pointer_move(callback, None)
    }

    pub fn bind_pointer(&mut self, cfg: PointerBindingConfig) -> EngineResult<SubscriptionId> {
        self.register_binding(cfg, None)
    }

    /// Remove a progress, completion or pointer callback, or a pointer binding.
    /// Tweens started by a binding are cancelled where they stand.
    pub fn unsubscribe(&mut self, sub: SubscriptionId) -> bool {
        let removed = self.remove_subscription(sub);
        self.sync_listening();
        removed
    }

    /// Assign a resting value immediately.
    pub fn set(
        &mut self,
        target: impl Into<TargetHandle>,
        property: PropertyKey,
        value: impl Into<Value>,
    ) -> EngineResult<()> {
        let target = target.into();
        let value = value.into();
        if !property.accepts(&value) {
            return Err(EngineError::value(
                &target,
                &property,
                scrubline_api_core::ValueError::KindMismatch {
                    left: property.value_kind(),
                    right: value.kind(),
                },
            ));
        }
        self.scheduler.set_value(ChannelKey::new(target, property), value);
        Ok(())
    }

    /// Cancel a standalone tween, leaving its pair where it is.
    pub fn kill_tween(&mut self, id: TweenId) -> bool {
        self.scheduler.cancel(id)
    }

    pub fn kill_timeline(&mut self, id: TimelineId) -> bool {
        let removed = self.remove_timeline(id).is_some();
        self.sync_listening();
        removed
    }

    /// Run `setup` inside a new scope. If it fails, everything it registered is
    /// disposed and the error is returned.
    pub fn scope<F>(&mut self, setup: F) -> EngineResult<ScopeId>
    where
        F: FnOnce(&mut ScopeCtx<'_>) -> EngineResult<()>,
    {
        self.scope_named(None, setup)
    }

    pub fn scope_named<F>(&mut self, label: Option<String>, setup: F) -> EngineResult<ScopeId>
    where
        F: FnOnce(&mut ScopeCtx<'_>) -> EngineResult<()>,
    {
        let id = self.ids.alloc_scope();
        self.scopes.open(id, label);
        let result = {
            let mut ctx = ScopeCtx {
                engine: self,
                scope: id,
            };
            setup(&mut ctx)
        };
        match result {
            Ok(()) => Ok(id),
            Err(err) => {
                warn!(scope = id.0, error = %err, "scope setup failed, rolling back");
                self.teardown(id);
                Err(err)
            }
        }
    }

    /// Tear down everything a scope registered. Idempotent; never fails.
    pub fn dispose_scope(&mut self, id: ScopeId) -> DisposeReport {
        let report = self.teardown(id);
        if !report.already_disposed {
            debug!(scope = id.0, ?report, "scope disposed");
            self.pending_events.push(CoreEvent::ScopeDisposed { scope: id });
        }
        report
    }

    pub fn is_scope_live(&self, id: ScopeId) -> bool {
        self.scopes.contains(id)
    }

    pub fn live_scopes(&self) -> usize {
        self.scopes.len()
    }

    /// Pairs the engine currently tracks. Pairs back at their property
    /// default with nothing animating them are forgotten.
    pub fn channel_count(&self) -> usize {
        self.scheduler.channel_count()
    }

    /// Mount a declarative section into its own scope.
    pub fn mount_section(&mut self, section: &SectionConfig) -> EngineResult<ScopeId> {
        self.scope_named(section.name.clone(), |ctx| {
            for s in &section.set {
                ctx.set(s.target.clone(), s.property.clone(), s.value.clone())?;
            }
            for t in &section.tweens {
                ctx.tween(t.clone())?;
            }
            for tl in &section.timelines {
                ctx.timeline(tl.clone())?;
            }
            for p in &section.pointer {
                ctx.bind_pointer(p.clone())?;
            }
            Ok(())
        })
    }

    // ----- timeline control -----

    pub fn get_timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(&id)
    }

    fn timeline_mut(&mut self, id: TimelineId) -> EngineResult<&mut Timeline> {
        self.timelines
            .get_mut(&id)
            .ok_or(EngineError::UnknownTimeline(id))
    }

    /// Scroll-driven timelines only.
    pub fn set_timeline_progress(&mut self, id: TimelineId, progress: f32) -> EngineResult<()> {
        self.timeline_mut(id)?.set_progress(progress)
    }

    /// Clock-driven timelines only.
    pub fn set_timeline_clock(&mut self, id: TimelineId, elapsed: f32) -> EngineResult<()> {
        self.timeline_mut(id)?.set_clock(elapsed)
    }

    pub fn apply_command(&mut self, cmd: &TimelineCommand) -> EngineResult<()> {
        let tl = self.timeline_mut(cmd.timeline())?;
        match *cmd {
            TimelineCommand::Play { .. } => tl.play(),
            TimelineCommand::Pause { .. } => tl.pause(),
            TimelineCommand::Resume { .. } => tl.resume(),
            TimelineCommand::Reverse { .. } => tl.reverse(),
            TimelineCommand::Restart { .. } => tl.restart(),
            TimelineCommand::Reset { .. } => tl.reset(),
            TimelineCommand::Complete { .. } => tl.complete(),
            TimelineCommand::Seek { time, .. } => tl.set_clock(time)?,
            TimelineCommand::SetProgress { progress, .. } => tl.set_progress(progress)?,
        }
        Ok(())
    }

    // ----- queries -----

    /// Last resolved value of a pair.
    pub fn value(&self, target: impl Into<TargetHandle>, property: PropertyKey) -> Value {
        self.scheduler
            .current_value(&ChannelKey::new(target, property))
    }

    pub fn tween_state(&self, id: TweenId) -> TweenState {
        self.scheduler.state(id)
    }

    pub fn trigger_progress(&self, id: TriggerId) -> Option<f32> {
        self.scroll.progress(id)
    }

    pub fn trigger_range(&self, id: TriggerId) -> Option<ResolvedRange> {
        self.scroll.range(id)
    }

    pub fn is_trigger_pending(&self, id: TriggerId) -> bool {
        self.scroll.is_pending(id)
    }

    pub fn pin(&self, trigger: TriggerId) -> Option<&PinFrame> {
        self.pins.current(trigger)
    }

    pub fn is_scroll_listening(&self) -> bool {
        self.scroll.is_listening()
    }

    pub fn is_pointer_listening(&self) -> bool {
        self.pointer.is_listening()
    }

    // ----- tick -----

    /// Advance one frame by `dt` seconds and return what the host should apply.
    pub fn update(&mut self, dt: f32, inputs: Inputs) -> &Outputs {
        self.outputs.clear();
        self.outputs.pins.append(&mut self.pending_pins);
        self.apply_inputs(inputs);
        let dt = self.cfg.effective_dt(dt);

        self.propagate_scroll();

        let mut completed = Vec::new();
        for tl in self.timelines.values_mut() {
            match tl.advance(dt) {
                Some(TimelineEvent::Completed) => {
                    completed.push(tl.id());
                    self.pending_events
                        .push(CoreEvent::TimelineCompleted { timeline: tl.id() });
                }
                Some(TimelineEvent::ReverseCompleted) => self
                    .pending_events
                    .push(CoreEvent::TimelineReverseCompleted { timeline: tl.id() }),
                None => {}
            }
        }
        for completion in self.completions.values_mut() {
            if completed.contains(&completion.timeline) {
                (completion.callback)(completion.timeline);
            }
        }
        self.scheduler.advance(dt);
        for tl in self.timelines.values() {
            for (tween, progress, started) in tl.sample() {
                self.scheduler.set_timeline_progress(tween, progress, started);
            }
        }

        if let Some(frame) = self.pointer.take_frame() {
            self.apply_pointer(frame);
        }

        let eval = self.scheduler.evaluate(self.cfg.value_epsilon);
        self.outputs.writes.extend(eval.writes);
        for tween in eval.settled {
            self.pending_events.push(CoreEvent::TweenSettled { tween });
        }

        self.sync_listening();
        let cap = self.cfg.max_events_per_tick;
        if self.pending_events.len() > cap {
            warn!(
                dropped = self.pending_events.len() - cap,
                "event buffer full, dropping events"
            );
            self.pending_events.truncate(cap);
        }
        self.outputs.events.append(&mut self.pending_events);
        &self.outputs
    }

    fn apply_inputs(&mut self, inputs: Inputs) {
        if let Some(vp) = inputs.viewport {
            self.resize(vp);
        }
        if inputs.invalidate_all {
            self.invalidate_all();
        }
        for target in &inputs.invalidate {
            self.invalidate(target);
        }
        if let Some(offset) = inputs.scroll {
            self.scroll_to(offset);
        }
        for p in inputs.pointer {
            match p {
                PointerInput::Move { x, y } => self.pointer_moved(x, y),
                PointerInput::Leave => self.pointer_left(),
            }
        }
        for cmd in &inputs.timeline_cmds {
            if let Err(err) = self.apply_command(cmd) {
                warn!(error = %err, "timeline command rejected");
                self.pending_events.push(CoreEvent::Error {
                    message: err.to_string(),
                });
            }
        }
    }

    fn propagate_scroll(&mut self) {
        let pass = self.scroll.compute(&mut self.probe, self.layout.as_mut());
        for (trigger, err) in &pass.failed {
            self.pending_events.push(CoreEvent::Error {
                message: format!("trigger {}: {err}", trigger.0),
            });
        }
        for frame in &pass.frames {
            if frame.activated {
                debug!(
                    trigger = frame.trigger.0,
                    start = frame.range.start,
                    end = frame.range.end,
                    "trigger activated"
                );
                self.pending_events.push(CoreEvent::TriggerActivated {
                    trigger: frame.trigger,
                    start: frame.range.start,
                    end: frame.range.end,
                });
            }
            let Some(link) = self.links.get(&frame.trigger).copied() else {
                continue;
            };
            if link.pinned {
                if let Some(pin) =
                    self.pins
                        .update(frame.trigger, frame.anchor_top, frame.range, frame.scroll)
                {
                    self.outputs.pins.push(pin);
                }
            }
            let actions = self.scroll.config(frame.trigger).map(|c| c.toggle_actions);
            for &crossing in &frame.crossings {
                self.pending_events.push(CoreEvent::TriggerToggled {
                    trigger: frame.trigger,
                    crossing,
                });
                if let (Some(id), Some(actions)) = (link.timeline, actions) {
                    if let Some(tl) = self.timelines.get_mut(&id) {
                        tl.apply(actions.for_crossing(crossing));
                    }
                }
            }
            if let Some(tl) = link.timeline.and_then(|id| self.timelines.get_mut(&id)) {
                if tl.driver() == Driver::Scrub {
                    // Scroll-driven by construction, so this cannot mismatch.
                    let _ = tl.set_progress(frame.progress);
                }
            }
        }
        self.scroll.dispatch(&pass);
    }

    fn apply_pointer(&mut self, frame: PointerFrame) {
        let bindings: Vec<(SubscriptionId, PointerBindingConfig)> = self
            .pointer
            .bindings()
            .map(|(id, b)| (id, b.clone()))
            .collect();
        let scroll = self.scroll.offset();
        for (sub, binding) in bindings {
            let additive = binding.conflict == ConflictPolicy::CoexistAdditively;
            let raw = match frame {
                PointerFrame::Move(sample) => {
                    let element = if binding.space == PointerSpace::Element {
                        self.probe
                            .measure(self.layout.as_mut(), binding.reference_target(), scroll)
                            .ok()
                    } else {
                        None
                    };
                    match binding.sample(&sample, element.as_ref()) {
                        Some(v) => v,
                        None => continue,
                    }
                }
                PointerFrame::Leave if binding.reset_on_leave => {
                    if additive {
                        binding.reset_to.unwrap_or(0.0)
                    } else {
                        binding.rest_value()
                    }
                }
                PointerFrame::Leave => continue,
            };
            let key = ChannelKey::new(binding.target.clone(), binding.property.clone());
            let to = if additive {
                self.scheduler.baseline(&key).as_float().unwrap_or(0.0) + raw
            } else {
                raw
            };
            let cfg = TweenConfig {
                target: binding.target,
                property: binding.property,
                to: Some(ToSpec::Absolute(Value::Float(to))),
                from: FromSpec::Current,
                duration: binding.duration,
                delay: 0.0,
                ease: binding.ease,
                conflict: binding.conflict,
                repeat: RepeatCount::Never,
                yoyo: false,
                label: None,
                snap: None,
            };
            if let Err(err) = self.register_tween(cfg, None, Owner::Binding(sub)) {
                warn!(subscription = sub.0, error = %err, "pointer binding rejected");
                self.pending_events.push(CoreEvent::Error {
                    message: err.to_string(),
                });
            }
        }
    }

    // ----- internals -----

    fn record(&mut self, scope: Option<ScopeId>, registration: Registration) {
        if let Some(scope) = scope {
            self.scopes.record(scope, registration);
        }
    }

    fn sync_listening(&mut self) {
        let scroll = self.scroll.is_listening();
        if scroll != self.scroll_listening {
            self.scroll_listening = scroll;
            debug!(listening = scroll, "scroll listening changed");
            self.pending_events
                .push(CoreEvent::ScrollListening { listening: scroll });
        }
        let pointer = self.pointer.is_listening();
        if pointer != self.pointer_listening {
            self.pointer_listening = pointer;
            debug!(listening = pointer, "pointer listening changed");
            self.pending_events
                .push(CoreEvent::PointerListening { listening: pointer });
        }
    }

    fn timing_of(&self, cfg: &TweenConfig) -> TweenTiming {
        TweenTiming {
            delay: cfg.delay,
            duration: cfg.duration.unwrap_or(self.cfg.default_duration),
            repeat: cfg.repeat,
            yoyo: cfg.yoyo,
        }
    }

    fn resolved(
        &self,
        id: TweenId,
        cfg: TweenConfig,
        from: Value,
        to: Value,
        timing: TweenTiming,
    ) -> ResolvedTween {
        ResolvedTween {
            id,
            ease: cfg.ease.unwrap_or(self.cfg.default_ease),
            target: cfg.target,
            property: cfg.property,
            from,
            to,
            timing,
            conflict: cfg.conflict,
            label: cfg.label,
            snap: cfg.snap,
        }
    }

    fn detach_cancelled(&mut self, cancelled: &[(TweenId, Owner)]) {
        for (tween, owner) in cancelled {
            if let Owner::Timeline(tl) = owner {
                if let Some(tl) = self.timelines.get_mut(tl) {
                    tl.remove_tween(*tween);
                }
            }
        }
    }

    fn register_tween(
        &mut self,
        cfg: TweenConfig,
        scope: Option<ScopeId>,
        owner: Owner,
    ) -> EngineResult<Scheduled> {
        cfg.validate()?;
        let key = ChannelKey::new(cfg.target.clone(), cfg.property.clone());
        let from = match &cfg.from {
            FromSpec::Value(v) => v.clone(),
            FromSpec::EndOf(label) => self
                .scheduler
                .labelled(label)
                .and_then(|id| self.scheduler.tween(id))
                .map(|t| t.to.clone())
                .ok_or_else(|| EngineError::UnknownLabel(label.clone()))?,
            FromSpec::Current => self.scheduler.start_value(&key, cfg.conflict, owner),
        };
        let to = cfg.resolve_to(&from)?;
        let timing = self.timing_of(&cfg);
        let id = self.ids.alloc_tween();
        let tween = self.resolved(id, cfg, from, to, timing);
        let outcome = self.scheduler.schedule(tween, owner, 0.0);
        self.detach_cancelled(&outcome.cancelled);
        if let Scheduled::Active(id) = outcome.scheduled {
            self.record(scope, Registration::Tween(id));
        }
        Ok(outcome.scheduled)
    }

    fn register_trigger(
        &mut self,
        cfg: TriggerConfig,
        timeline: Option<TimelineId>,
        scope: Option<ScopeId>,
    ) -> EngineResult<TriggerId> {
        let id = self.ids.alloc_trigger();
        let anchor = cfg.anchor.clone();
        let pinned = cfg.pin;
        let status = self
            .scroll
            .register(id, cfg, &mut self.probe, self.layout.as_mut())?;
        if status == TriggerStatus::Deferred {
            self.pending_events.push(CoreEvent::TriggerDeferred {
                trigger: id,
                anchor: anchor.clone(),
            });
        }
        if pinned {
            self.pins.attach(id, anchor);
        }
        self.links.insert(id, TriggerLink { timeline, pinned });
        if timeline.is_none() {
            self.record(scope, Registration::Trigger(id));
        }
        self.sync_listening();
        Ok(id)
    }

    fn register_timeline(
        &mut self,
        cfg: TimelineConfig,
        scope: Option<ScopeId>,
    ) -> EngineResult<TimelineId> {
        let id = self.ids.alloc_timeline();
        let mut tl = Timeline::from_config(id, &cfg)?;
        let placements = timeline::layout(&cfg.items, self.cfg.default_duration)?;
        let infinite = placements.iter().any(|p| p.timing.repeat.is_infinite());
        if tl.driver() == Driver::Scrub && infinite {
            return Err(EngineError::InfiniteInScrub(id));
        }
        let owner = Owner::Timeline(id);
        let scheduler = &self.scheduler;
        let endpoints = timeline::resolve_endpoints(
            &placements,
            |key, policy| scheduler.start_value(key, policy, owner),
            |label| {
                scheduler
                    .labelled(label)
                    .and_then(|t| scheduler.tween(t))
                    .map(|t| t.to.clone())
            },
        )?;

        // The trigger can still reject the config; nothing is scheduled yet.
        if let Some(trigger) = cfg.trigger.clone() {
            let trigger = self.register_trigger(trigger, Some(id), None)?;
            tl.bind_trigger(trigger);
        }

        for (placement, (from, to)) in placements.into_iter().zip(endpoints) {
            let tween_id = self.ids.alloc_tween();
            let (start, timing) = (placement.start, placement.timing);
            let tween = self.resolved(tween_id, placement.config, from, to, timing);
            let outcome = self.scheduler.schedule(tween, owner, start);
            self.detach_cancelled(&outcome.cancelled);
            if let Scheduled::Active(tween_id) = outcome.scheduled {
                if let Err(err) = tl.add_tween(tween_id, start, timing) {
                    self.scheduler.cancel_owner(owner);
                    if let Some(trigger) = tl.trigger() {
                        self.remove_trigger(trigger);
                    }
                    self.sync_listening();
                    return Err(err);
                }
            }
        }
        debug!(
            timeline = id.0,
            driver = %tl.driver(),
            tweens = tl.entries().len(),
            duration = tl.duration(),
            "timeline built"
        );
        self.timelines.insert(id, tl);
        self.record(scope, Registration::Timeline(id));
        Ok(id)
    }

    fn register_progress(
        &mut self,
        trigger: TriggerId,
        callback: impl FnMut(&ProgressUpdate) + 'static,
        scope: Option<ScopeId>,
    ) -> EngineResult<SubscriptionId> {
        let sub = self.ids.alloc_subscription();
        self.scroll.on_progress(sub, trigger, callback)?;
        self.record(scope, Registration::Subscription(sub));
        self.sync_listening();
        Ok(sub)
    }

    fn register_completion(
        &mut self,
        timeline: TimelineId,
        callback: impl FnMut(TimelineId) + 'static,
        scope: Option<ScopeId>,
    ) -> EngineResult<SubscriptionId> {
        if !self.timelines.contains_key(&timeline) {
            return Err(EngineError::UnknownTimeline(timeline));
        }
        let sub = self.ids.alloc_subscription();
        self.completions.insert(
            sub,
            Completion {
                timeline,
                callback: Box::new(callback),
            },
        );
        self.record(scope, Registration::Subscription(sub));
        Ok(sub)
    }

    fn remove_subscription(&mut self, sub: SubscriptionId) -> bool {
        let removed = self.scroll.unsubscribe(sub)
            | self.pointer.unsubscribe(sub)
            | self.completions.shift_remove(&sub).is_some();
        self.scheduler.cancel_owner(Owner::Binding(sub));
        removed
    }

    fn register_pointer_move(
        &mut self,
        callback: impl FnMut(&PointerSample) + 'static,
        scope: Option<ScopeId>,
    ) -> SubscriptionId {
        let sub = self.ids.alloc_subscription();
        self.pointer.on_move(sub, callback);
        self.record(scope, Registration::Subscription(sub));
        self.sync_listening();
        sub
    }

    fn register_binding(
        &mut self,
        cfg: PointerBindingConfig,
        scope: Option<ScopeId>,
    ) -> EngineResult<SubscriptionId> {
        if cfg.property.value_kind() != scrubline_api_core::ValueKind::Float {
            return Err(EngineError::value(
                &cfg.target,
                &cfg.property,
                scrubline_api_core::ValueError::KindMismatch {
                    left: cfg.property.value_kind(),
                    right: scrubline_api_core::ValueKind::Float,
                },
            ));
        }
        if !cfg.factor.is_finite() || !cfg.offset.is_finite() {
            return Err(EngineError::InvalidTiming(format!(
                "pointer binding on '{}.{}' has a non-finite factor or offset",
                cfg.target, cfg.property
            )));
        }
        if let Some(d) = cfg.duration {
            if !d.is_finite() || d < 0.0 {
                return Err(EngineError::InvalidTiming(format!("duration {d}")));
            }
        }
        let sub = self.ids.alloc_subscription();
        self.pointer.bind(sub, cfg);
        self.record(scope, Registration::Subscription(sub));
        self.sync_listening();
        Ok(sub)
    }

    fn remove_trigger(&mut self, trigger: TriggerId) -> Option<usize> {
        let existed = self.scroll.unregister(trigger);
        self.links.remove(&trigger);
        let released = match self.pins.release(trigger) {
            Some(frame) => {
                self.pending_pins.push(frame);
                1
            }
            None => 0,
        };
        existed.then_some(released)
    }

    /// Returns (tweens, trigger removed, pins released).
    fn remove_timeline(&mut self, id: TimelineId) -> Option<(usize, bool, usize)> {
        let tl = self.timelines.shift_remove(&id)?;
        self.completions.retain(|_, c| c.timeline != id);
        let tweens = self.scheduler.cancel_owner(Owner::Timeline(id));
        let (trigger, pins) = match tl.trigger().and_then(|t| self.remove_trigger(t)) {
            Some(pins) => (true, pins),
            None => (false, 0),
        };
        Some((tweens, trigger, pins))
    }

    fn teardown(&mut self, id: ScopeId) -> DisposeReport {
        if let Some(label) = self.scopes.label(id) {
            debug!(scope = id.0, label, "tearing down scope");
        }
        let Some(registrations) = self.scopes.close(id) else {
            return DisposeReport {
                already_disposed: true,
                ..DisposeReport::default()
            };
        };
        let mut report = DisposeReport::default();
        for registration in registrations {
            match registration {
                Registration::Subscription(sub) => {
                    report.subscriptions += usize::from(self.remove_subscription(sub));
                }
                Registration::Trigger(trigger) => {
                    if let Some(pins) = self.remove_trigger(trigger) {
                        report.triggers += 1;
                        report.pins += pins;
                    }
                }
                Registration::Timeline(tl) => {
                    if let Some((tweens, trigger, pins)) = self.remove_timeline(tl) {
                        report.timelines += 1;
                        report.tweens += tweens;
                        report.triggers += usize::from(trigger);
                        report.pins += pins;
                    }
                }
                Registration::Tween(tween) => {
                    report.tweens += usize::from(self.scheduler.cancel(tween));
                }
            }
        }
        self.sync_listening();
        report
    }
}
