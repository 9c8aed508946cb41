use js_sys::{Function, JSON};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use scrubline_api_core::json::parse_value;
use scrubline_api_core::{PropertyKey, TargetHandle};
use scrubline_core::{
    Config, Engine, Inputs, LayoutBox, LayoutSource, PointerBindingConfig, ScopeId,
    SectionConfig, SubscriptionId, TimelineCommand, TimelineConfig, TimelineId, TriggerConfig,
    TriggerId, TweenConfig, TweenId, Viewport,
};

#[wasm_bindgen]
pub struct ScrublineEngine {
    core: Engine,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

/// Parse a JS object through its JSON text so the core's serde shapes
/// (untagged endpoints, string-or-number positions) apply unchanged.
fn from_js<T: DeserializeOwned>(context: &str, value: &JsValue) -> Result<T, JsError> {
    if jsvalue_is_undefined_or_null(value) {
        return Err(JsError::new(&format!("{context}: value is null/undefined")));
    }
    let s = JSON::stringify(value)
        .map_err(|e| JsError::new(&format!("{context} stringify error: {:?}", e)))?
        .as_string()
        .ok_or_else(|| JsError::new(&format!("{context}: stringify produced non-string")))?;
    serde_json::from_str(&s).map_err(|e| js_err(context, e))
}

fn to_js<T: Serialize>(context: &str, value: &T) -> Result<JsValue, JsError> {
    value
        .serialize(&swb::Serializer::json_compatible())
        .map_err(|e| js_err(context, e))
}

/// Layout callback supplied by the host.
///
/// `f(target)` returns `{ top, left, width, height }` in document pixels, or
/// null when the element does not exist. `f(null)` returns the viewport as
/// `{ width, height }`.
struct JsLayout {
    f: Function,
}

impl JsLayout {
    fn call(&self, arg: &JsValue) -> Option<JsValue> {
        match self.f.call1(&JsValue::UNDEFINED, arg) {
            Ok(val) if !jsvalue_is_undefined_or_null(&val) => Some(val),
            _ => None,
        }
    }
}

impl LayoutSource for JsLayout {
    fn layout_box(&mut self, target: &TargetHandle) -> Option<LayoutBox> {
        let val = self.call(&JsValue::from_str(target.as_str()))?;
        swb::from_value(val).ok()
    }

    fn viewport(&mut self) -> Option<Viewport> {
        let val = self.call(&JsValue::NULL)?;
        swb::from_value(val).ok()
    }
}

#[wasm_bindgen]
impl ScrublineEngine {
    /// Create a new engine. `config` is a partial Config object or undefined/null for
    /// defaults; `layout` is the host's measurement callback.
    /// Example:
    ///   new ScrublineEngine({ valueEpsilon: 0.001 }, (t) => t === null ? vp : measure(t))
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue, layout: Function) -> Result<ScrublineEngine, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| js_err("config error", e))?
        };

        Ok(ScrublineEngine {
            core: Engine::new(cfg, Box::new(JsLayout { f: layout })),
        })
    }

    // ----- sections and scopes -----

    /// Mount a section declaration into its own scope. Returns the ScopeId (u32).
    /// Nothing stays registered if any part of the section fails.
    #[wasm_bindgen(js_name = mount)]
    pub fn mount(&mut self, section: JsValue) -> Result<u32, JsError> {
        let section: SectionConfig = from_js("mount parse error", &section)?;
        let scope = self
            .core
            .mount_section(&section)
            .map_err(|e| js_err("mount error", e))?;
        Ok(scope.0)
    }

    /// Tear down a scope. Returns a DisposeReport; disposing twice is a no-op.
    #[wasm_bindgen(js_name = dispose)]
    pub fn dispose(&mut self, scope: u32) -> Result<JsValue, JsError> {
        let report = self.core.dispose_scope(ScopeId(scope));
        to_js("dispose", &report)
    }

    #[wasm_bindgen(js_name = live_scopes)]
    pub fn live_scopes(&self) -> u32 {
        self.core.live_scopes() as u32
    }

    // ----- direct registration -----

    /// Start a standalone tween. Returns its TweenId, or undefined when ignored
    /// because the property was already animating.
    #[wasm_bindgen(js_name = tween)]
    pub fn tween(&mut self, cfg: JsValue) -> Result<Option<u32>, JsError> {
        let cfg: TweenConfig = from_js("tween parse error", &cfg)?;
        let scheduled = self.core.tween(cfg).map_err(|e| js_err("tween error", e))?;
        Ok(scheduled.id().map(|id| id.0))
    }

    #[wasm_bindgen(js_name = timeline)]
    pub fn timeline(&mut self, cfg: JsValue) -> Result<u32, JsError> {
        let cfg: TimelineConfig = from_js("timeline parse error", &cfg)?;
        let id = self
            .core
            .timeline(cfg)
            .map_err(|e| js_err("timeline error", e))?;
        Ok(id.0)
    }

    #[wasm_bindgen(js_name = trigger)]
    pub fn trigger(&mut self, cfg: JsValue) -> Result<u32, JsError> {
        let cfg: TriggerConfig = from_js("trigger parse error", &cfg)?;
        let id = self
            .core
            .trigger(cfg)
            .map_err(|e| js_err("trigger error", e))?;
        Ok(id.0)
    }

    /// Call `callback(update)` whenever the trigger's progress changes.
    /// Returns a SubscriptionId (u32).
    #[wasm_bindgen(js_name = on_progress)]
    pub fn on_progress(&mut self, trigger: u32, callback: Function) -> Result<u32, JsError> {
        let sub = self
            .core
            .on_progress(TriggerId(trigger), move |update| {
                if let Ok(val) = to_js("progress", update) {
                    let _ = callback.call1(&JsValue::UNDEFINED, &val);
                }
            })
            .map_err(|e| js_err("on_progress error", e))?;
        Ok(sub.0)
    }

    /// Call `callback(timelineId)` each time the timeline plays through to its
    /// end. Returns a SubscriptionId (u32).
    #[wasm_bindgen(js_name = on_complete)]
    pub fn on_complete(&mut self, timeline: u32, callback: Function) -> Result<u32, JsError> {
        let sub = self
            .core
            .on_complete(TimelineId(timeline), move |done| {
                let _ = callback.call1(&JsValue::UNDEFINED, &JsValue::from(done.0));
            })
            .map_err(|e| js_err("on_complete error", e))?;
        Ok(sub.0)
    }

    #[wasm_bindgen(js_name = bind_pointer)]
    pub fn bind_pointer(&mut self, cfg: JsValue) -> Result<u32, JsError> {
        let cfg: PointerBindingConfig = from_js("bind_pointer parse error", &cfg)?;
        let sub = self
            .core
            .bind_pointer(cfg)
            .map_err(|e| js_err("bind_pointer error", e))?;
        Ok(sub.0)
    }

    #[wasm_bindgen(js_name = unsubscribe)]
    pub fn unsubscribe(&mut self, sub: u32) -> bool {
        self.core.unsubscribe(SubscriptionId(sub))
    }

    #[wasm_bindgen(js_name = kill_tween)]
    pub fn kill_tween(&mut self, id: u32) -> bool {
        self.core.kill_tween(TweenId(id))
    }

    #[wasm_bindgen(js_name = kill_timeline)]
    pub fn kill_timeline(&mut self, id: u32) -> bool {
        self.core.kill_timeline(TimelineId(id))
    }

    /// Assign a resting value: a number, a numeric or filter string, or the
    /// tagged `{ type, data }` form.
    #[wasm_bindgen(js_name = set)]
    pub fn set(
        &mut self,
        target: String,
        property: String,
        value: JsValue,
    ) -> Result<(), JsError> {
        let key: PropertyKey = property.parse().map_err(|e| js_err("set", e))?;
        let json: serde_json::Value = from_js("set value parse error", &value)?;
        let value = parse_value(&json).map_err(|e| js_err("set", e))?;
        self.core
            .set(target, key, value)
            .map_err(|e| js_err("set error", e))
    }

    // ----- host events -----

    #[wasm_bindgen(js_name = scroll)]
    pub fn scroll(&mut self, offset: f32) {
        self.core.scroll_to(offset);
    }

    #[wasm_bindgen(js_name = resize)]
    pub fn resize(&mut self, width: f32, height: f32) {
        self.core.resize(Viewport { width, height });
    }

    #[wasm_bindgen(js_name = pointer_move)]
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.core.pointer_moved(x, y);
    }

    #[wasm_bindgen(js_name = pointer_leave)]
    pub fn pointer_leave(&mut self) {
        self.core.pointer_left();
    }

    #[wasm_bindgen(js_name = invalidate)]
    pub fn invalidate(&mut self, target: String) {
        self.core.invalidate(&TargetHandle::new(target));
    }

    #[wasm_bindgen(js_name = invalidate_all)]
    pub fn invalidate_all(&mut self) {
        self.core.invalidate_all();
    }

    /// Apply one TimelineCommand, e.g. `{ type: "play", timeline: 0 }`.
    #[wasm_bindgen(js_name = command)]
    pub fn command(&mut self, cmd: JsValue) -> Result<(), JsError> {
        let cmd: TimelineCommand = from_js("command parse error", &cmd)?;
        self.core
            .apply_command(&cmd)
            .map_err(|e| js_err("command error", e))
    }

    // ----- queries -----

    #[wasm_bindgen(js_name = value)]
    pub fn value(&self, target: String, property: String) -> Result<JsValue, JsError> {
        let key: PropertyKey = property.parse().map_err(|e| js_err("value", e))?;
        to_js("value", &self.core.value(target, key))
    }

    #[wasm_bindgen(js_name = trigger_progress)]
    pub fn trigger_progress(&self, trigger: u32) -> Option<f32> {
        self.core.trigger_progress(TriggerId(trigger))
    }

    #[wasm_bindgen(js_name = is_scroll_listening)]
    pub fn is_scroll_listening(&self) -> bool {
        self.core.is_scroll_listening()
    }

    // ----- tick -----

    /// Step the engine by dt seconds with optional Inputs and return Outputs
    /// (writes, events, pins) as a plain JS object.
    #[wasm_bindgen(js_name = update)]
    pub fn update(&mut self, dt: f32, inputs: JsValue) -> Result<JsValue, JsError> {
        let inputs: Inputs = if jsvalue_is_undefined_or_null(&inputs) {
            Inputs::default()
        } else {
            from_js("inputs parse error", &inputs)?
        };
        let out = self.core.update(dt, inputs);
        to_js("outputs", out)
    }
}

/// ABI guard for JS wrappers.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
