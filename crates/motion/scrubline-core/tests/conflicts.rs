use scrubline_core::{
    ease::Ease,
    engine::Engine,
    error::EngineError,
    geometry::{LayoutBox, StaticLayout, Viewport},
    inputs::{Inputs, PointerInput},
    outputs::CoreEvent,
    scheduler::Scheduled,
    signals::{Axis, PointerBindingConfig, PointerSpace},
    timeline::{Driver, Position, TimelineConfig},
    trigger::{ScrubMode, TriggerConfig},
    tween::{ConflictPolicy, TweenConfig, TweenState},
    PropertyKey, Value,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn engine() -> Engine {
    Engine::with_layout(
        StaticLayout::new(Viewport::new(1000.0, 800.0))
            .with_box("section", LayoutBox::new(1000.0, 0.0, 1000.0, 800.0)),
    )
}

fn x(eng: &Engine, target: &str) -> f32 {
    eng.value(target, PropertyKey::X).as_float().unwrap()
}

fn linear_to(target: &str, to: f32, duration: f32) -> TweenConfig {
    TweenConfig::to(target, PropertyKey::X, to)
        .duration(duration)
        .ease(Ease::Linear)
}

fn pointer(px: f32, py: f32) -> Inputs {
    Inputs {
        pointer: vec![PointerInput::Move { x: px, y: py }],
        ..Inputs::default()
    }
}

/// it should stack two additive offsets on the baseline (10 + 5 + 3 = 18)
#[test]
fn additive_offsets_sum_on_baseline() {
    let mut eng = engine();
    eng.set("dot", PropertyKey::X, 10.0).unwrap();
    let add = |offset: f32, duration: f32| {
        TweenConfig::by("dot", PropertyKey::X, offset)
            .duration(duration)
            .ease(Ease::Linear)
            .conflict(ConflictPolicy::CoexistAdditively)
    };
    eng.tween(add(5.0, 1.0)).unwrap();
    eng.tween(add(3.0, 0.5)).unwrap();

    eng.update(0.25, Inputs::default());
    approx(x(&eng, "dot"), 12.75, 1e-4);

    let mut settled = 0;
    for _ in 0..3 {
        let out = eng.update(0.25, Inputs::default());
        settled += out
            .events
            .iter()
            .filter(|e| matches!(e, CoreEvent::TweenSettled { .. }))
            .count();
    }
    assert_eq!(settled, 2);
    assert_eq!(x(&eng, "dot"), 18.0);

    // Resting channels produce no further writes.
    let out = eng.update(0.25, Inputs::default());
    assert!(out.writes.is_empty());
}

/// it should start a replacing tween from the value on screen, without a jump
#[test]
fn replace_continues_from_current_value() {
    let mut eng = engine();
    let first = eng.tween(linear_to("dot", 100.0, 1.0)).unwrap().id().unwrap();
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 50.0, 1e-4);

    let second = eng.tween(linear_to("dot", 200.0, 1.0)).unwrap().id().unwrap();
    assert_eq!(eng.tween_state(first), TweenState::Disposed);
    let out = eng.update(0.0, Inputs::default());
    assert!(out.writes.is_empty(), "no discontinuity on replace");
    approx(x(&eng, "dot"), 50.0, 1e-4);

    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 125.0, 1e-4);
    assert_eq!(eng.tween_state(second), TweenState::Active);
}

fn additive_by(target: &str, offset: f32, duration: f32) -> TweenConfig {
    TweenConfig::by(target, PropertyKey::X, offset)
        .duration(duration)
        .ease(Ease::Linear)
        .conflict(ConflictPolicy::CoexistAdditively)
}

/// it should start an absolute tween from a finished additive result and land exactly on its end
#[test]
fn absolute_after_settled_additive_lands_on_target() {
    let mut eng = engine();
    eng.tween(additive_by("dot", 5.0, 1.0)).unwrap();
    for _ in 0..2 {
        eng.update(0.5, Inputs::default());
    }
    assert_eq!(x(&eng, "dot"), 5.0);

    eng.tween(linear_to("dot", 10.0, 1.0)).unwrap();
    let out = eng.update(0.0, Inputs::default());
    assert!(out.writes.is_empty(), "no jump when the absolute tween starts");
    approx(x(&eng, "dot"), 5.0, 1e-4);
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 7.5, 1e-4);
    eng.update(0.5, Inputs::default());
    assert_eq!(x(&eng, "dot"), 10.0);
    eng.update(0.5, Inputs::default());
    assert_eq!(x(&eng, "dot"), 10.0);
}

/// it should replace a running additive tween from the value on screen
#[test]
fn replace_over_running_additive() {
    let mut eng = engine();
    let offset = eng.tween(additive_by("dot", 5.0, 1.0)).unwrap().id().unwrap();
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 2.5, 1e-4);

    eng.tween(linear_to("dot", 10.0, 1.0)).unwrap();
    assert_eq!(eng.tween_state(offset), TweenState::Disposed);
    eng.update(0.0, Inputs::default());
    approx(x(&eng, "dot"), 2.5, 1e-4);
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 6.25, 1e-4);
    eng.update(0.5, Inputs::default());
    assert_eq!(x(&eng, "dot"), 10.0);
}

/// it should stack an additive offset on a running absolute tween and keep it after both finish
#[test]
fn additive_on_top_of_running_absolute() {
    let mut eng = engine();
    eng.tween(linear_to("dot", 10.0, 1.0)).unwrap();
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 5.0, 1e-4);

    eng.tween(additive_by("dot", 5.0, 1.0)).unwrap();
    eng.update(0.0, Inputs::default());
    approx(x(&eng, "dot"), 5.0, 1e-4);
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 12.5, 1e-4);
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 15.0, 1e-4);
    eng.update(0.5, Inputs::default());
    approx(x(&eng, "dot"), 15.0, 1e-4);
}

/// it should round a snapped tween's values to its increment
#[test]
fn snapped_tween_writes_whole_steps() {
    let mut eng = engine();
    eng.tween(linear_to("counter", 10.0, 1.0).snap(1.0)).unwrap();
    eng.update(0.33, Inputs::default());
    assert_eq!(x(&eng, "counter"), 3.0);
    eng.update(0.04, Inputs::default());
    assert_eq!(x(&eng, "counter"), 4.0);
}

/// it should forget pairs that animate back to their default
#[test]
fn pairs_back_at_default_are_forgotten() {
    let mut eng = engine();
    for i in 0..16 {
        eng.tween(linear_to(&format!("dot-{i}"), 10.0, 0.5)).unwrap();
    }
    eng.update(0.5, Inputs::default());
    assert_eq!(eng.channel_count(), 16);

    for i in 0..16 {
        eng.tween(linear_to(&format!("dot-{i}"), 0.0, 0.5)).unwrap();
    }
    eng.update(0.5, Inputs::default());
    assert_eq!(eng.channel_count(), 0);
    assert_eq!(x(&eng, "dot-3"), 0.0);
}

/// it should drop a tween scheduled with ignore-if-active while the pair animates
#[test]
fn ignore_if_active_keeps_running_tween() {
    let mut eng = engine();
    eng.tween(linear_to("dot", 100.0, 1.0)).unwrap();
    let ignored = eng
        .tween(linear_to("dot", -100.0, 1.0).conflict(ConflictPolicy::IgnoreIfActive))
        .unwrap();
    assert_eq!(ignored, Scheduled::Ignored);
    for _ in 0..2 {
        eng.update(0.5, Inputs::default());
    }
    assert_eq!(x(&eng, "dot"), 100.0);

    // Once idle, the same call schedules normally.
    let again = eng
        .tween(linear_to("dot", -100.0, 1.0).conflict(ConflictPolicy::IgnoreIfActive))
        .unwrap();
    assert!(again.id().is_some());
}

/// it should resolve `from: endOf(label)` against the labelled tween's end value
#[test]
fn from_end_of_label() {
    let mut eng = engine();
    eng.tween(linear_to("a", 40.0, 1.0).label("intro")).unwrap();
    eng.tween(
        TweenConfig::by("b", PropertyKey::X, 10.0)
            .from_end_of("intro")
            .duration(1.0)
            .ease(Ease::Linear),
    )
    .unwrap();
    let out = eng.update(0.0, Inputs::default());
    assert_eq!(
        out.writes.find("b", &PropertyKey::X).unwrap().value,
        Value::Float(40.0)
    );
    for _ in 0..2 {
        eng.update(0.5, Inputs::default());
    }
    assert_eq!(x(&eng, "b"), 50.0);

    let err = eng
        .tween(linear_to("c", 1.0, 1.0).from_end_of("missing"))
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownLabel(l) if l == "missing"));
}

/// it should report a dependency cycle between start values instead of guessing
#[test]
fn cyclic_start_values_are_a_deadlock() {
    let mut eng = engine();
    let cfg = TimelineConfig::new()
        .add(
            linear_to("a", 1.0, 1.0).label("first").from_end_of("second"),
            Position::At(0.0),
        )
        .add(
            linear_to("b", 1.0, 1.0).label("second").from_end_of("first"),
            Position::At(0.0),
        );
    let err = eng.timeline(cfg).unwrap_err();
    match err {
        EngineError::ConflictDeadlock { tween, depends_on } => {
            assert_eq!(tween, "second");
            assert_eq!(depends_on, "first");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(eng.update(1.0, Inputs::default()).writes.is_empty());
}

/// it should refuse clock control on scroll timelines and scroll control on clock timelines
#[test]
fn driver_mismatch_is_rejected() {
    let mut eng = engine();
    let scrubbed = eng
        .timeline(
            TimelineConfig::new()
                .trigger(
                    TriggerConfig::new("section", "top bottom", "bottom top")
                        .unwrap()
                        .scrub(ScrubMode::Immediate),
                )
                .add(linear_to("a", 1.0, 1.0), Position::At(0.0)),
        )
        .unwrap();
    let clock = eng
        .timeline(TimelineConfig::new().add(linear_to("b", 1.0, 1.0), Position::At(0.0)))
        .unwrap();

    assert!(matches!(
        eng.set_timeline_clock(scrubbed, 0.5),
        Err(EngineError::DriverMismatch { driver: Driver::Scrub, .. })
    ));
    assert!(matches!(
        eng.set_timeline_progress(clock, 0.5),
        Err(EngineError::DriverMismatch { driver: Driver::Clock, .. })
    ));
    assert!(eng.set_timeline_progress(scrubbed, 0.5).is_ok());
    assert!(eng.set_timeline_clock(clock, 0.5).is_ok());

    let err = eng
        .timeline(
            TimelineConfig::new()
                .driver(Driver::Clock)
                .trigger(
                    TriggerConfig::new("section", "top bottom", "bottom top")
                        .unwrap()
                        .scrub(ScrubMode::Immediate),
                )
                .add(linear_to("c", 1.0, 1.0), Position::At(0.0)),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTiming(_)));
}

/// it should reject infinite repeats inside a scroll-driven timeline
#[test]
fn infinite_repeat_in_scrub_is_rejected() {
    let mut eng = engine();
    let err = eng
        .timeline(
            TimelineConfig::new()
                .trigger(
                    TriggerConfig::new("section", "top bottom", "bottom top")
                        .unwrap()
                        .scrub(ScrubMode::Immediate),
                )
                .add(
                    linear_to("a", 1.0, 1.0).repeat(scrubline_core::RepeatCount::Infinite, true),
                    Position::At(0.0),
                ),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InfiniteInScrub(_)));
    assert!(!eng.is_scroll_listening());
}

/// it should retarget a pointer binding from the current value on every move
#[test]
fn pointer_binding_supersedes_previous_tween() {
    let mut eng = engine();
    let binding = PointerBindingConfig::new("cursor", PropertyKey::X, Axis::X)
        .space(PointerSpace::Client);
    eng.bind_pointer(binding).unwrap();
    assert!(eng.is_pointer_listening());

    eng.update(0.0, pointer(400.0, 0.0));
    eng.update(0.25, Inputs::default());
    let mid = x(&eng, "cursor");
    assert!(mid > 0.0 && mid < 400.0, "mid={mid}");

    let out = eng.update(0.0, pointer(800.0, 0.0));
    assert!(out.writes.is_empty(), "retargeting does not jump");
    approx(x(&eng, "cursor"), mid, 1e-4);
    for _ in 0..4 {
        eng.update(0.25, Inputs::default());
    }
    assert_eq!(x(&eng, "cursor"), 800.0);
}

/// it should layer an additive pointer tilt over a baseline and return on leave
#[test]
fn additive_pointer_binding_resets_on_leave() {
    let mut eng = engine();
    eng.set("galaxy", PropertyKey::X, 20.0).unwrap();
    let binding = PointerBindingConfig::new("galaxy", PropertyKey::X, Axis::X)
        .factor(40.0)
        .conflict(ConflictPolicy::CoexistAdditively)
        .reset_on_leave();
    eng.bind_pointer(binding).unwrap();

    // Right edge: centered x = 1, so +40 over the baseline.
    eng.update(0.0, pointer(1000.0, 400.0));
    for _ in 0..4 {
        eng.update(0.25, Inputs::default());
    }
    assert_eq!(x(&eng, "galaxy"), 60.0);

    eng.update(
        0.0,
        Inputs {
            pointer: vec![PointerInput::Leave],
            ..Inputs::default()
        },
    );
    for _ in 0..4 {
        eng.update(0.25, Inputs::default());
    }
    approx(x(&eng, "galaxy"), 20.0, 1e-4);
}

/// it should refuse pointer bindings on non-numeric properties
#[test]
fn pointer_binding_requires_float_property() {
    let mut eng = engine();
    let err = eng
        .bind_pointer(PointerBindingConfig::new("img", PropertyKey::Filter, Axis::X))
        .unwrap_err();
    assert!(matches!(err, EngineError::Value { .. }));
    assert!(!eng.is_pointer_listening());
}
