use scrubline_core::{
    ease::Ease,
    engine::Engine,
    error::EngineError,
    geometry::{LayoutBox, StaticLayout, Viewport},
    inputs::Inputs,
    outputs::{CoreEvent, Outputs},
    pin::PinState,
    timeline::{Position, TimelineConfig},
    trigger::{ScrubMode, TriggerConfig},
    tween::TweenConfig,
    PropertyKey,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// Viewport 1000x800 with a section whose top sits at 1000px.
fn layout() -> StaticLayout {
    StaticLayout::new(Viewport::new(1000.0, 800.0))
        .with_box("section", LayoutBox::new(1000.0, 0.0, 1000.0, 800.0))
}

fn scroll(offset: f32) -> Inputs {
    Inputs {
        scroll: Some(offset),
        ..Inputs::default()
    }
}

fn write(out: &Outputs, target: &str, property: PropertyKey) -> Option<f32> {
    out.writes
        .find(target, &property)
        .and_then(|w| w.value.as_float())
}

fn linear(target: &str, to: f32) -> TweenConfig {
    TweenConfig::to(target, PropertyKey::X, to)
        .duration(1.0)
        .ease(Ease::Linear)
}

/// Three back-to-back tweens scrubbed across "top top" .. "bottom top" (1000..1800).
fn three_step(eng: &mut Engine) {
    let trigger = TriggerConfig::new("section", "top top", "bottom top")
        .unwrap()
        .scrub(ScrubMode::Immediate);
    eng.timeline(
        TimelineConfig::new()
            .trigger(trigger)
            .add(linear("a", 100.0), Position::At(0.0))
            .add(linear("b", 200.0), Position::default())
            .add(linear("c", 300.0), Position::default()),
    )
    .unwrap();
}

/// it should place a three-tween scrub at half progress halfway through the middle tween
#[test]
fn scrub_midpoint_splits_sequence() {
    let mut eng = Engine::with_layout(layout());
    three_step(&mut eng);
    let out = eng.update(0.016, scroll(1400.0));
    approx(write(out, "a", PropertyKey::X).unwrap(), 100.0, 1e-4);
    approx(write(out, "b", PropertyKey::X).unwrap(), 100.0, 1e-4);
    assert_eq!(write(out, "c", PropertyKey::X), Some(0.0));
}

/// it should hit the exact start and end values at progress 0 and 1
#[test]
fn scrub_boundaries_are_exact() {
    let mut eng = Engine::with_layout(layout());
    three_step(&mut eng);

    let _ = eng.update(0.016, scroll(1700.0));
    let out = eng.update(0.016, scroll(1800.0));
    assert_eq!(write(out, "c", PropertyKey::X), Some(300.0));

    let _ = eng.update(0.016, scroll(1100.0));
    let out = eng.update(0.016, scroll(1000.0));
    assert_eq!(write(out, "a", PropertyKey::X), Some(0.0));

    // Overscroll clamps; nothing changes so nothing is written.
    let _ = eng.update(0.016, scroll(1800.0));
    let out = eng.update(0.016, scroll(9000.0));
    assert!(out.writes.is_empty());
    assert_eq!(eng.value("c", PropertyKey::X).as_float(), Some(300.0));
}

/// it should ease a smoothed scrub toward its target instead of jumping
#[test]
fn smoothed_scrub_lags_behind_scroll() {
    let mut eng = Engine::with_layout(layout());
    let trigger = TriggerConfig::new("section", "top top", "bottom top")
        .unwrap()
        .scrub(ScrubMode::Smoothed(1.0));
    eng.timeline(TimelineConfig::new().trigger(trigger).add(linear("a", 100.0), Position::At(0.0)))
        .unwrap();
    let out = eng.update(0.1, scroll(1800.0));
    let first = write(out, "a", PropertyKey::X).unwrap();
    assert!(first > 0.0 && first < 100.0, "first={first}");
    for _ in 0..200 {
        eng.update(0.1, Inputs::default());
    }
    assert_eq!(eng.value("a", PropertyKey::X).as_float(), Some(100.0));
}

/// it should keep a pinned anchor's screen position continuous across pin boundaries
#[test]
fn pin_is_continuous_at_boundaries() {
    let mut eng = Engine::with_layout(layout());
    let trigger = TriggerConfig::new("section", "top top", "+=600%")
        .unwrap()
        .pinned()
        .scrub(ScrubMode::Immediate);
    let tl = eng
        .timeline(
            TimelineConfig::new()
                .trigger(trigger)
                .add(linear("card", 50.0), Position::At(0.0)),
        )
        .unwrap();
    let trig = eng.get_timeline(tl).unwrap().trigger().unwrap();
    let range = eng.trigger_range(trig).unwrap();
    approx(range.start, 1000.0, 1e-4);
    approx(range.end, 5800.0, 1e-4);

    let mut frames = Vec::new();
    for offset in [999.0, 1000.0, 1001.0, 3000.0, 5799.0, 5800.0, 5801.0] {
        let out = eng.update(0.016, scroll(offset));
        let pin = out.pins.iter().find(|p| p.trigger == trig).cloned().unwrap();
        frames.push(pin);
    }
    assert_eq!(frames[0].state, PinState::Before);
    assert_eq!(frames[1].state, PinState::Pinned);
    assert_eq!(frames[5].state, PinState::Pinned);
    assert_eq!(frames[6].state, PinState::After);
    approx(frames[0].screen_top, 1.0, 1e-3);
    approx(frames[1].screen_top, 0.0, 1e-3);
    approx(frames[3].screen_top, 0.0, 1e-3);
    approx(frames[5].screen_top, 0.0, 1e-3);
    approx(frames[6].screen_top, -1.0, 1e-3);
    approx(frames[6].spacer, 4800.0, 1e-3);
}

/// it should defer a trigger on a zero-size anchor and activate it once layout arrives
#[test]
fn zero_size_anchor_defers_then_activates() {
    let source = layout().with_box("late", LayoutBox::new(2000.0, 0.0, 1000.0, 0.0));
    let mut eng = Engine::with_layout(source.clone());
    let trigger = TriggerConfig::new("late", "top bottom", "bottom top")
        .unwrap()
        .scrub(ScrubMode::Immediate);
    let tl = eng
        .timeline(
            TimelineConfig::new()
                .trigger(trigger)
                .add(linear("late-dot", 10.0), Position::At(0.0)),
        )
        .expect("missing geometry is not a configuration error");
    let trig = eng.get_timeline(tl).unwrap().trigger().unwrap();
    assert!(eng.is_trigger_pending(trig));

    let out = eng.update(0.016, scroll(0.0));
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, CoreEvent::TriggerDeferred { trigger, .. } if *trigger == trig)));
    assert!(!out.events.iter().any(|e| matches!(e, CoreEvent::Error { .. })));

    source.set_box("late", LayoutBox::new(2000.0, 0.0, 1000.0, 600.0));
    let out = eng.update(0.016, scroll(1500.0));
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, CoreEvent::TriggerActivated { trigger, .. } if *trigger == trig)));
    assert!(!eng.is_trigger_pending(trig));
    let range = eng.trigger_range(trig).unwrap();
    approx(range.start, 1200.0, 1e-4);
    approx(range.end, 2600.0, 1e-4);
}

/// it should reject an end threshold that resolves before the start, with no side effects
#[test]
fn end_before_start_is_a_config_error() {
    let mut eng = Engine::with_layout(layout());
    let trigger = TriggerConfig::new("section", "bottom top", "top top")
        .unwrap()
        .scrub(ScrubMode::Immediate);
    let err = eng
        .timeline(TimelineConfig::new().trigger(trigger).add(linear("a", 100.0), Position::At(0.0)))
        .unwrap_err();
    assert!(err.is_configuration());
    match err {
        EngineError::EndBeforeStart { start, end, .. } => {
            approx(start, 1800.0, 1e-4);
            approx(end, 1000.0, 1e-4);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!eng.is_scroll_listening());
    let out = eng.update(0.016, scroll(1400.0));
    assert!(out.writes.is_empty());
}

/// it should play a clock timeline on enter and reverse it on leave back
#[test]
fn toggle_actions_drive_clock_timeline() {
    let mut eng = Engine::with_layout(layout());
    let trigger = TriggerConfig::new("section", "top 70%", "bottom top")
        .unwrap()
        .toggle_actions("play none none reverse".parse().unwrap());
    let tl = eng
        .timeline(
            TimelineConfig::new()
                .trigger(trigger)
                .add(linear("reveal", 1.0), Position::At(0.0)),
        )
        .unwrap();
    eng.update(0.5, scroll(0.0));
    assert!(!eng.get_timeline(tl).unwrap().is_playing());

    // top 70% = 1000 - 560
    let out = eng.update(0.016, scroll(500.0));
    assert!(out.events.iter().any(|e| matches!(e, CoreEvent::TriggerToggled { .. })));
    assert!(eng.get_timeline(tl).unwrap().is_playing());
    let mut completed = false;
    for _ in 0..80 {
        let out = eng.update(0.016, Inputs::default());
        completed |= out
            .events
            .iter()
            .any(|e| matches!(e, CoreEvent::TimelineCompleted { timeline } if *timeline == tl));
    }
    assert!(completed);
    assert_eq!(eng.value("reveal", PropertyKey::X).as_float(), Some(1.0));

    eng.update(0.016, scroll(0.0));
    assert!(eng.get_timeline(tl).unwrap().is_reversed());
    for _ in 0..80 {
        eng.update(0.016, Inputs::default());
    }
    assert_eq!(eng.value("reveal", PropertyKey::X).as_float(), Some(0.0));
}
