use scrubline_api_core::blend::{apply_delta, delta, lerp};
use scrubline_api_core::json::parse_value;
use scrubline_api_core::{PropertyKey, TargetHandle, Value, WriteBatch, WriteOp};
use serde_json::json;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "expected {b}, got {a}");
}

/// it should serialize writes with string property names and tagged values
#[test]
fn writebatch_serializes_to_documented_shape() {
    let mut batch = WriteBatch::new();
    batch.push(WriteOp::new(
        TargetHandle::from("hero/orb-1"),
        PropertyKey::XPercent,
        Value::Float(12.5),
    ));
    batch.push(WriteOp::new(
        TargetHandle::from("hero/bg"),
        PropertyKey::Filter,
        Value::Filter("brightness(0.4) blur(2px)".parse().unwrap()),
    ));
    batch.push(WriteOp::new(
        TargetHandle::from("about"),
        "--mask-radius".parse().unwrap(),
        Value::Float(12.0),
    ));

    let v = serde_json::to_value(&batch).unwrap();
    assert_eq!(
        v,
        json!([
            { "target": "hero/orb-1", "property": "xPercent", "value": { "type": "float", "data": 12.5 } },
            { "target": "hero/bg", "property": "filter", "value": { "type": "filter", "data": "brightness(0.4) blur(2px)" } },
            { "target": "about", "property": "--mask-radius", "value": { "type": "float", "data": 12.0 } }
        ])
    );

    let back: WriteBatch = serde_json::from_value(v).unwrap();
    assert_eq!(back, batch);
}

/// it should tween a filter out of `none` through identity amounts
#[test]
fn filter_from_none_starts_at_identity() {
    let from = parse_value(&json!("none")).unwrap();
    let to = parse_value(&json!("brightness(0.4) blur(2px)")).unwrap();

    let start = lerp(&from, &to, 0.0).unwrap();
    assert_eq!(start.to_css(), "brightness(1) blur(0px)");

    let mid = lerp(&from, &to, 0.5).unwrap();
    let Value::Filter(f) = mid else {
        panic!("expected a filter");
    };
    approx(f.get("brightness").unwrap().amount, 0.7, 1e-6);
    approx(f.get("blur").unwrap().amount, 1.0, 1e-6);
    assert_eq!(lerp(&from, &to, 1.0).unwrap(), to);
}

/// it should stack two additive contributions on a shared baseline
#[test]
fn additive_deltas_stack_on_baseline() {
    let baseline = Value::Float(10.0);
    let ambient = delta(&Value::Float(0.0), &Value::Float(5.0)).unwrap();
    let pointer = delta(&Value::Float(2.0), &Value::Float(5.0)).unwrap();
    let out = apply_delta(&apply_delta(&baseline, &ambient).unwrap(), &pointer).unwrap();
    assert_eq!(out, Value::Float(18.0));
}
