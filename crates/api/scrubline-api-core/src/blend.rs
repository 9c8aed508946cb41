//! Interpolation and additive composition for Value types.
//! - f32 linear interpolation, exact at t == 0 and t == 1
//! - filter interpolation per function with identity fill
//! - delta / apply_delta used to stack additive contributions on a shared baseline

use crate::filter::{identity_amount, FilterValue};
use crate::value::{Value, ValueError};

/// Linear interpolation for f32 that returns the endpoints bit-for-bit.
///
/// Eased progress may overshoot (back/elastic), so only the exact endpoints are
/// special-cased; values outside [0, 1] extrapolate.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    if t == 0.0 {
        a
    } else if t == 1.0 {
        b
    } else {
        a + (b - a) * t
    }
}

fn zero(_: &str) -> f32 {
    0.0
}

fn mismatch(a: &Value, b: &Value) -> ValueError {
    ValueError::KindMismatch {
        left: a.kind(),
        right: b.kind(),
    }
}

/// Interpolate between two values of the same kind.
pub fn lerp(a: &Value, b: &Value, t: f32) -> Result<Value, ValueError> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(lerp_f32(*x, *y, t))),
        (Value::Filter(x), Value::Filter(y)) => {
            FilterValue::merge_with(x, y, identity_amount, identity_amount, |p, q| {
                lerp_f32(p, q, t)
            })
            .map(Value::Filter)
        }
        _ => Err(mismatch(a, b)),
    }
}

/// `current - from`, the contribution an additive tween has made so far.
pub fn delta(from: &Value, current: &Value) -> Result<Value, ValueError> {
    match (from, current) {
        (Value::Float(f), Value::Float(c)) => Ok(Value::Float(c - f)),
        (Value::Filter(f), Value::Filter(c)) => {
            FilterValue::merge_with(f, c, identity_amount, identity_amount, |p, q| q - p)
                .map(Value::Filter)
        }
        _ => Err(mismatch(from, current)),
    }
}

/// `base + delta`. Filter functions absent from the delta contribute nothing.
pub fn apply_delta(base: &Value, delta: &Value) -> Result<Value, ValueError> {
    match (base, delta) {
        (Value::Float(b), Value::Float(d)) => Ok(Value::Float(b + d)),
        (Value::Filter(b), Value::Filter(d)) => {
            FilterValue::merge_with(b, d, identity_amount, zero, |p, q| p + q).map(Value::Filter)
        }
        _ => Err(mismatch(base, delta)),
    }
}

/// The additive identity for a value's kind.
pub fn zero_delta(like: &Value) -> Value {
    match like {
        Value::Float(_) => Value::Float(0.0),
        Value::Filter(_) => Value::Filter(FilterValue::none()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_is_exact_at_endpoints() {
        let a = Value::Float(0.1);
        let b = Value::Float(0.7);
        assert_eq!(lerp(&a, &b, 0.0).unwrap(), a);
        assert_eq!(lerp(&a, &b, 1.0).unwrap(), b);
    }

    #[test]
    fn lerp_extrapolates_for_overshoot() {
        let v = lerp(&Value::Float(0.0), &Value::Float(10.0), 1.1).unwrap();
        assert!((v.as_float().unwrap() - 11.0).abs() < 1e-5);
    }

    #[test]
    fn filter_lerp_midpoint() {
        let a = Value::Filter("brightness(0.4) blur(2px)".parse().unwrap());
        let b = Value::Filter("brightness(1) blur(0px)".parse().unwrap());
        let Value::Filter(mid) = lerp(&a, &b, 0.5).unwrap() else {
            panic!("filter lerp must stay a filter");
        };
        assert!((mid.get("brightness").unwrap().amount - 0.7).abs() < 1e-6);
        let blur = mid.get("blur").unwrap();
        assert!((blur.amount - 1.0).abs() < 1e-6);
        assert_eq!(blur.unit, "px");
    }

    #[test]
    fn delta_roundtrips_through_apply() {
        let base = Value::Float(10.0);
        let d = delta(&Value::Float(2.0), &Value::Float(7.0)).unwrap();
        assert_eq!(apply_delta(&base, &d).unwrap(), Value::Float(15.0));
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let f = Value::Filter(FilterValue::none());
        assert!(matches!(
            lerp(&Value::Float(0.0), &f, 0.5),
            Err(ValueError::KindMismatch { .. })
        ));
    }
}
