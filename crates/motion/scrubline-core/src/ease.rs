//! Easing curves.
//!
//! Eases are written the way hosts already spell them: `power3.out`, `sine.inOut`,
//! `back.out(1.7)`, `elastic.out(1, 0.4)`, `steps(5)`, `cubic-bezier(.2,.8,.2,1)`
//! or `none`. A family without a direction defaults to `out`.
//!
//! Every curve maps 0 to exactly 0 and 1 to exactly 1, so tween endpoints stay
//! exact regardless of the curve's arithmetic.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EaseDir {
    In,
    Out,
    InOut,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Ease {
    Linear,
    /// `power1`..`power4`; the exponent is `degree + 1`.
    Power { degree: u8, dir: EaseDir },
    Sine(EaseDir),
    Expo(EaseDir),
    Circ(EaseDir),
    Back { dir: EaseDir, overshoot: f32 },
    Elastic { dir: EaseDir, amplitude: f32, period: f32 },
    Bounce(EaseDir),
    Steps(u32),
    CubicBezier([f32; 4]),
}

impl Default for Ease {
    fn default() -> Self {
        Ease::Power {
            degree: 1,
            dir: EaseDir::Out,
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;
    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984375
    }
}

fn elastic_out(t: f32, amplitude: f32, period: f32) -> f32 {
    let a = amplitude.max(1.0);
    let p = if period > 0.0 { period } else { 0.3 };
    let s = p / (2.0 * PI) * (1.0 / a).asin();
    a * 2f32.powf(-10.0 * t) * ((t - s) * (2.0 * PI) / p).sin() + 1.0
}

#[inline]
fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Invert the x curve by bisection, then evaluate y.
fn bezier_ease_t(t: f32, [x1, y1, x2, y2]: [f32; 4]) -> f32 {
    if x1 == 0.0 && y1 == 0.0 && x2 == 1.0 && y2 == 1.0 {
        return t;
    }
    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut mid = t;
    for _ in 0..24 {
        let x = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

impl Ease {
    /// The `in` form of a directional family, evaluated on the open interval.
    fn ease_in(&self, t: f32) -> f32 {
        match *self {
            Ease::Power { degree, .. } => t.powi(i32::from(degree) + 1),
            Ease::Sine(_) => 1.0 - (t * PI / 2.0).cos(),
            Ease::Expo(_) => 2f32.powf(10.0 * (t - 1.0)),
            Ease::Circ(_) => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
            Ease::Back { overshoot, .. } => t * t * ((overshoot + 1.0) * t - overshoot),
            Ease::Elastic {
                amplitude, period, ..
            } => 1.0 - elastic_out(1.0 - t, amplitude, period),
            Ease::Bounce(_) => 1.0 - bounce_out(1.0 - t),
            _ => t,
        }
    }

    fn dir(&self) -> Option<EaseDir> {
        match *self {
            Ease::Power { dir, .. }
            | Ease::Sine(dir)
            | Ease::Expo(dir)
            | Ease::Circ(dir)
            | Ease::Back { dir, .. }
            | Ease::Elastic { dir, .. }
            | Ease::Bounce(dir) => Some(dir),
            _ => None,
        }
    }

    /// Map linear progress to eased progress. Input is clamped to [0, 1]; the
    /// output may overshoot for `back` and `elastic`.
    pub fn apply(&self, t: f32) -> f32 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match (*self, self.dir()) {
            (Ease::Linear, _) => t,
            (Ease::Steps(n), _) => {
                let n = n.max(1) as f32;
                (t * n).floor() / n
            }
            (Ease::CubicBezier(ctrl), _) => bezier_ease_t(t, ctrl),
            (_, Some(EaseDir::In)) => self.ease_in(t),
            (_, Some(EaseDir::Out)) => 1.0 - self.ease_in(1.0 - t),
            (_, Some(EaseDir::InOut)) => {
                if t < 0.5 {
                    self.ease_in(2.0 * t) / 2.0
                } else {
                    1.0 - self.ease_in(2.0 * (1.0 - t)) / 2.0
                }
            }
            (_, None) => t,
        }
    }
}

fn parse_args(raw: &str, src: &str) -> Result<Vec<f32>, EngineError> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| {
            a.parse::<f32>()
                .map_err(|_| EngineError::InvalidEase(src.to_string()))
        })
        .collect()
}

impl FromStr for Ease {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let src = s.trim();
        let bad = || EngineError::InvalidEase(src.to_string());
        let (head, args) = match src.find('(') {
            Some(open) => {
                let inner = src[open + 1..].strip_suffix(')').ok_or_else(bad)?;
                (&src[..open], parse_args(inner, src)?)
            }
            None => (src, Vec::new()),
        };
        if head == "steps" {
            let n = args.first().copied().ok_or_else(bad)?;
            if n < 1.0 || n.fract() != 0.0 {
                return Err(bad());
            }
            return Ok(Ease::Steps(n as u32));
        }
        if head == "cubic-bezier" {
            if args.len() != 4 {
                return Err(bad());
            }
            return Ok(Ease::CubicBezier([args[0], args[1], args[2], args[3]]));
        }

        let (family, dir) = match head.split_once('.') {
            Some((family, dir)) => {
                let dir = match dir {
                    "in" => EaseDir::In,
                    "out" => EaseDir::Out,
                    "inOut" => EaseDir::InOut,
                    _ => return Err(bad()),
                };
                (family, dir)
            }
            None => (head, EaseDir::Out),
        };
        let power = |degree| Ok(Ease::Power { degree, dir });
        match family {
            "none" | "linear" | "power0" => Ok(Ease::Linear),
            "power1" | "quad" => power(1),
            "power2" | "cubic" => power(2),
            "power3" | "quart" => power(3),
            "power4" | "quint" | "strong" => power(4),
            "sine" => Ok(Ease::Sine(dir)),
            "expo" => Ok(Ease::Expo(dir)),
            "circ" => Ok(Ease::Circ(dir)),
            "bounce" => Ok(Ease::Bounce(dir)),
            "back" => Ok(Ease::Back {
                dir,
                overshoot: args.first().copied().unwrap_or(1.70158),
            }),
            "elastic" => Ok(Ease::Elastic {
                dir,
                amplitude: args.first().copied().unwrap_or(1.0),
                period: args.get(1).copied().unwrap_or(0.3),
            }),
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for EaseDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EaseDir::In => "in",
            EaseDir::Out => "out",
            EaseDir::InOut => "inOut",
        })
    }
}

impl fmt::Display for Ease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ease::Linear => f.write_str("none"),
            Ease::Power { degree, dir } => write!(f, "power{degree}.{dir}"),
            Ease::Sine(dir) => write!(f, "sine.{dir}"),
            Ease::Expo(dir) => write!(f, "expo.{dir}"),
            Ease::Circ(dir) => write!(f, "circ.{dir}"),
            Ease::Bounce(dir) => write!(f, "bounce.{dir}"),
            Ease::Back { dir, overshoot } => write!(f, "back.{dir}({overshoot})"),
            Ease::Elastic {
                dir,
                amplitude,
                period,
            } => write!(f, "elastic.{dir}({amplitude},{period})"),
            Ease::Steps(n) => write!(f, "steps({n})"),
            Ease::CubicBezier([a, b, c, d]) => write!(f, "cubic-bezier({a},{b},{c},{d})"),
        }
    }
}

impl Serialize for Ease {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ease {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    const ALL: &[&str] = &[
        "none",
        "power1.out",
        "power3.out",
        "power2.inOut",
        "sine.inOut",
        "expo.in",
        "circ.out",
        "back.out(1.7)",
        "elastic.out(1,0.4)",
        "bounce.out",
        "steps(4)",
        "cubic-bezier(0.2,0.8,0.2,1)",
    ];

    #[test]
    fn every_curve_hits_exact_endpoints() {
        for name in ALL {
            let ease: Ease = name.parse().unwrap();
            assert_eq!(ease.apply(0.0), 0.0, "{name} at 0");
            assert_eq!(ease.apply(1.0), 1.0, "{name} at 1");
            assert_eq!(ease.apply(-0.5), 0.0, "{name} below 0");
            assert_eq!(ease.apply(1.5), 1.0, "{name} above 1");
        }
    }

    #[test]
    fn power3_out_matches_closed_form() {
        let ease: Ease = "power3.out".parse().unwrap();
        let t = 0.25f32;
        assert!(approx(ease.apply(t), 1.0 - (1.0 - t).powi(4), 1e-6));
    }

    #[test]
    fn in_out_is_symmetric() {
        let ease: Ease = "sine.inOut".parse().unwrap();
        assert!(approx(ease.apply(0.5), 0.5, 1e-6));
        assert!(approx(ease.apply(0.2) + ease.apply(0.8), 1.0, 1e-5));
    }

    #[test]
    fn back_overshoots() {
        let ease: Ease = "back.out(1.7)".parse().unwrap();
        let peak = (1..100).map(|i| ease.apply(i as f32 / 100.0)).fold(0.0, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn family_without_direction_defaults_to_out() {
        assert_eq!(
            "power2".parse::<Ease>().unwrap(),
            Ease::Power {
                degree: 2,
                dir: EaseDir::Out
            }
        );
    }

    #[test]
    fn steps_quantize() {
        let ease = Ease::Steps(4);
        assert_eq!(ease.apply(0.3), 0.25);
        assert_eq!(ease.apply(0.99), 0.75);
    }

    #[test]
    fn display_roundtrips() {
        for name in ALL {
            let ease: Ease = name.parse().unwrap();
            let again: Ease = ease.to_string().parse().unwrap();
            assert_eq!(ease, again);
        }
    }

    #[test]
    fn rejects_unknown() {
        assert!("wobble.out".parse::<Ease>().is_err());
        assert!("power2.sideways".parse::<Ease>().is_err());
        assert!("steps(0)".parse::<Ease>().is_err());
        assert!("cubic-bezier(1,2)".parse::<Ease>().is_err());
    }
}
