//! PropertyKey: the fixed vocabulary of animatable properties.
//!
//! Names follow the transform shorthands hosts already use (`x`, `yPercent`,
//! `rotationX`), plus CSS custom properties (`--mask-radius`) and `filter`.
//! Each (target, property) pair is the unit of conflict tracking, so pixel
//! translation (`x`) and percentage translation (`xPercent`) are separate keys
//! and never share a baseline.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::filter::FilterValue;
use crate::value::{Value, ValueError, ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    X,
    Y,
    Z,
    XPercent,
    YPercent,
    Scale,
    ScaleX,
    ScaleY,
    Rotation,
    RotationX,
    RotationY,
    Opacity,
    Filter,
    /// Named custom numeric field, stored without the leading `--`.
    Custom(String),
}

/// Unit space a property moves in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionChannel {
    Pixel,
    Percent,
    Unitless,
    Angle,
    Composite,
}

impl PropertyKey {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            PropertyKey::Filter => ValueKind::Filter,
            _ => ValueKind::Float,
        }
    }

    pub fn channel(&self) -> MotionChannel {
        match self {
            PropertyKey::X | PropertyKey::Y | PropertyKey::Z => MotionChannel::Pixel,
            PropertyKey::XPercent | PropertyKey::YPercent => MotionChannel::Percent,
            PropertyKey::Rotation | PropertyKey::RotationX | PropertyKey::RotationY => {
                MotionChannel::Angle
            }
            PropertyKey::Filter => MotionChannel::Composite,
            PropertyKey::Scale
            | PropertyKey::ScaleX
            | PropertyKey::ScaleY
            | PropertyKey::Opacity
            | PropertyKey::Custom(_) => MotionChannel::Unitless,
        }
    }

    /// Value a property has before anything animated it.
    pub fn default_value(&self) -> Value {
        match self {
            PropertyKey::Scale | PropertyKey::ScaleX | PropertyKey::ScaleY => Value::Float(1.0),
            PropertyKey::Opacity => Value::Float(1.0),
            PropertyKey::Filter => Value::Filter(FilterValue::none()),
            _ => Value::Float(0.0),
        }
    }

    /// Check that `value` has the kind this property stores.
    pub fn accepts(&self, value: &Value) -> bool {
        self.value_kind() == value.kind()
    }

    pub fn as_str(&self) -> &str {
        match self {
            PropertyKey::X => "x",
            PropertyKey::Y => "y",
            PropertyKey::Z => "z",
            PropertyKey::XPercent => "xPercent",
            PropertyKey::YPercent => "yPercent",
            PropertyKey::Scale => "scale",
            PropertyKey::ScaleX => "scaleX",
            PropertyKey::ScaleY => "scaleY",
            PropertyKey::Rotation => "rotation",
            PropertyKey::RotationX => "rotationX",
            PropertyKey::RotationY => "rotationY",
            PropertyKey::Opacity => "opacity",
            PropertyKey::Filter => "filter",
            PropertyKey::Custom(name) => name.as_str(),
        }
    }
}

impl FromStr for PropertyKey {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "x" | "translateX" => PropertyKey::X,
            "y" | "translateY" => PropertyKey::Y,
            "z" | "translateZ" => PropertyKey::Z,
            "xPercent" => PropertyKey::XPercent,
            "yPercent" => PropertyKey::YPercent,
            "scale" => PropertyKey::Scale,
            "scaleX" => PropertyKey::ScaleX,
            "scaleY" => PropertyKey::ScaleY,
            "rotation" | "rotate" | "rotationZ" => PropertyKey::Rotation,
            "rotationX" | "rotateX" => PropertyKey::RotationX,
            "rotationY" | "rotateY" => PropertyKey::RotationY,
            "opacity" | "autoAlpha" => PropertyKey::Opacity,
            "filter" => PropertyKey::Filter,
            other => match other.strip_prefix("--") {
                Some(name) if !name.is_empty() && !name.chars().any(char::is_whitespace) => {
                    PropertyKey::Custom(name.to_string())
                }
                _ => {
                    return Err(ValueError::Parse(format!(
                        "unknown animatable property '{other}'"
                    )))
                }
            },
        };
        Ok(key)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Custom(name) => write!(f, "--{name}"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl Serialize for PropertyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PropertyKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
