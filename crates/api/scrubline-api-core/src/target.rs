//! Opaque handle to a host-owned renderable element.
//!
//! The engine never creates or destroys targets; it only addresses them by this
//! small string key and asks the host for geometry or writes values to them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetHandle(String);

impl TargetHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TargetHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
