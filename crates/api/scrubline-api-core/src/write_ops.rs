//! Write operations produced by the engine each frame to describe property
//! writes onto host targets.
//!
//! WriteOp serializes to JSON as:
//!   { "target": "hero/orb-1", "property": "xPercent", "value": { "type": "float", "data": 12.5 } }
//!
//! WriteBatch is a simple Vec<WriteOp> with helpers.

use serde::{Deserialize, Serialize};

use crate::{PropertyKey, TargetHandle, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOp {
    pub target: TargetHandle,
    pub property: PropertyKey,
    pub value: Value,
}

impl WriteOp {
    pub fn new(target: TargetHandle, property: PropertyKey, value: Value) -> Self {
        Self {
            target,
            property,
            value,
        }
    }
}

/// A batch of write operations. The engine emits one WriteBatch per tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch(pub Vec<WriteOp>);

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch(Vec::new())
    }

    pub fn push(&mut self, op: WriteOp) {
        self.0.push(op);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = WriteOp>) {
        self.0.extend(other);
    }

    pub fn into_vec(self) -> Vec<WriteOp> {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Find the op written for a (target, property) pair, if any.
    pub fn find(&self, target: &str, property: &PropertyKey) -> Option<&WriteOp> {
        self.0
            .iter()
            .find(|op| op.target.as_str() == target && &op.property == property)
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
