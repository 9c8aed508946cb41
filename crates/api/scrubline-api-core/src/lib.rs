//! scrubline-api-core: shared value, property and write-op vocabulary (engine-agnostic).
//!
//! The motion engine and its host adapters only agree on the types in this crate:
//! which element is addressed ([`TargetHandle`]), which property on it
//! ([`PropertyKey`]), what is written ([`Value`]) and how a frame's writes are
//! batched ([`WriteBatch`]).

pub mod blend;
pub mod filter;
pub mod json;
pub mod property;
pub mod target;
pub mod value;
pub mod write_ops;

pub use filter::{FilterFn, FilterValue};
pub use property::{MotionChannel, PropertyKey};
pub use target::TargetHandle;
pub use value::{Value, ValueError, ValueKind};
pub use write_ops::{WriteBatch, WriteOp};
