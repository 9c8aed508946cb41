//! Identifiers and simple allocators for engine entities.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TweenId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u32);

/// Monotonic allocator for every engine id kind.
/// Ids are never reused, so a stale id can only ever miss.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_tween: u32,
    next_timeline: u32,
    next_trigger: u32,
    next_subscription: u32,
    next_scope: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_tween(&mut self) -> TweenId {
        let id = TweenId(self.next_tween);
        self.next_tween = self.next_tween.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_timeline(&mut self) -> TimelineId {
        let id = TimelineId(self.next_timeline);
        self.next_timeline = self.next_timeline.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_trigger(&mut self) -> TriggerId {
        let id = TriggerId(self.next_trigger);
        self.next_trigger = self.next_trigger.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription = self.next_subscription.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope = self.next_scope.wrapping_add(1);
        id
    }
}
