//! Scopes group every registration made while mounting one section, so the whole
//! group can be torn down with a single call.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{ScopeId, SubscriptionId, TimelineId, TriggerId, TweenId};

/// One thing a scope owns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    Tween(TweenId),
    Timeline(TimelineId),
    Trigger(TriggerId),
    Subscription(SubscriptionId),
}

/// Counts of what a disposal removed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposeReport {
    pub tweens: usize,
    pub timelines: usize,
    pub triggers: usize,
    pub subscriptions: usize,
    pub pins: usize,
    /// The scope was unknown or already disposed; nothing was done.
    pub already_disposed: bool,
}

#[derive(Debug, Default)]
struct Scope {
    label: Option<String>,
    registrations: Vec<Registration>,
}

#[derive(Debug, Default)]
pub struct ScopeRegistry {
    scopes: IndexMap<ScopeId, Scope>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, id: ScopeId, label: Option<String>) {
        self.scopes.insert(
            id,
            Scope {
                label,
                registrations: Vec::new(),
            },
        );
    }

    /// Record a registration. Unknown scopes are ignored.
    pub fn record(&mut self, id: ScopeId, registration: Registration) {
        if let Some(scope) = self.scopes.get_mut(&id) {
            scope.registrations.push(registration);
        }
    }

    /// Detach a scope and hand back its registrations, newest first.
    pub fn close(&mut self, id: ScopeId) -> Option<Vec<Registration>> {
        let mut scope = self.scopes.shift_remove(&id)?;
        scope.registrations.reverse();
        Some(scope.registrations)
    }

    pub fn contains(&self, id: ScopeId) -> bool {
        self.scopes.contains_key(&id)
    }

    pub fn label(&self, id: ScopeId) -> Option<&str> {
        self.scopes.get(&id)?.label.as_deref()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_one_shot() {
        let mut reg = ScopeRegistry::new();
        reg.open(ScopeId(0), Some("hero".into()));
        reg.record(ScopeId(0), Registration::Tween(TweenId(1)));
        reg.record(ScopeId(0), Registration::Trigger(TriggerId(2)));
        reg.record(ScopeId(9), Registration::Tween(TweenId(3)));
        assert_eq!(reg.label(ScopeId(0)), Some("hero"));

        let regs = reg.close(ScopeId(0)).unwrap();
        assert_eq!(
            regs,
            vec![
                Registration::Trigger(TriggerId(2)),
                Registration::Tween(TweenId(1))
            ]
        );
        assert!(reg.close(ScopeId(0)).is_none());
        assert!(reg.is_empty());
    }
}
