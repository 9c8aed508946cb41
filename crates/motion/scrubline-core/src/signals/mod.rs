//! Input signals: scroll progress and pointer position.
//!
//! Both signals keep their own subscriber lists. Dispatch always walks a
//! snapshot, so a callback that unsubscribes itself (or another entry) mid-dispatch
//! never corrupts the iteration, and a removed entry is skipped even if it was
//! still in the snapshot.

pub mod pointer;
pub mod scroll;

use std::cell::RefCell;
use std::rc::Rc;

use crate::ids::SubscriptionId;

pub use pointer::{
    Axis, PointerBindingConfig, PointerFrame, PointerSample, PointerSignal, PointerSpace,
};
pub use scroll::{
    ProgressUpdate, ScrollDirection, ScrollPass, ScrollSignal, TriggerFrame, TriggerStatus,
};

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Entry<K, T: 'static> {
    id: SubscriptionId,
    key: K,
    callback: Callback<T>,
}

/// Shared, keyed subscriber list. Clones refer to the same list.
pub struct Listeners<K, T: 'static> {
    entries: Rc<RefCell<Vec<Entry<K, T>>>>,
}

impl<K, T: 'static> Clone for Listeners<K, T> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<K, T: 'static> Default for Listeners<K, T> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<K, T: 'static> std::fmt::Debug for Listeners<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

impl<K: Clone + PartialEq, T: 'static> Listeners<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, id: SubscriptionId, key: K, callback: impl FnMut(&T) + 'static) {
        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        self.entries.borrow_mut().push(Entry { id, key, callback });
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Remove every entry registered under `key`.
    pub fn remove_key(&self, key: &K) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| &e.key != key);
        before - entries.len()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.borrow().iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Call every live entry registered under `key`. Returns how many ran.
    pub fn emit(&self, key: &K, value: &T) -> usize {
        let snapshot: Vec<(SubscriptionId, Callback<T>)> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| &e.key == key)
            .map(|e| (e.id, Rc::clone(&e.callback)))
            .collect();
        let mut called = 0;
        for (id, callback) in snapshot {
            if !self.contains(id) {
                continue;
            }
            // A callback re-entering its own signal is skipped rather than aliased.
            if let Ok(mut f) = callback.try_borrow_mut() {
                (*f)(value);
                called += 1;
            }
        }
        called
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn self_removal_during_dispatch_is_safe() {
        let list: Listeners<(), u32> = Listeners::new();
        let hits = Rc::new(Cell::new(0));

        let handle = list.clone();
        let h = Rc::clone(&hits);
        list.add(SubscriptionId(0), (), move |_| {
            h.set(h.get() + 1);
            handle.remove(SubscriptionId(0));
            handle.remove(SubscriptionId(1));
        });
        let h = Rc::clone(&hits);
        list.add(SubscriptionId(1), (), move |_| h.set(h.get() + 100));

        assert_eq!(list.emit(&(), &7), 1);
        assert_eq!(hits.get(), 1);
        assert!(list.is_empty());
        assert_eq!(list.emit(&(), &7), 0);
    }

    #[test]
    fn emit_filters_by_key() {
        let list: Listeners<u8, f32> = Listeners::new();
        let seen = Rc::new(Cell::new(0.0));
        let s = Rc::clone(&seen);
        list.add(SubscriptionId(0), 1, move |v| s.set(*v));
        list.add(SubscriptionId(1), 2, |_| panic!("wrong key"));
        assert_eq!(list.emit(&1, &0.25), 1);
        assert_eq!(seen.get(), 0.25);
        assert_eq!(list.remove_key(&2), 1);
    }
}
