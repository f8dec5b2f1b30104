use std::ptr;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Single-slot registry of the capture instance that global commands
/// (hardware zoom buttons) should reach.
///
/// Holds the instance weakly: a registered controller that is dropped
/// without disposing simply stops resolving. The last `set_active` wins, and
/// only the registered instance can clear the slot.
pub struct ActiveInstanceRegistry<T> {
    slot: Mutex<Option<Weak<T>>>,
}

impl<T> ActiveInstanceRegistry<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Make `instance` the active one, replacing any previous entry.
    pub fn set_active(&self, instance: &Arc<T>) {
        *self.slot.lock() = Some(Arc::downgrade(instance));
    }

    /// Clear the slot if and only if it holds `instance`.
    pub fn clear_if_mine(&self, instance: &T) -> bool {
        let mut slot = self.slot.lock();
        let mine = slot
            .as_ref()
            .is_some_and(|weak| ptr::eq(weak.as_ptr(), instance));
        if mine {
            *slot = None;
        }
        mine
    }

    /// The active instance, if one is registered and still alive.
    pub fn current(&self) -> Option<Arc<T>> {
        self.slot.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_active(&self, instance: &T) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|weak| ptr::eq(weak.as_ptr(), instance))
    }
}

impl<T> Default for ActiveInstanceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
