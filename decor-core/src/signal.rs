//! Single-threaded signals with explicit subscriptions.
//!
//! A [`Signal`] delivers each emitted value synchronously to every live
//! listener, in subscription order, before `emit` returns. Subscribing yields
//! a [`Subscription`]; closing it (or dropping it) detaches the listener.
//!
//! Listeners may subscribe or unsubscribe while an emission is in progress.
//! A listener closed mid-emission is not called for the remainder of that
//! emission; a listener added mid-emission first sees the next one.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::traits::Disposable;

type Listener<T> = Rc<dyn Fn(&T)>;

struct Slots<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A synchronous, single-threaded event emitter.
pub struct Signal<T> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register `listener`; it stays attached until the returned
    /// [`Subscription`] is closed or dropped.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, Rc::new(listener)));
            id
        };
        let weak: Weak<RefCell<Slots<T>>> = Rc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = weak.upgrade() {
                slots.borrow_mut().listeners.retain(|(slot, _)| *slot != id);
            }
        })
    }

    /// Deliver `value` to every live listener.
    pub fn emit(&self, value: &T) {
        let pending: Vec<(u64, Listener<T>)> = self.slots.borrow().listeners.clone();
        for (id, listener) in pending {
            let live = self
                .slots
                .borrow()
                .listeners
                .iter()
                .any(|(slot, _)| *slot == id);
            if live {
                listener(value);
            }
        }
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.slots.borrow().listeners.len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.slots.borrow().listeners.len())
            .finish()
    }
}

/// Handle to an attached listener. Closing is idempotent; dropping closes.
#[must_use = "dropping a Subscription detaches its listener immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an arbitrary release action.
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.unsubscribe.is_none()
    }
}

impl Disposable for Subscription {
    fn close(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
