//! Emitter
//!
//! A minimal synchronous publish/subscribe primitive. Boxes, atoms and
//! derivations use it to announce changes.
//!
//! # Semantics
//!
//! - Listeners run synchronously inside [`Emitter::emit`], in subscription
//!   order.
//! - `emit` iterates over a snapshot: a listener added during an emit is not
//!   invoked for that emit.
//! - A listener removed during an emit is skipped if its turn has not come
//!   yet.
//! - A panicking listener unwinds through `emit` to its caller.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::id::ListenerId;

type Listener<V> = Rc<dyn Fn(&V)>;

struct Entry<V> {
    id: ListenerId,
    active: Rc<Cell<bool>>,
    listener: Listener<V>,
}

impl<V> Clone for Entry<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Rc::clone(&self.active),
            listener: Rc::clone(&self.listener),
        }
    }
}

/// A typed, single-threaded event emitter.
pub struct Emitter<V> {
    listeners: Rc<RefCell<Vec<Entry<V>>>>,
}

impl<V: 'static> Emitter<V> {
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register a listener.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn tap<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&V) + 'static,
    {
        let id = ListenerId::new();
        let active = Rc::new(Cell::new(true));
        self.listeners.borrow_mut().push(Entry {
            id,
            active: Rc::clone(&active),
            listener: Rc::new(listener),
        });

        let listeners: Weak<RefCell<Vec<Entry<V>>>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            active.set(false);
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|entry| entry.id != id);
            }
        })
    }

    /// Invoke every registered listener with `value`.
    pub fn emit(&self, value: &V) {
        let snapshot: Vec<Entry<V>> = self.listeners.borrow().clone();
        for entry in snapshot {
            if entry.active.get() {
                (entry.listener)(value);
            }
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.borrow().is_empty()
    }
}

impl<V: 'static> Default for Emitter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Emitter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listener_count", &self.listeners.borrow().len())
            .finish()
    }
}

/// Disposer returned by [`Emitter::tap`] and the `on_change` methods.
///
/// Dropping the subscription removes the listener. Calling
/// [`unsubscribe`](Subscription::unsubscribe) more than once is a no-op.
#[must_use = "dropping a Subscription immediately removes its listener"]
pub struct Subscription {
    dispose: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    pub(crate) fn new<F>(dispose: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            dispose: RefCell::new(Some(Box::new(dispose))),
        }
    }

    /// Remove the listener now.
    pub fn unsubscribe(&self) {
        let dispose = self.dispose.borrow_mut().take();
        if let Some(dispose) = dispose {
            dispose();
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.dispose.borrow().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
