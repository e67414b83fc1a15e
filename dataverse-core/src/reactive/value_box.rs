//! Box Implementation
//!
//! A [`ValueBox`] is a mutable cell holding a single value. It is the
//! simplest entry point for changes into the derivation graph.
//!
//! # How Boxes Work
//!
//! 1. [`get`](ValueBox::get) returns the current value and never records a
//!    dependency, even inside a derivation's computation.
//!
//! 2. [`set`](ValueBox::set) stores a new value and emits it to listeners.
//!    Setting a value equal to the current one is a no-op.
//!
//! 3. [`derivation`](ValueBox::derivation) exposes the box as a source
//!    derivation. Reads through it are tracked. While something depends on
//!    it, the derivation listens to the box and caches; otherwise it reads
//!    the box directly.
//!
//! Equality is `PartialEq`. Atom handles inside [`Value`](crate::Value)
//! compare by identity, so boxing atoms keeps reference semantics.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::derivation::Derivation;
use super::emitter::{Emitter, Subscription};

struct BoxCell<V> {
    value: RefCell<V>,
    emitter: Emitter<V>,
}

/// A mutable single-value cell.
///
/// # Example
///
/// ```rust
/// use dataverse_core::ValueBox;
///
/// let count = ValueBox::new(1);
/// let doubled = count.derivation().map(|v| v * 2);
/// assert_eq!(doubled.get_value(), 2);
///
/// count.set(5);
/// assert_eq!(doubled.get_value(), 10);
/// ```
pub struct ValueBox<V> {
    cell: Rc<BoxCell<V>>,
    derivation: Derivation<V>,
}

impl<V> ValueBox<V>
where
    V: Clone + PartialEq + 'static,
{
    /// Create a new box with the given initial value.
    pub fn new(value: V) -> Self {
        let cell = Rc::new(BoxCell {
            value: RefCell::new(value),
            emitter: Emitter::new(),
        });

        let subscribe_cell = Rc::clone(&cell);
        let get_cell = Rc::clone(&cell);
        let derivation = Derivation::source(
            move |invalidator| {
                subscribe_cell
                    .emitter
                    .tap(move |_| invalidator.invalidate())
            },
            move || get_cell.value.borrow().clone(),
        );

        Self { cell, derivation }
    }

    /// Get the current value. Never tracked.
    pub fn get(&self) -> V {
        self.cell.value.borrow().clone()
    }

    /// Set a new value and notify listeners.
    ///
    /// Does nothing if `value` equals the current value.
    pub fn set(&self, value: V) {
        {
            let mut current = self.cell.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value.clone();
        }
        self.cell.emitter.emit(&value);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&V) -> V,
    {
        let next = {
            let current = self.cell.value.borrow();
            f(&current)
        };
        self.set(next);
    }

    /// The box as a tracked derivation.
    pub fn derivation(&self) -> Derivation<V> {
        self.derivation.clone()
    }

    /// Listen to every value stored by [`set`](ValueBox::set).
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&V) + 'static,
    {
        self.cell.emitter.tap(listener)
    }

    /// Number of listeners on the box itself, including a hot derivation.
    pub fn listener_count(&self) -> usize {
        self.cell.emitter.listener_count()
    }

    /// Whether two handles refer to the same box.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<V> Clone for ValueBox<V> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            derivation: self.derivation.clone(),
        }
    }
}

impl<V> Debug for ValueBox<V>
where
    V: Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBox")
            .field("value", &*self.cell.value.borrow())
            .field("listener_count", &self.cell.emitter.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
