//! Scalar atom.

use std::fmt;

use crate::atoms::Value;
use crate::reactive::{Derivation, Subscription, ValueBox};

/// An atom holding a single [`Value`].
///
/// Pointers that land on a box atom see through it: they resolve to the
/// boxed value and follow later `set` calls.
#[derive(Clone)]
pub struct BoxAtom {
    cell: ValueBox<Value>,
}

impl BoxAtom {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            cell: ValueBox::new(value.into()),
        }
    }

    /// Current value. Never tracked.
    pub fn get(&self) -> Value {
        self.cell.get()
    }

    /// Replace the value. Setting an equal value does nothing.
    pub fn set(&self, value: impl Into<Value>) {
        tracing::trace!("box atom set");
        self.cell.set(value.into());
    }

    /// The atom as a tracked derivation.
    pub fn derivation(&self) -> Derivation<Value> {
        self.cell.derivation()
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Value) + 'static,
    {
        self.cell.on_change(listener)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.cell.ptr_eq(&other.cell)
    }
}

impl fmt::Debug for BoxAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxAtom").field(&self.cell.get()).finish()
    }
}
