//! Indexed atom.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::atoms::Value;
use crate::error::{DataverseError, Result};
use crate::pointer::Pointer;
use crate::reactive::{Derivation, Emitter, Subscription, WeakDerivation};

/// One splice applied to an [`ArrayAtom`]: `deleted` items removed at
/// `start` and `added` items inserted in their place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayChange {
    pub start: usize,
    pub deleted: usize,
    pub added: usize,
}

impl ArrayChange {
    /// Whether the item at `index` may differ after this change.
    ///
    /// Slots before `start` are untouched. When the length changes every
    /// later slot shifts, otherwise only the replaced range differs.
    pub fn affects_index(&self, index: usize) -> bool {
        if index < self.start {
            return false;
        }
        self.changes_length() || index < self.start + self.deleted
    }

    pub fn changes_length(&self) -> bool {
        self.deleted != self.added
    }
}

struct ArrayInner {
    items: RefCell<Vec<Value>>,
    changes: Emitter<ArrayChange>,
    indices: RefCell<HashMap<usize, WeakDerivation<Value>>>,
    length: RefCell<Option<WeakDerivation<usize>>>,
}

/// A mutable list of values.
#[derive(Clone)]
pub struct ArrayAtom {
    inner: Rc<ArrayInner>,
}

impl ArrayAtom {
    pub fn new<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(items.into_iter().map(Into::into).collect()),
                changes: Emitter::new(),
                indices: RefCell::new(HashMap::new()),
                length: RefCell::new(None),
            }),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty::<Value>())
    }

    /// Item at `index`, or [`Value::NotFound`] past the end. Never tracked.
    pub fn get_index(&self, index: usize) -> Value {
        self.inner
            .items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Remove `delete_count` items at `start`, insert `items` in their
    /// place, and return the removed items.
    ///
    /// `start` and `delete_count` are clamped to the current length.
    pub fn splice<V, I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let (change, removed) = {
            let mut current = self.inner.items.borrow_mut();
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            let before = current.len();
            let removed: Vec<Value> = current
                .splice(start..end, items.into_iter().map(Into::into))
                .collect();
            let added = current.len() + removed.len() - before;
            (
                ArrayChange {
                    start,
                    deleted: removed.len(),
                    added,
                },
                removed,
            )
        };
        self.emit(change);
        removed
    }

    pub fn push(&self, value: impl Into<Value>) {
        let start = self.len();
        self.splice(start, 0, [value.into()]);
    }

    pub fn pop(&self) -> Option<Value> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.splice(len - 1, 1, std::iter::empty::<Value>()).pop()
    }

    /// Replace the item at `index` and return the previous item.
    ///
    /// Writing an equal value does not emit.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        let previous = {
            let mut items = self.inner.items.borrow_mut();
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(DataverseError::IndexOutOfBounds { index, len })?;
            if *slot == value {
                return Ok(value);
            }
            std::mem::replace(slot, value)
        };
        self.emit(ArrayChange {
            start: index,
            deleted: 1,
            added: 1,
        });
        Ok(previous)
    }

    fn emit(&self, change: ArrayChange) {
        if change.deleted == 0 && change.added == 0 {
            return;
        }
        debug!(
            start = change.start,
            deleted = change.deleted,
            added = change.added,
            "array atom changed"
        );
        self.inner.changes.emit(&change);
    }

    /// Tracked view of the item at `index`.
    pub fn index(&self, index: usize) -> Derivation<Value> {
        if let Some(existing) = self
            .inner
            .indices
            .borrow()
            .get(&index)
            .and_then(WeakDerivation::upgrade)
        {
            return existing;
        }

        let subscribe_inner = Rc::clone(&self.inner);
        let get_inner = Rc::clone(&self.inner);
        let derivation = Derivation::source(
            move |invalidator| {
                subscribe_inner.changes.tap(move |change: &ArrayChange| {
                    if change.affects_index(index) {
                        invalidator.invalidate();
                    }
                })
            },
            move || {
                get_inner
                    .items
                    .borrow()
                    .get(index)
                    .cloned()
                    .unwrap_or_default()
            },
        );

        let mut indices = self.inner.indices.borrow_mut();
        indices.retain(|_, weak| weak.upgrade().is_some());
        indices.insert(index, derivation.downgrade());
        derivation
    }

    /// Tracked length.
    pub fn length_derivation(&self) -> Derivation<usize> {
        if let Some(existing) = self
            .inner
            .length
            .borrow()
            .as_ref()
            .and_then(WeakDerivation::upgrade)
        {
            return existing;
        }

        let subscribe_inner = Rc::clone(&self.inner);
        let get_inner = Rc::clone(&self.inner);
        let derivation = Derivation::source(
            move |invalidator| {
                subscribe_inner.changes.tap(move |change: &ArrayChange| {
                    if change.changes_length() {
                        invalidator.invalidate();
                    }
                })
            },
            move || get_inner.items.borrow().len(),
        );
        *self.inner.length.borrow_mut() = Some(derivation.downgrade());
        derivation
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ArrayChange) + 'static,
    {
        self.inner.changes.tap(listener)
    }

    /// A pointer rooted at this array.
    pub fn pointer(&self) -> Pointer {
        Pointer::new(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ArrayAtom {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ArrayAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}
