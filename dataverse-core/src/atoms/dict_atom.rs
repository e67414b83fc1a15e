//! Keyed atom.
//!
//! A [`DictAtom`] owns a string-keyed map of [`Value`]s. Every structural
//! mutation emits one [`DictChange`] describing the keys it touched, and the
//! per-key derivations handed out by [`DictAtom::prop`] only go stale when
//! their own key is touched.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::atoms::Value;
use crate::pointer::Pointer;
use crate::reactive::{Derivation, Emitter, Subscription, WeakDerivation};

type Keys = SmallVec<[String; 2]>;

/// The keys touched by one mutation of a [`DictAtom`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictChange {
    pub added: Keys,
    pub overridden: Keys,
    pub deleted: Keys,
}

impl DictChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.overridden.is_empty() && self.deleted.is_empty()
    }

    /// Whether the value under `key` may differ after this change.
    pub fn touches(&self, key: &str) -> bool {
        self.added
            .iter()
            .chain(&self.overridden)
            .chain(&self.deleted)
            .any(|touched| touched == key)
    }

    /// Whether the set of keys changed.
    pub fn changes_keys(&self) -> bool {
        !self.added.is_empty() || !self.deleted.is_empty()
    }
}

struct DictInner {
    entries: RefCell<IndexMap<String, Value>>,
    changes: Emitter<DictChange>,
    props: RefCell<HashMap<String, WeakDerivation<Value>>>,
    keys: RefCell<Option<WeakDerivation<Vec<String>>>>,
}

/// A mutable map from string keys to values.
#[derive(Clone)]
pub struct DictAtom {
    inner: Rc<DictInner>,
}

impl DictAtom {
    pub fn new() -> Self {
        Self::from_entries(std::iter::empty::<(String, Value)>())
    }

    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            inner: Rc::new(DictInner {
                entries: RefCell::new(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key.into(), value.into()))
                        .collect(),
                ),
                changes: Emitter::new(),
                props: RefCell::new(HashMap::new()),
                keys: RefCell::new(None),
            }),
        }
    }

    /// Build a dict from a JSON object, turning nested objects and arrays
    /// into atoms.
    pub fn from_json(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::from_entries(
            object
                .into_iter()
                .map(|(key, value)| (key, Value::atomify(value))),
        )
    }

    /// Value under `key`, or [`Value::NotFound`]. Never tracked.
    pub fn get_prop(&self, key: &str) -> Value {
        self.inner
            .entries
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Store `value` under `key` and return the previous value.
    ///
    /// Storing a value equal to the current one does not emit.
    pub fn set_prop(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut change = DictChange::default();
        let previous = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.get_mut(&key) {
                Some(current) if *current == value => return Some(value),
                Some(current) => {
                    change.overridden.push(key.clone());
                    Some(std::mem::replace(current, value))
                }
                None => {
                    change.added.push(key.clone());
                    entries.insert(key, value);
                    None
                }
            }
        };
        self.emit(change);
        previous
    }

    /// Remove `key` and return its value, if it was present.
    pub fn delete_prop(&self, key: &str) -> Option<Value> {
        let removed = self.inner.entries.borrow_mut().shift_remove(key);
        if removed.is_some() {
            let mut change = DictChange::default();
            change.deleted.push(key.to_owned());
            self.emit(change);
        }
        removed
    }

    /// Store several entries and emit a single change for all of them.
    pub fn assign<K, V, I>(&self, entries: I)
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut change = DictChange::default();
        {
            let mut current = self.inner.entries.borrow_mut();
            for (key, value) in entries {
                let (key, value) = (key.into(), value.into());
                match current.get_mut(&key) {
                    Some(existing) if *existing == value => {}
                    Some(existing) => {
                        *existing = value;
                        if !change.overridden.contains(&key) && !change.added.contains(&key) {
                            change.overridden.push(key);
                        }
                    }
                    None => {
                        current.insert(key.clone(), value);
                        change.added.push(key);
                    }
                }
            }
        }
        self.emit(change);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let removed: Keys = {
            let mut entries = self.inner.entries.borrow_mut();
            let keys = entries.keys().cloned().collect();
            entries.clear();
            keys
        };
        self.emit(DictChange {
            deleted: removed,
            ..DictChange::default()
        });
    }

    fn emit(&self, change: DictChange) {
        if change.is_empty() {
            return;
        }
        debug!(
            added = change.added.len(),
            overridden = change.overridden.len(),
            deleted = change.deleted.len(),
            "dict atom changed"
        );
        self.inner.changes.emit(&change);
    }

    /// Tracked view of the value under `key`.
    ///
    /// Repeated calls return the same derivation while it is alive.
    pub fn prop(&self, key: &str) -> Derivation<Value> {
        if let Some(existing) = self
            .inner
            .props
            .borrow()
            .get(key)
            .and_then(WeakDerivation::upgrade)
        {
            return existing;
        }

        let subscribe_inner = Rc::clone(&self.inner);
        let get_inner = Rc::clone(&self.inner);
        let (subscribe_key, get_key) = (key.to_owned(), key.to_owned());
        let derivation = Derivation::source(
            move |invalidator| {
                let key = subscribe_key.clone();
                subscribe_inner.changes.tap(move |change: &DictChange| {
                    if change.touches(&key) {
                        invalidator.invalidate();
                    }
                })
            },
            move || {
                get_inner
                    .entries
                    .borrow()
                    .get(&get_key)
                    .cloned()
                    .unwrap_or_default()
            },
        );

        let mut props = self.inner.props.borrow_mut();
        props.retain(|_, weak| weak.upgrade().is_some());
        props.insert(key.to_owned(), derivation.downgrade());
        derivation
    }

    /// Tracked list of keys. Goes stale only when keys are added or removed.
    pub fn keys_derivation(&self) -> Derivation<Vec<String>> {
        if let Some(existing) = self
            .inner
            .keys
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
                subscribe_inner.changes.tap(move |change: &DictChange| {
                    if change.changes_keys() {
                        invalidator.invalidate();
                    }
                })
            },
            move || get_inner.entries.borrow().keys().cloned().collect(),
        );
        *self.inner.keys.borrow_mut() = Some(derivation.downgrade());
        derivation
    }

    /// Listen to structural changes.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DictChange) + 'static,
    {
        self.inner.changes.tap(listener)
    }

    /// A pointer rooted at this dict.
    pub fn pointer(&self) -> Pointer {
        Pointer::new(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for DictAtom {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DictAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.entries.borrow().iter())
            .finish()
    }
}
