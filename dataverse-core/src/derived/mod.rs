//! Derived collections
//!
//! Read-only dictionary and array views whose entries are derivations. They
//! wrap atoms, fixed sets of derivations, or other derived collections, and
//! pointers can address into them like into atoms.

mod array;
mod dict;

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use crate::reactive::{Derivation, WeakDerivation};

pub use array::{ArraySource, DerivedArray};
pub use dict::{DerivedDict, DictSource};

/// Per-key derivations that live as long as someone holds them.
pub(crate) struct DerivationCache<K, V> {
    entries: RefCell<HashMap<K, WeakDerivation<V>>>,
}

impl<K, V> DerivationCache<K, V>
where
    K: Hash + Eq,
    V: Clone + PartialEq + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// The live derivation for `key`, or a new one from `build`.
    pub(crate) fn get_or_build(
        &self,
        key: K,
        build: impl FnOnce() -> Derivation<V>,
    ) -> Derivation<V> {
        if let Some(existing) = self
            .entries
            .borrow()
            .get(&key)
            .and_then(WeakDerivation::upgrade)
        {
            return existing;
        }

        // `build` may reach into other caches, so no borrow is held here.
        let derivation = build();
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, weak| weak.upgrade().is_some());
        entries.insert(key, derivation.downgrade());
        derivation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_returns_live_entry_and_rebuilds_dropped_one() {
        let cache: DerivationCache<u8, i32> = DerivationCache::new();
        let first = cache.get_or_build(1, || Derivation::constant(1));
        assert!(cache.get_or_build(1, || Derivation::constant(2)).ptr_eq(&first));

        drop(first);
        assert_eq!(cache.get_or_build(1, || Derivation::constant(3)).get_value(), 3);
    }
}
