//! Read-only keyed views.

use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::atoms::{DictAtom, Value};
use crate::derived::DerivationCache;
use crate::pointer::Pointer;
use crate::reactive::Derivation;

/// Anything that can hand out tracked per-key views.
pub trait DictSource {
    /// Tracked value under `key`, [`Value::NotFound`] when absent.
    fn prop(&self, key: &str) -> Derivation<Value>;

    /// Tracked list of keys.
    fn keys(&self) -> Derivation<Vec<String>>;
}

impl DictSource for DictAtom {
    fn prop(&self, key: &str) -> Derivation<Value> {
        DictAtom::prop(self, key)
    }

    fn keys(&self) -> Derivation<Vec<String>> {
        self.keys_derivation()
    }
}

struct Props {
    props: IndexMap<String, Derivation<Value>>,
    keys: Derivation<Vec<String>>,
}

impl DictSource for Props {
    fn prop(&self, key: &str) -> Derivation<Value> {
        self.props
            .get(key)
            .cloned()
            .unwrap_or_else(|| Derivation::constant(Value::NotFound))
    }

    fn keys(&self) -> Derivation<Vec<String>> {
        self.keys.clone()
    }
}

struct MapValues {
    base: DerivedDict,
    f: Rc<dyn Fn(&Value) -> Value>,
    props: DerivationCache<String, Value>,
}

impl DictSource for MapValues {
    fn prop(&self, key: &str) -> Derivation<Value> {
        self.props.get_or_build(key.to_owned(), || {
            let f = Rc::clone(&self.f);
            self.base.prop(key).map(move |value| {
                if value.is_not_found() {
                    Value::NotFound
                } else {
                    f(value)
                }
            })
        })
    }

    fn keys(&self) -> Derivation<Vec<String>> {
        self.base.keys()
    }
}

struct Extend {
    base: DerivedDict,
    overlay: DerivedDict,
    props: DerivationCache<String, Value>,
    keys: DerivationCache<(), Vec<String>>,
}

impl DictSource for Extend {
    fn prop(&self, key: &str) -> Derivation<Value> {
        self.props.get_or_build(key.to_owned(), || {
            let over = self.overlay.prop(key);
            let base = self.base.prop(key);
            Derivation::new(move || match over.get_value() {
                Value::NotFound => base.get_value(),
                value => value,
            })
        })
    }

    fn keys(&self) -> Derivation<Vec<String>> {
        self.keys.get_or_build((), || {
            let base = self.base.keys();
            let overlay = self.overlay.keys();
            Derivation::new(move || {
                let mut keys: IndexSet<String> = base.get_value().into_iter().collect();
                keys.extend(overlay.get_value());
                keys.into_iter().collect()
            })
        })
    }
}

/// A read-only dictionary whose entries are derivations.
#[derive(Clone)]
pub struct DerivedDict {
    source: Rc<dyn DictSource>,
}

impl DerivedDict {
    pub fn new(source: impl DictSource + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    /// A live read-only view of `atom`.
    pub fn from_atom(atom: &DictAtom) -> Self {
        Self::new(atom.clone())
    }

    /// A fixed set of keys, each backed by its own derivation.
    pub fn from_props<K, I>(props: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Derivation<Value>)>,
    {
        let props: IndexMap<String, Derivation<Value>> = props
            .into_iter()
            .map(|(key, derivation)| (key.into(), derivation))
            .collect();
        let keys = Derivation::constant(props.keys().cloned().collect());
        Self::new(Props { props, keys })
    }

    /// Apply `f` to every present value. Absent values stay absent.
    pub fn map_values<F>(&self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        Self::new(MapValues {
            base: self.clone(),
            f: Rc::new(f),
            props: DerivationCache::new(),
        })
    }

    /// Entries of `overlay` take precedence over entries of `self`.
    pub fn extend(&self, overlay: &DerivedDict) -> Self {
        Self::new(Extend {
            base: self.clone(),
            overlay: overlay.clone(),
            props: DerivationCache::new(),
            keys: DerivationCache::new(),
        })
    }

    pub fn prop(&self, key: &str) -> Derivation<Value> {
        self.source.prop(key)
    }

    pub fn keys(&self) -> Derivation<Vec<String>> {
        self.source.keys()
    }

    pub fn pointer(&self) -> Pointer {
        Pointer::new(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }
}

impl fmt::Debug for DerivedDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedDict")
            .field("keys", &self.keys().get_untracked())
            .finish()
    }
}
