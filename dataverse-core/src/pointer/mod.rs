//! Pointers
//!
//! A [`Pointer`] addresses a possibly absent location inside a graph of
//! atoms and derived collections, and resolves it lazily as a derivation.
//!
//! # Resolution
//!
//! A pointer's address is either a root value plus a static path, or a
//! parent pointer plus one more key. Resolution walks the address one key
//! at a time with [`propify`], which matches on the [`Value`] variant to
//! pick the tracked view for that step. After every step [`no_box_atoms`]
//! replaces a [`BoxAtom`](crate::atoms::BoxAtom) with the value it holds, so
//! chains pass through boxed scalars.
//!
//! Missing keys and shape mismatches resolve to [`Value::NotFound`], and
//! every step below a missing one does too.
//!
//! # Ownership
//!
//! A pointer owns the child pointers returned by [`Pointer::prop`] and
//! [`Pointer::index`]. A child only holds its parent's resolved derivation,
//! never the parent pointer, so the tree has no reference cycles.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as Json;
use tracing::trace;

use crate::atoms::{Key, Value};
use crate::reactive::{Derivation, Subscription};

/// Where a pointer points.
#[derive(Clone)]
pub enum Address {
    /// A static path below a root value.
    WithPath { root: Value, path: Vec<Key> },
    /// One key below a parent pointer's resolved value.
    FromParent { parent: Derivation<Value>, key: Key },
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::WithPath { root, path } => f
                .debug_struct("WithPath")
                .field("root", root)
                .field("path", path)
                .finish(),
            Address::FromParent { parent, key } => f
                .debug_struct("FromParent")
                .field("parent", &parent.id())
                .field("key", key)
                .finish(),
        }
    }
}

struct PointerInner {
    address: Address,
    path: Vec<Key>,
    internal: OnceCell<Derivation<Value>>,
    props: RefCell<HashMap<Key, Pointer>>,
}

/// A lazily resolved path into a value graph.
#[derive(Clone)]
pub struct Pointer {
    inner: Rc<PointerInner>,
}

/// Create a pointer at `root`.
///
/// ```
/// use dataverse_core::{pointer, DictAtom, Value};
///
/// let atom = DictAtom::from_entries([("a", 1)]);
/// let a = pointer(atom.clone()).prop("a");
/// assert_eq!(a.get_value(), Value::from(1));
///
/// atom.set_prop("a", 2);
/// assert_eq!(a.get_value(), Value::from(2));
/// assert!(a.prop("missing").get_value().is_not_found());
/// ```
pub fn pointer(root: impl Into<Value>) -> Pointer {
    Pointer::new(root)
}

impl Pointer {
    pub fn new(root: impl Into<Value>) -> Self {
        Self::with_path(root, Vec::new())
    }

    /// A pointer at `path` below `root`.
    pub fn with_path(root: impl Into<Value>, path: Vec<Key>) -> Self {
        let address = Address::WithPath {
            root: root.into(),
            path: path.clone(),
        };
        Self::from_address(address, path)
    }

    fn from_address(address: Address, path: Vec<Key>) -> Self {
        Self {
            inner: Rc::new(PointerInner {
                address,
                path,
                internal: OnceCell::new(),
                props: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Child pointer one key further down.
    ///
    /// Repeated calls with the same key return the same pointer.
    pub fn prop(&self, key: impl Into<Key>) -> Pointer {
        let key = key.into();
        if let Some(existing) = self.inner.props.borrow().get(&key) {
            return existing.clone();
        }

        let mut path = self.inner.path.clone();
        path.push(key.clone());
        let child = Self::from_address(
            Address::FromParent {
                parent: self.derivation(),
                key: key.clone(),
            },
            path,
        );
        self.inner.props.borrow_mut().insert(key, child.clone());
        child
    }

    /// Child pointer at array position `index`.
    pub fn index(&self, index: usize) -> Pointer {
        self.prop(Key::Index(index))
    }

    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    /// Keys from the root to this pointer.
    pub fn path(&self) -> &[Key] {
        &self.inner.path
    }

    /// The derivation this pointer resolves through. Built on first use.
    pub fn derivation(&self) -> Derivation<Value> {
        self.inner
            .internal
            .get_or_init(|| {
                trace!(path = ?self.inner.path, "building pointer derivation");
                resolve(&self.inner.address)
            })
            .clone()
    }

    /// Resolve the pointer. Tracked when called inside a derivation.
    pub fn get_value(&self) -> Value {
        self.derivation().get_value()
    }

    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Value) + 'static,
    {
        self.derivation().on_change(listener)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pointer(")?;
        for key in &self.inner.path {
            write!(f, "{key}")?;
        }
        f.write_str(")")
    }
}

fn resolve(address: &Address) -> Derivation<Value> {
    match address {
        Address::WithPath { root, path } => {
            let start = Derivation::constant(root.clone()).flat_map(no_box_atoms);
            path.iter().fold(start, |derivation, key| {
                let key = key.clone();
                derivation
                    .flat_map(move |value| propify(value, &key))
                    .flat_map(no_box_atoms)
            })
        }
        Address::FromParent { parent, key } => {
            let key = key.clone();
            parent
                .flat_map(move |value| propify(value, &key))
                .flat_map(no_box_atoms)
        }
    }
}

/// The tracked view of `value` at `key`.
///
/// Unknown shapes and mismatched key kinds resolve to a constant
/// [`Value::NotFound`].
pub fn propify(value: &Value, key: &Key) -> Derivation<Value> {
    match (value, key) {
        (Value::Box(atom), _) => {
            let key = key.clone();
            atom.derivation().flat_map(move |inner| propify(inner, &key))
        }
        (Value::Dict(atom), _) => atom.prop(&key.to_prop()),
        (Value::Array(atom), Key::Index(index)) => atom.index(*index),
        (Value::DerivedDict(dict), _) => dict.prop(&key.to_prop()),
        (Value::DerivedArray(array), Key::Index(index)) => array.index(*index),
        (Value::Pointer(pointer), _) => pointer.prop(key.clone()).derivation(),
        (Value::Data(json), _) => Derivation::constant(json_child(json, key)),
        _ => Derivation::constant(Value::NotFound),
    }
}

fn json_child(json: &Json, key: &Key) -> Value {
    let child = match (json, key) {
        (Json::Object(map), _) => map.get(&key.to_prop()),
        (Json::Array(items), Key::Index(index)) => items.get(*index),
        _ => None,
    };
    child.cloned().map(Value::Data).unwrap_or_default()
}

/// Replace a box atom with a derivation of the value it holds.
pub fn no_box_atoms(value: &Value) -> Derivation<Value> {
    match value {
        Value::Box(atom) => atom.derivation().flat_map(no_box_atoms),
        other => Derivation::constant(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{ArrayAtom, BoxAtom, DictAtom};
    use crate::derived::{DerivedArray, DerivedDict};
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn missing_path_is_not_found_all_the_way_down() {
        let root = DictAtom::new();
        let a = pointer(root.clone()).prop("a");
        assert_eq!(a.prop("b").get_value(), Value::NotFound);
        assert_eq!(a.prop("b").prop("c").get_value(), Value::NotFound);
    }

    #[test]
    fn child_pointers_are_memoized() {
        let root = pointer(DictAtom::new());
        assert!(root.prop("x").ptr_eq(&root.prop("x")));
        assert!(root.index(0).ptr_eq(&root.prop(0usize)));
        assert!(!root.prop("x").ptr_eq(&root.prop("y")));
    }

    #[test]
    fn nested_dict_tracks_replacement_and_removal() {
        let Value::Dict(root) = Value::atomify(json!({"a": {"b": 1}})) else {
            panic!("expected a dict atom");
        };
        let b = pointer(root.clone()).prop("a").prop("b");
        assert_eq!(b.get_value(), Value::from(1));

        root.set_prop("a", Value::atomify(json!({"b": 2})));
        assert_eq!(b.get_value(), Value::from(2));

        root.clear();
        assert_eq!(b.get_value(), Value::NotFound);
    }

    #[test]
    fn boxes_are_transparent() {
        let inner = BoxAtom::new(1);
        let root = DictAtom::from_entries([("n", inner.clone())]);
        let n = pointer(root).prop("n");

        assert_eq!(n.get_value(), Value::from(1));
        inner.set(2);
        assert_eq!(n.get_value(), Value::from(2));

        let boxed_root = pointer(BoxAtom::new("top"));
        assert_eq!(boxed_root.get_value(), Value::from("top"));
    }

    #[test]
    fn box_holding_a_dict_is_walked_through() {
        let dict = DictAtom::from_entries([("k", "v")]);
        let holder = BoxAtom::new(dict.clone());
        let k = pointer(holder.clone()).prop("k");
        assert_eq!(k.get_value(), Value::from("v"));

        holder.set(DictAtom::from_entries([("k", "w")]));
        assert_eq!(k.get_value(), Value::from("w"));
    }

    #[test]
    fn arrays_need_index_keys() {
        let array = ArrayAtom::new([10, 20]);
        let root = pointer(array.clone());
        assert_eq!(root.index(1).get_value(), Value::from(20));
        assert_eq!(root.prop("1").get_value(), Value::NotFound);

        array.splice(0, 1, std::iter::empty::<Value>());
        assert_eq!(root.index(1).get_value(), Value::NotFound);
        assert_eq!(root.index(0).get_value(), Value::from(20));
    }

    #[test]
    fn plain_json_is_navigable() {
        let root = pointer(json!({"list": [{"name": "x"}], "n": 3}));
        assert_eq!(root.prop("list").index(0).prop("name").get_value(), Value::from("x"));
        assert_eq!(root.prop("n").prop("deeper").get_value(), Value::NotFound);
        assert_eq!(root.prop("list").prop("name").get_value(), Value::NotFound);
    }

    #[test]
    fn derived_collections_and_nested_pointers_resolve() {
        let atom = DictAtom::from_entries([("a", 1)]);
        let view = DerivedDict::from_atom(&atom).map_values(|v| {
            Value::from(v.as_i64().unwrap_or_default() + 100)
        });
        assert_eq!(pointer(view).prop("a").get_value(), Value::from(101));

        let list = DerivedArray::from_derivations([Derivation::constant(Value::from("z"))]);
        assert_eq!(pointer(list).index(0).get_value(), Value::from("z"));

        let outer = DictAtom::from_entries([("link", pointer(atom.clone()))]);
        let through = pointer(outer).prop("link").prop("a");
        assert_eq!(through.get_value(), Value::from(1));
        atom.set_prop("a", 5);
        assert_eq!(through.get_value(), Value::from(5));
    }

    #[test]
    fn with_path_matches_chained_props() {
        let root = Value::atomify(json!({"a": [{"b": true}]}));
        let direct = Pointer::with_path(
            root.clone(),
            vec![Key::from("a"), Key::from(0usize), Key::from("b")],
        );
        assert_eq!(direct.get_value(), Value::from(true));
        assert_eq!(direct.path().len(), 3);
        assert_eq!(format!("{direct:?}"), "Pointer(.a[0].b)");
    }

    #[test]
    fn listeners_fire_only_for_their_path() {
        let root = DictAtom::from_entries([("a", 1), ("b", 2)]);
        let a = pointer(root.clone()).prop("a");
        let fired = Rc::new(Cell::new(0));
        let fired_in = Rc::clone(&fired);
        let _sub = a.on_change(move |_| fired_in.set(fired_in.get() + 1));

        root.set_prop("b", 3);
        assert_eq!(fired.get(), 0);
        root.set_prop("a", 4);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn child_outlives_dropped_parent() {
        let root = DictAtom::from_entries([("a", 1)]);
        let a = {
            let parent = pointer(root.clone());
            parent.prop("a")
        };
        root.set_prop("a", 7);
        assert_eq!(a.get_value(), Value::from(7));
    }
}
