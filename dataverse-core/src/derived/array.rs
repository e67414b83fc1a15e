//! Read-only indexed views.

use std::fmt;
use std::rc::Rc;

use crate::atoms::{ArrayAtom, Value};
use crate::derived::DerivationCache;
use crate::pointer::Pointer;
use crate::reactive::Derivation;

/// Anything that can hand out tracked per-index views.
pub trait ArraySource {
    /// Tracked item at `index`, [`Value::NotFound`] past the end.
    fn index(&self, index: usize) -> Derivation<Value>;

    /// Tracked length.
    fn length(&self) -> Derivation<usize>;
}

impl ArraySource for ArrayAtom {
    fn index(&self, index: usize) -> Derivation<Value> {
        ArrayAtom::index(self, index)
    }

    fn length(&self) -> Derivation<usize> {
        self.length_derivation()
    }
}

struct Items {
    items: Vec<Derivation<Value>>,
    length: Derivation<usize>,
}

impl ArraySource for Items {
    fn index(&self, index: usize) -> Derivation<Value> {
        self.items
            .get(index)
            .cloned()
            .unwrap_or_else(|| Derivation::constant(Value::NotFound))
    }

    fn length(&self) -> Derivation<usize> {
        self.length.clone()
    }
}

struct Map {
    base: DerivedArray,
    f: Rc<dyn Fn(&Value) -> Value>,
    indices: DerivationCache<usize, Value>,
}

impl ArraySource for Map {
    fn index(&self, index: usize) -> Derivation<Value> {
        self.indices.get_or_build(index, || {
            let f = Rc::clone(&self.f);
            self.base.index(index).map(move |value| {
                if value.is_not_found() {
                    Value::NotFound
                } else {
                    f(value)
                }
            })
        })
    }

    fn length(&self) -> Derivation<usize> {
        self.base.length()
    }
}

/// A read-only array whose items are derivations.
#[derive(Clone)]
pub struct DerivedArray {
    source: Rc<dyn ArraySource>,
}

impl DerivedArray {
    pub fn new(source: impl ArraySource + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    pub fn from_atom(atom: &ArrayAtom) -> Self {
        Self::new(atom.clone())
    }

    pub fn from_derivations(items: impl IntoIterator<Item = Derivation<Value>>) -> Self {
        let items: Vec<_> = items.into_iter().collect();
        let length = Derivation::constant(items.len());
        Self::new(Items { items, length })
    }

    /// Apply `f` to every present item.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        Self::new(Map {
            base: self.clone(),
            f: Rc::new(f),
            indices: DerivationCache::new(),
        })
    }

    pub fn index(&self, index: usize) -> Derivation<Value> {
        self.source.index(index)
    }

    pub fn length(&self) -> Derivation<usize> {
        self.source.length()
    }

    /// Tracked snapshot of every item.
    pub fn to_vec(&self) -> Derivation<Vec<Value>> {
        let source = Rc::clone(&self.source);
        Derivation::new(move || {
            let length = source.length().get_value();
            (0..length)
                .map(|index| source.index(index).get_value())
                .collect()
        })
    }

    pub fn pointer(&self) -> Pointer {
        Pointer::new(self.clone())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }
}

impl fmt::Debug for DerivedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedArray")
            .field("length", &self.length().get_untracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::BoxAtom;

    #[test]
    fn to_vec_tracks_splices() {
        let atom = ArrayAtom::new([1, 2]);
        let items = DerivedArray::from_atom(&atom).to_vec();

        assert_eq!(items.get_value(), vec![Value::from(1), Value::from(2)]);
        atom.push(3);
        assert_eq!(items.get_value().len(), 3);
        atom.set_index(0, 10).unwrap();
        assert_eq!(items.get_value()[0], Value::from(10));
    }

    #[test]
    fn from_derivations_has_fixed_length() {
        let cell = BoxAtom::new("a");
        let array = DerivedArray::from_derivations([cell.derivation()]);

        assert_eq!(array.length().get_value(), 1);
        assert_eq!(array.index(3).get_value(), Value::NotFound);
        cell.set("b");
        assert_eq!(array.index(0).get_value(), Value::from("b"));
    }

    #[test]
    fn map_transforms_present_items() {
        let atom = ArrayAtom::new([1, 2, 3]);
        let squares = DerivedArray::from_atom(&atom).map(|value| {
            let n = value.as_i64().unwrap_or_default();
            Value::from(n * n)
        });

        assert_eq!(
            squares.to_vec().get_value(),
            vec![Value::from(1), Value::from(4), Value::from(9)]
        );
        assert_eq!(squares.index(5).get_value(), Value::NotFound);
    }

    #[test]
    fn mapped_indices_are_memoized() {
        let atom = ArrayAtom::new([1, 2]);
        let mapped = DerivedArray::from_atom(&atom).map(|value| value.clone());
        let first = mapped.index(0);
        assert!(mapped.index(0).ptr_eq(&first));
        assert!(!mapped.index(1).ptr_eq(&first));
    }
}
