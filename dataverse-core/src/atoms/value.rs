//! Values stored in atoms and produced by pointers.
//!
//! [`Value`] is a closed set of shapes. Pointer resolution matches on the
//! variant to decide how to take one more step, so adding a container kind
//! means adding a variant here and an arm in `propify`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::atoms::{ArrayAtom, BoxAtom, DictAtom};
use crate::derived::{DerivedArray, DerivedDict};
use crate::pointer::Pointer;
use crate::reactive::untracked;

/// One step of a pointer path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Index(usize),
    Str(String),
}

impl Key {
    /// The key as a dict property name. Indices are stringified.
    pub fn to_prop(&self) -> String {
        match self {
            Key::Index(index) => index.to_string(),
            Key::Str(key) => key.clone(),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Str(_) => None,
        }
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key::Str(key.to_owned())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key::Str(key)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Str(key) => write!(f, ".{key}"),
        }
    }
}

/// Anything an atom can hold or a pointer can resolve to.
#[derive(Clone, Default)]
pub enum Value {
    /// The path being resolved does not exist.
    #[default]
    NotFound,
    /// Plain immutable data.
    Data(Json),
    Box(BoxAtom),
    Dict(DictAtom),
    Array(ArrayAtom),
    DerivedDict(DerivedDict),
    DerivedArray(DerivedArray),
    Pointer(Pointer),
}

/// Result of resolving a path that does not exist.
pub const NOTFOUND: Value = Value::NotFound;

impl Value {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Value::NotFound)
    }

    /// The plain data, if this is a data value.
    pub fn as_data(&self) -> Option<&Json> {
        match self {
            Value::Data(json) => Some(json),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(Json::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_data().and_then(Json::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(Json::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(Json::as_bool)
    }

    /// Convert JSON into atoms: objects become [`DictAtom`]s and arrays
    /// become [`ArrayAtom`]s, recursively. Scalars stay plain data.
    pub fn atomify(json: Json) -> Value {
        match json {
            Json::Object(map) => Value::Dict(DictAtom::from_entries(
                map.into_iter().map(|(key, value)| (key, Value::atomify(value))),
            )),
            Json::Array(items) => {
                Value::Array(ArrayAtom::new(items.into_iter().map(Value::atomify)))
            }
            scalar => Value::Data(scalar),
        }
    }

    /// Snapshot the value graph as JSON, without recording dependencies.
    ///
    /// Absent values inside containers are skipped; a top-level
    /// [`Value::NotFound`] becomes `null`.
    pub fn to_json(&self) -> Json {
        untracked(|| self.snapshot().unwrap_or(Json::Null))
    }

    fn snapshot(&self) -> Option<Json> {
        match self {
            Value::NotFound => None,
            Value::Data(json) => Some(json.clone()),
            Value::Box(atom) => atom.get().snapshot(),
            Value::Dict(atom) => Some(Json::Object(
                atom.entries()
                    .into_iter()
                    .filter_map(|(key, value)| value.snapshot().map(|json| (key, json)))
                    .collect(),
            )),
            Value::Array(atom) => Some(Json::Array(
                atom.to_vec().iter().filter_map(Value::snapshot).collect(),
            )),
            Value::DerivedDict(dict) => Some(Json::Object(
                dict.keys()
                    .get_value()
                    .into_iter()
                    .filter_map(|key| {
                        let value = dict.prop(&key).get_value();
                        value.snapshot().map(|json| (key, json))
                    })
                    .collect(),
            )),
            Value::DerivedArray(array) => Some(Json::Array(
                array.to_vec().get_value().iter().filter_map(Value::snapshot).collect(),
            )),
            Value::Pointer(pointer) => pointer.get_value().snapshot(),
        }
    }
}

impl PartialEq for Value {
    /// Data compares structurally; containers compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::NotFound, Value::NotFound) => true,
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Box(a), Value::Box(b)) => a.ptr_eq(b),
            (Value::Dict(a), Value::Dict(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::DerivedDict(a), Value::DerivedDict(b)) => a.ptr_eq(b),
            (Value::DerivedArray(a), Value::DerivedArray(b)) => a.ptr_eq(b),
            (Value::Pointer(a), Value::Pointer(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::NotFound => f.write_str("NotFound"),
            Value::Data(json) => write!(f, "Data({json})"),
            Value::Box(atom) => fmt::Debug::fmt(atom, f),
            Value::Dict(atom) => fmt::Debug::fmt(atom, f),
            Value::Array(atom) => fmt::Debug::fmt(atom, f),
            Value::DerivedDict(dict) => fmt::Debug::fmt(dict, f),
            Value::DerivedArray(array) => fmt::Debug::fmt(array, f),
            Value::Pointer(pointer) => fmt::Debug::fmt(pointer, f),
        }
    }
}

macro_rules! value_from_data {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Data(Json::from(value))
                }
            }
        )*
    };
}

value_from_data!(bool, i32, i64, u32, u64, f64, &str, String);

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::Data(json)
    }
}

impl From<BoxAtom> for Value {
    fn from(atom: BoxAtom) -> Self {
        Value::Box(atom)
    }
}

impl From<DictAtom> for Value {
    fn from(atom: DictAtom) -> Self {
        Value::Dict(atom)
    }
}

impl From<ArrayAtom> for Value {
    fn from(atom: ArrayAtom) -> Self {
        Value::Array(atom)
    }
}

impl From<DerivedDict> for Value {
    fn from(dict: DerivedDict) -> Self {
        Value::DerivedDict(dict)
    }
}

impl From<DerivedArray> for Value {
    fn from(array: DerivedArray) -> Self {
        Value::DerivedArray(array)
    }
}

impl From<Pointer> for Value {
    fn from(pointer: Pointer) -> Self {
        Value::Pointer(pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_compares_structurally() {
        assert_eq!(Value::from(1), Value::from(json!(1)));
        assert_ne!(Value::from(1), Value::from(2));
        assert_eq!(NOTFOUND, Value::NotFound);
        assert_ne!(Value::from(json!(null)), NOTFOUND);
    }

    #[test]
    fn atoms_compare_by_identity() {
        let a = DictAtom::new();
        let b = DictAtom::new();
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(DictAtom::new()), Value::from(b));
    }

    #[test]
    fn atomify_builds_nested_atoms() {
        let value = Value::atomify(json!({"a": {"b": [1, 2]}, "c": "x"}));
        let Value::Dict(root) = &value else {
            panic!("expected a dict atom, got {value:?}");
        };
        assert!(matches!(root.get_prop("a"), Value::Dict(_)));
        assert_eq!(root.get_prop("c"), Value::from("x"));
        assert_eq!(value.to_json(), json!({"a": {"b": [1, 2]}, "c": "x"}));
    }

    #[test]
    fn to_json_unwraps_boxes_and_skips_absent_entries() {
        let dict = DictAtom::new();
        dict.set_prop("boxed", BoxAtom::new(3));
        dict.set_prop("gone", NOTFOUND);
        assert_eq!(Value::from(dict).to_json(), json!({"boxed": 3}));
        assert_eq!(NOTFOUND.to_json(), json!(null));
    }

    #[test]
    fn keys_serialize_untagged() {
        let path = vec![Key::from("a"), Key::from(2usize)];
        let encoded = serde_json::to_string(&path).unwrap();
        assert_eq!(encoded, r#"["a",2]"#);
        let decoded: Vec<Key> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn key_display_reads_like_a_path() {
        assert_eq!(Key::from("a").to_string(), ".a");
        assert_eq!(Key::from(3usize).to_string(), "[3]");
        assert_eq!(Key::from(3usize).to_prop(), "3");
    }
}
