//! DataVerse Core
//!
//! Lazy, dependency-tracked reactive state. The crate provides:
//!
//! - Emitters and boxes, the minimal observable primitives
//! - Derivations: cached computed values that discover their own inputs
//! - Atoms: mutable dict, array and scalar containers with fine-grained change
//!   notifications
//! - Derived collections: read-only views over atoms and derivations
//! - Pointers: lazily resolved paths into a graph of atoms
//!
//! # Architecture
//!
//! - `reactive`: propagation engine (emitters, tracking, derivations)
//! - `atoms`: mutable containers and the [`Value`] model
//! - `derived`: read-only derived dictionaries and arrays
//! - `pointer`: path addressing with `NotFound` degradation
//! - `lock`: a value with a temporary override
//!
//! Everything is single-threaded. Changes are pushed as invalidations and
//! values are pulled on read, so nothing recomputes until it is asked for,
//! except derivations that have `on_change` listeners.
//!
//! # Example
//!
//! ```rust
//! use dataverse_core::{pointer, Derivation, Value};
//! use serde_json::json;
//!
//! let Value::Dict(state) = Value::atomify(json!({"a": {"b": 1}})) else {
//!     unreachable!()
//! };
//!
//! let b = pointer(state.clone()).prop("a").prop("b");
//! let label = {
//!     let b = b.clone();
//!     Derivation::new(move || format!("b = {:?}", b.get_value().as_i64()))
//! };
//! assert_eq!(label.get_value(), "b = Some(1)");
//!
//! state.set_prop("a", Value::atomify(json!({"b": 2})));
//! assert_eq!(label.get_value(), "b = Some(2)");
//!
//! state.delete_prop("a");
//! assert!(b.get_value().is_not_found());
//! ```

pub mod atoms;
pub mod derived;
pub mod error;
pub mod lock;
pub mod pointer;
pub mod reactive;

pub use atoms::{ArrayAtom, ArrayChange, BoxAtom, DictAtom, DictChange, Key, Value, NOTFOUND};
pub use derived::{ArraySource, DerivedArray, DerivedDict, DictSource};
pub use error::{DataverseError, Result};
pub use lock::{LockHandle, Lockable};
pub use pointer::{pointer, Address, Pointer};
pub use reactive::{untracked, Derivation, Emitter, Subscription, ValueBox, WeakDerivation};
