//! Atoms
//!
//! Mutable containers for [`Value`]s. Every atom exposes tracked views of
//! its parts ([`DictAtom::prop`], [`ArrayAtom::index`], [`BoxAtom::derivation`])
//! that only go stale when the part they look at changes.

mod array_atom;
mod box_atom;
mod dict_atom;
mod value;

pub use array_atom::{ArrayAtom, ArrayChange};
pub use box_atom::BoxAtom;
pub use dict_atom::{DictAtom, DictChange};
pub use value::{Key, Value, NOTFOUND};
