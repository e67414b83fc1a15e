//! Reactive Primitives
//!
//! This module implements the propagation engine: emitters, boxes and
//! derivations. Atoms and pointers are built on top of it.
//!
//! # Concepts
//!
//! ## Emitters
//!
//! An [`Emitter`] fans a value out to listeners synchronously. Every change
//! notification in the crate goes through one.
//!
//! ## Boxes
//!
//! A [`ValueBox`] holds one mutable value. Its [`derivation`](ValueBox::derivation)
//! lets computations depend on it.
//!
//! ## Derivations
//!
//! A [`Derivation`] is a cached computed value. It records the derivations
//! it reads, goes stale when one of them changes, and recomputes on the
//! next read (push to invalidate, pull to recompute).
//!
//! # Implementation Notes
//!
//! Dependency discovery uses a thread-local stack of tracking frames
//! ([`TrackingScope`]). Everything is single-threaded: handles are `Rc`
//! based and neither `Send` nor `Sync`.

mod context;
mod derivation;
mod emitter;
mod id;
mod runtime;
mod value_box;

pub use context::{untracked, Dependencies, TrackingScope};
pub use derivation::{Derivation, DerivationState, Invalidator, WeakDerivation};
pub use emitter::{Emitter, Subscription};
pub use id::{DerivationId, ListenerId};
pub use runtime::Runtime;
pub use value_box::ValueBox;
