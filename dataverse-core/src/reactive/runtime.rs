//! Propagation Runtime
//!
//! The runtime connects derivations into a graph and pushes invalidation
//! through it when a source changes.
//!
//! # How It Works
//!
//! 1. While a derivation recomputes, every derivation it reads is recorded
//!    by the tracking context (see [`TrackingScope`]).
//!
//! 2. After recomputing, the derivation registers itself as a dependent of
//!    each recorded dependency and unregisters from dependencies it no
//!    longer reads.
//!
//! 3. When a source changes, [`Runtime::invalidate`]:
//!    a. marks every transitive dependent stale, visiting each node at most
//!       once per pass,
//!    b. collects the stale nodes that have change listeners,
//!    c. after marking is complete, refreshes each collected node, which
//!       recomputes it and notifies its listeners if the value changed.
//!
//! Nodes without listeners are never recomputed here. They recompute on
//! their next read.
//!
//! # Ordering
//!
//! Dependents are marked in the order they registered. Listener refreshes run
//! in marking order. Everything happens synchronously on the caller's stack.

use std::rc::{Rc, Weak};

use tracing::trace;

use super::context::TrackingScope;
use super::id::DerivationId;

/// A type-erased derivation, as seen by its neighbours in the graph.
pub(crate) trait Node {
    fn id(&self) -> DerivationId;

    /// Start notifying `dependent` when this node goes stale.
    fn add_dependent(&self, id: DerivationId, dependent: Weak<dyn Node>);

    /// Stop notifying the dependent with the given id.
    fn remove_dependent(&self, id: DerivationId);

    /// Mark this node and its dependents stale. Nodes that need to be kept
    /// up to date are pushed onto `pending`.
    fn mark_stale(&self, pending: &mut Vec<Rc<dyn Node>>);

    /// Recompute and notify change listeners if the value changed.
    fn refresh(&self);
}

/// Entry point for change propagation.
pub struct Runtime;

impl Runtime {
    /// Propagate a change originating at `origin`.
    pub(crate) fn invalidate(origin: &dyn Node) {
        let mut pending = Vec::new();
        origin.mark_stale(&mut pending);

        if !pending.is_empty() {
            trace!(
                origin = %origin.id(),
                refreshing = pending.len(),
                "refreshing listened derivations"
            );
        }

        for node in pending {
            node.refresh();
        }
    }

    /// The derivation currently being recomputed, if any.
    pub fn current_derivation() -> Option<DerivationId> {
        TrackingScope::current_owner()
    }

    /// Check if reads are currently being recorded.
    pub fn is_tracking() -> bool {
        TrackingScope::is_active()
    }
}
