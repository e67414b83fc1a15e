//! Tracking Context
//!
//! The tracking context records which derivations are read while a
//! derivation recomputes. This is what makes dependency discovery automatic:
//! [`Derivation::get_value`](super::Derivation::get_value) reports itself to
//! the innermost open frame, and the recomputing derivation collects the
//! frame's contents when it finishes.
//!
//! # Implementation
//!
//! A thread-local stack of frames. [`TrackingScope::enter`] pushes a frame
//! and returns a guard; the guard pops the frame when it is finished or
//! dropped, so the stack stays balanced even if the computation panics.
//! Nested recomputations push nested frames, and a read is only recorded in
//! the innermost one.
//!
//! [`untracked`] pushes a frame that records nothing, hiding reads from any
//! enclosing computation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::id::DerivationId;
use super::runtime::Node;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

struct Frame {
    owner: Option<DerivationId>,
    /// `None` for untracked frames.
    dependencies: Option<IndexMap<DerivationId, Rc<dyn Node>>>,
}

/// The set of derivations read inside one tracking frame, in first-read
/// order and without duplicates.
#[derive(Default)]
pub struct Dependencies {
    nodes: IndexMap<DerivationId, Rc<dyn Node>>,
}

impl Dependencies {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: DerivationId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Ids of the recorded derivations, in first-read order.
    pub fn ids(&self) -> Vec<DerivationId> {
        self.nodes.keys().copied().collect()
    }

    pub(crate) fn into_nodes(self) -> IndexMap<DerivationId, Rc<dyn Node>> {
        self.nodes
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.keys()).finish()
    }
}

/// Guard for an open tracking frame.
pub struct TrackingScope {
    owner: Option<DerivationId>,
    open: bool,
}

impl TrackingScope {
    /// Begin tracking reads on behalf of `owner`.
    pub fn enter(owner: DerivationId) -> Self {
        Self::push(Frame {
            owner: Some(owner),
            dependencies: Some(IndexMap::new()),
        });
        Self {
            owner: Some(owner),
            open: true,
        }
    }

    fn enter_untracked() -> Self {
        Self::push(Frame {
            owner: None,
            dependencies: None,
        });
        Self {
            owner: None,
            open: true,
        }
    }

    fn push(frame: Frame) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(frame));
    }

    /// Whether a read right now would be recorded.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|frame| frame.dependencies.is_some())
        })
    }

    /// The derivation whose frame is innermost, if that frame is tracking.
    pub fn current_owner() -> Option<DerivationId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|frame| frame.owner))
    }

    /// Record a read of `node` in the innermost frame.
    pub(crate) fn record_dependency(node: Rc<dyn Node>) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(Frame {
                owner,
                dependencies: Some(dependencies),
            }) = stack.last_mut()
            {
                let id = node.id();
                // A derivation never depends on itself through its own frame.
                if *owner != Some(id) {
                    dependencies.entry(id).or_insert(node);
                }
            }
        });
    }

    /// Close the frame and return everything it recorded.
    pub fn finish(mut self) -> Dependencies {
        self.open = false;
        let frame = self.pop();
        Dependencies {
            nodes: frame.and_then(|f| f.dependencies).unwrap_or_default(),
        }
    }

    fn pop(&self) -> Option<Frame> {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());
        if let Some(frame) = &popped {
            debug_assert_eq!(
                frame.owner, self.owner,
                "TrackingScope mismatch: expected {:?}, got {:?}",
                self.owner, frame.owner
            );
        }
        popped
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        if self.open {
            // Drop the frame's contents after the stack borrow is released.
            let frame = self.pop();
            drop(frame);
        }
    }
}

/// Run `f` without recording any of its reads in the enclosing computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _scope = TrackingScope::enter_untracked();
    f()
}
