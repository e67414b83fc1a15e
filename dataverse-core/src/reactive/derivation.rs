//! Derivation Implementation
//!
//! A Derivation is a lazily computed, memoized, dependency-tracked value.
//!
//! # How Derivations Work
//!
//! 1. A new derivation is `Uninitialized`. Nothing runs until the first
//!    [`get_value`](Derivation::get_value).
//!
//! 2. Computing runs inside a tracking frame. Every derivation read during
//!    the computation becomes a dependency, and this derivation registers
//!    itself as their dependent.
//!
//! 3. When a dependency changes, the derivation is marked `Stale`. It does
//!    not recompute yet.
//!
//! 4. The next read recomputes from scratch and rediscovers dependencies.
//!    Dependencies that were not read this time are unsubscribed, so
//!    conditional branches only keep live edges.
//!
//! 5. A derivation with [`on_change`](Derivation::on_change) listeners is
//!    refreshed right after each upstream change and its listeners hear
//!    about the new value if it differs from the last one they saw.
//!
//! # Kinds
//!
//! - *computed*: built from a closure with [`Derivation::new`].
//! - *constant*: [`Derivation::constant`], never stale, never recorded.
//! - *source*: [`Derivation::source`], backed by an external emitter. A
//!   source is hot while it has dependents or listeners; only then does it
//!   subscribe to the emitter and cache. A cold source reads its getter
//!   directly on every call.
//!
//! # Cycles
//!
//! A derivation that reads itself, directly or through other derivations,
//! recurses without bound. This is not detected.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::context::{untracked, TrackingScope};
use super::emitter::{Emitter, Subscription};
use super::id::DerivationId;
use super::runtime::{Node, Runtime};

/// Freshness of a derivation's cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationState {
    /// Never computed, or a source that is currently cold.
    Uninitialized,

    /// The cached value is up to date.
    Fresh,

    /// A dependency changed since the value was cached.
    Stale,
}

enum Kind<V> {
    Constant,
    Computed(Box<dyn Fn() -> V>),
    Source {
        subscribe: Box<dyn Fn(Invalidator) -> Subscription>,
        get: Box<dyn Fn() -> V>,
    },
}

impl<V> Kind<V> {
    fn name(&self) -> &'static str {
        match self {
            Kind::Constant => "constant",
            Kind::Computed(_) => "computed",
            Kind::Source { .. } => "source",
        }
    }
}

struct Inner<V> {
    id: DerivationId,
    kind: Kind<V>,
    state: Cell<DerivationState>,
    value: RefCell<Option<V>>,

    /// Derivations read during the last computation.
    dependencies: RefCell<IndexMap<DerivationId, Rc<dyn Node>>>,

    /// Derivations that read this one during their last computation.
    dependents: RefCell<IndexMap<DerivationId, Weak<dyn Node>>>,

    listeners: Emitter<V>,

    /// Last value delivered to (or baselined for) the listeners.
    notified: RefCell<Option<V>>,

    /// Present while a source derivation is hot.
    source_subscription: RefCell<Option<Subscription>>,

    this: Weak<Inner<V>>,
}

/// Handle given to a source's subscribe function. Calling
/// [`invalidate`](Invalidator::invalidate) tells the source that its getter
/// would now return something new.
#[derive(Clone)]
pub struct Invalidator {
    node: Weak<dyn Node>,
}

impl Invalidator {
    pub fn invalidate(&self) {
        if let Some(node) = self.node.upgrade() {
            Runtime::invalidate(node.as_ref());
        }
    }
}

impl Debug for Invalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator")
            .field("alive", &(self.node.strong_count() > 0))
            .finish()
    }
}

/// A lazily computed, dependency-tracked value.
///
/// Cloning a `Derivation` creates another handle to the same node.
pub struct Derivation<V> {
    inner: Rc<Inner<V>>,
}

/// Non-owning handle to a [`Derivation`].
pub struct WeakDerivation<V> {
    inner: Weak<Inner<V>>,
}

impl<V> Clone for Derivation<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Clone for WeakDerivation<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V> WeakDerivation<V> {
    pub fn upgrade(&self) -> Option<Derivation<V>> {
        self.inner.upgrade().map(|inner| Derivation { inner })
    }
}

impl<V> Derivation<V>
where
    V: Clone + PartialEq + 'static,
{
    fn from_kind(kind: Kind<V>, state: DerivationState, value: Option<V>) -> Self {
        let inner = Rc::new_cyclic(|this| Inner {
            id: DerivationId::new(),
            kind,
            state: Cell::new(state),
            value: RefCell::new(value),
            dependencies: RefCell::new(IndexMap::new()),
            dependents: RefCell::new(IndexMap::new()),
            listeners: Emitter::new(),
            notified: RefCell::new(None),
            source_subscription: RefCell::new(None),
            this: this.clone(),
        });
        Self { inner }
    }

    /// Create a derivation computed by `compute`.
    ///
    /// `compute` runs on the first read, not now.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> V + 'static,
    {
        Self::from_kind(
            Kind::Computed(Box::new(compute)),
            DerivationState::Uninitialized,
            None,
        )
    }

    /// A derivation that always holds `value`.
    pub fn constant(value: V) -> Self {
        Self::from_kind(Kind::Constant, DerivationState::Fresh, Some(value))
    }

    /// A derivation backed by an external change signal.
    ///
    /// `subscribe` is called when the derivation goes hot. It must arrange
    /// for the given [`Invalidator`] to be called whenever `get` would return
    /// something new, and return the subscription that undoes that
    /// arrangement. The subscription is dropped when the derivation goes
    /// cold again.
    pub fn source<S, G>(subscribe: S, get: G) -> Self
    where
        S: Fn(Invalidator) -> Subscription + 'static,
        G: Fn() -> V + 'static,
    {
        Self::from_kind(
            Kind::Source {
                subscribe: Box::new(subscribe),
                get: Box::new(get),
            },
            DerivationState::Uninitialized,
            None,
        )
    }

    /// Get the derivation's unique ID.
    pub fn id(&self) -> DerivationId {
        self.inner.id
    }

    /// Read the current value, recomputing if necessary.
    ///
    /// Inside another derivation's computation this also records a
    /// dependency edge.
    pub fn get_value(&self) -> V {
        if !matches!(self.inner.kind, Kind::Constant) {
            TrackingScope::record_dependency(self.inner.clone() as Rc<dyn Node>);
        }
        self.inner.read()
    }

    /// Read the current value without recording a dependency.
    pub fn get_untracked(&self) -> V {
        untracked(|| self.inner.read())
    }

    /// Derive a new value from this one.
    pub fn map<U, F>(&self, f: F) -> Derivation<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(&V) -> U + 'static,
    {
        let source = self.clone();
        Derivation::new(move || f(&source.get_value()))
    }

    /// Derive a derivation from this value and flatten it.
    ///
    /// The result goes stale when either this derivation or the derivation
    /// returned by `f` changes.
    pub fn flat_map<U, F>(&self, f: F) -> Derivation<U>
    where
        U: Clone + PartialEq + 'static,
        F: Fn(&V) -> Derivation<U> + 'static,
    {
        let source = self.clone();
        Derivation::new(move || f(&source.get_value()).get_value())
    }

    /// Listen for changes.
    ///
    /// While at least one listener is registered the derivation is kept up
    /// to date after every upstream change, and `listener` is called with
    /// each new value that differs from the previous one. The returned
    /// subscription keeps the derivation alive.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&V) + 'static,
    {
        let inner = Rc::clone(&self.inner);
        let first = !inner.listeners.has_listeners();
        let subscription = inner.listeners.tap(listener);
        inner.update_hotness();

        if first {
            let baseline = untracked(|| inner.read());
            *inner.notified.borrow_mut() = Some(baseline);
        }

        Subscription::new(move || {
            subscription.unsubscribe();
            if !inner.listeners.has_listeners() {
                inner.notified.borrow_mut().take();
            }
            inner.update_hotness();
        })
    }

    pub fn downgrade(&self) -> WeakDerivation<V> {
        WeakDerivation {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same derivation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn state(&self) -> DerivationState {
        self.inner.state.get()
    }

    /// Check if the derivation has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.borrow().len()
    }

    /// Ids of the dependencies found during the last computation.
    pub fn dependency_ids(&self) -> Vec<DerivationId> {
        self.inner.dependencies.borrow().keys().copied().collect()
    }

    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.borrow().len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.listener_count()
    }

    /// Whether the derivation has dependents or listeners.
    pub fn is_hot(&self) -> bool {
        self.inner.wants_hot()
    }
}

impl<V> Inner<V>
where
    V: Clone + PartialEq + 'static,
{
    fn cached(&self) -> Option<V> {
        self.value.borrow().clone()
    }

    /// Current value, without recording it in any tracking frame.
    fn read(&self) -> V {
        match &self.kind {
            Kind::Constant => self
                .cached()
                .expect("constant derivations are created with a value"),
            Kind::Source { get, .. } => {
                if self.source_subscription.borrow().is_none() {
                    return untracked(get);
                }
                if self.state.get() != DerivationState::Fresh {
                    let value = untracked(get);
                    *self.value.borrow_mut() = Some(value.clone());
                    self.state.set(DerivationState::Fresh);
                    return value;
                }
                self.cached().expect("fresh sources hold a value")
            }
            Kind::Computed(_) => {
                if self.state.get() == DerivationState::Fresh {
                    if let Some(value) = self.cached() {
                        return value;
                    }
                }
                self.recalculate()
            }
        }
    }

    fn recalculate(&self) -> V {
        let Kind::Computed(compute) = &self.kind else {
            unreachable!("only computed derivations recalculate");
        };
        trace!(id = %self.id, "recomputing derivation");

        let scope = TrackingScope::enter(self.id);
        let value = compute();
        let dependencies = scope.finish().into_nodes();

        self.replace_dependencies(dependencies);
        *self.value.borrow_mut() = Some(value.clone());
        self.state.set(DerivationState::Fresh);
        value
    }

    fn replace_dependencies(&self, next: IndexMap<DerivationId, Rc<dyn Node>>) {
        let added: Vec<Rc<dyn Node>> = {
            let current = self.dependencies.borrow();
            next.iter()
                .filter(|(id, _)| !current.contains_key(*id))
                .map(|(_, node)| Rc::clone(node))
                .collect()
        };
        let previous = std::mem::replace(&mut *self.dependencies.borrow_mut(), next);

        let this: Weak<dyn Node> = self.this.clone();
        for node in added {
            node.add_dependent(self.id, this.clone());
        }

        let removed: Vec<Rc<dyn Node>> = {
            let current = self.dependencies.borrow();
            previous
                .iter()
                .filter(|(id, _)| !current.contains_key(*id))
                .map(|(_, node)| Rc::clone(node))
                .collect()
        };
        for node in removed {
            node.remove_dependent(self.id);
        }
        drop(previous);
    }

    fn wants_hot(&self) -> bool {
        !self.dependents.borrow().is_empty() || self.listeners.has_listeners()
    }

    /// Subscribe or unsubscribe a source to match its demand.
    fn update_hotness(&self) {
        let Kind::Source { subscribe, get } = &self.kind else {
            return;
        };
        let wants_hot = self.wants_hot();
        let is_hot = self.source_subscription.borrow().is_some();

        if wants_hot && !is_hot {
            debug!(id = %self.id, "source derivation going hot");
            let node: Weak<dyn Node> = self.this.clone();
            let subscription = subscribe(Invalidator { node });
            *self.source_subscription.borrow_mut() = Some(subscription);
            let value = untracked(get);
            *self.value.borrow_mut() = Some(value);
            self.state.set(DerivationState::Fresh);
        } else if !wants_hot && is_hot {
            debug!(id = %self.id, "source derivation going cold");
            let subscription = self.source_subscription.borrow_mut().take();
            drop(subscription);
            self.value.borrow_mut().take();
            self.state.set(DerivationState::Uninitialized);
        }
    }
}

impl<V> Node for Inner<V>
where
    V: Clone + PartialEq + 'static,
{
    fn id(&self) -> DerivationId {
        self.id
    }

    fn add_dependent(&self, id: DerivationId, dependent: Weak<dyn Node>) {
        self.dependents.borrow_mut().insert(id, dependent);
        self.update_hotness();
    }

    fn remove_dependent(&self, id: DerivationId) {
        let removed = self.dependents.borrow_mut().shift_remove(&id);
        if removed.is_some() {
            self.update_hotness();
        }
    }

    fn mark_stale(&self, pending: &mut Vec<Rc<dyn Node>>) {
        if self.state.get() != DerivationState::Fresh || matches!(self.kind, Kind::Constant) {
            return;
        }
        self.state.set(DerivationState::Stale);
        trace!(id = %self.id, kind = self.kind.name(), "derivation marked stale");

        if self.listeners.has_listeners() {
            if let Some(this) = self.this.upgrade() {
                pending.push(this);
            }
        }

        let dependents: Vec<Rc<dyn Node>> = self
            .dependents
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for dependent in dependents {
            dependent.mark_stale(pending);
        }
    }

    fn refresh(&self) {
        if !self.listeners.has_listeners() {
            return;
        }
        let current = untracked(|| self.read());
        let changed = self.notified.borrow().as_ref() != Some(&current);
        if changed {
            *self.notified.borrow_mut() = Some(current.clone());
            self.listeners.emit(&current);
        }
    }
}

impl<V> Drop for Inner<V> {
    fn drop(&mut self) {
        let dependencies = std::mem::take(self.dependencies.get_mut());
        for node in dependencies.values() {
            node.remove_dependent(self.id);
        }
    }
}

impl<V> Debug for Derivation<V>
where
    V: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation")
            .field("id", &self.id())
            .field("kind", &self.inner.kind.name())
            .field("state", &self.state())
            .field("value", &*self.inner.value.borrow())
            .field("dependency_count", &self.dependency_count())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ValueBox;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (Rc::clone(&count), count)
    }

    #[test]
    fn derivation_computes_on_first_access() {
        let (calls, calls_in) = counter();
        let d = Derivation::new(move || {
            calls_in.set(calls_in.get() + 1);
            42
        });

        assert!(!d.has_value());
        assert_eq!(d.state(), DerivationState::Uninitialized);
        assert_eq!(calls.get(), 0);

        assert_eq!(d.get_value(), 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(d.state(), DerivationState::Fresh);
    }

    #[test]
    fn derivation_caches_value_when_fresh() {
        let (calls, calls_in) = counter();
        let d = Derivation::new(move || {
            calls_in.set(calls_in.get() + 1);
            42
        });

        assert_eq!(d.get_value(), 42);
        assert_eq!(d.get_value(), 42);
        assert_eq!(d.get_value(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn stale_derivation_recomputes_once_for_many_changes() {
        let source = ValueBox::new(1);
        let (calls, calls_in) = counter();
        let prism = source.derivation();
        let d = Derivation::new(move || {
            calls_in.set(calls_in.get() + 1);
            prism.get_value() * 10
        });

        assert_eq!(d.get_value(), 10);
        source.set(2);
        source.set(3);
        source.set(4);
        assert_eq!(d.state(), DerivationState::Stale);
        assert_eq!(calls.get(), 1);

        assert_eq!(d.get_value(), 40);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn map_and_flat_map_compose() {
        let a = ValueBox::new(1);
        let b = ValueBox::new(100);
        let use_b = ValueBox::new(false);

        let (a_d, b_d) = (a.derivation(), b.derivation());
        let picked = use_b
            .derivation()
            .flat_map(move |&flag| if flag { b_d.clone() } else { a_d.clone() });
        let doubled = picked.map(|v| v * 2);

        assert_eq!(doubled.get_value(), 2);
        use_b.set(true);
        assert_eq!(doubled.get_value(), 200);
        b.set(7);
        assert_eq!(doubled.get_value(), 14);
    }

    #[test]
    fn constant_is_never_stale_or_recorded() {
        let c = Derivation::constant(5);
        let c_in = c.clone();
        let d = Derivation::new(move || c_in.get_value() + 1);

        assert_eq!(d.get_value(), 6);
        assert_eq!(d.dependency_count(), 0);
        assert_eq!(c.state(), DerivationState::Fresh);
    }

    #[test]
    fn cold_source_reads_getter_directly() {
        let raw = Rc::new(Cell::new(1));
        let raw_in = Rc::clone(&raw);
        let emitter: Rc<Emitter<()>> = Rc::new(Emitter::new());
        let emitter_in = Rc::clone(&emitter);
        let source = Derivation::source(
            move |invalidator| emitter_in.tap(move |_| invalidator.invalidate()),
            move || raw_in.get(),
        );

        assert_eq!(source.get_value(), 1);
        raw.set(2);
        assert_eq!(source.get_value(), 2);
        assert!(!source.is_hot());
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn source_goes_hot_with_dependents_and_cold_without() {
        let b = ValueBox::new(1);
        let prism = b.derivation();
        let prism_in = prism.clone();
        let d = Derivation::new(move || prism_in.get_value());

        assert!(!prism.is_hot());
        d.get_value();
        assert!(prism.is_hot());
        assert_eq!(prism.dependent_count(), 1);

        drop(d);
        assert!(!prism.is_hot());
        assert_eq!(prism.state(), DerivationState::Uninitialized);
    }

    #[test]
    fn on_change_fires_only_for_new_values() {
        let b = ValueBox::new(1);
        let parity = b.derivation().map(|v| v % 2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = Rc::clone(&seen);
        let _sub = parity.on_change(move |v| seen_in.borrow_mut().push(*v));

        b.set(3);
        b.set(4);
        b.set(6);
        b.set(7);

        assert_eq!(*seen.borrow(), vec![0, 1]);
    }

    #[test]
    fn listener_sees_consistent_diamond() {
        let b = ValueBox::new(1);
        let left = b.derivation().map(|v| v + 1);
        let right = b.derivation().map(|v| v * 10);
        let (l, r) = (left.clone(), right.clone());
        let sum = Derivation::new(move || l.get_value() + r.get_value());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = Rc::clone(&seen);
        let _sub = sum.on_change(move |v| seen_in.borrow_mut().push(*v));

        b.set(2);
        b.set(3);

        assert_eq!(*seen.borrow(), vec![23, 34]);
    }

    #[test]
    fn unsubscribing_last_listener_stops_refreshes() {
        let b = ValueBox::new(1);
        let (calls, calls_in) = counter();
        let prism = b.derivation();
        let d = Derivation::new(move || {
            calls_in.set(calls_in.get() + 1);
            prism.get_value()
        });

        let sub = d.on_change(|_| {});
        assert_eq!(calls.get(), 1);
        b.set(2);
        assert_eq!(calls.get(), 2);

        sub.unsubscribe();
        b.set(3);
        b.set(4);
        assert_eq!(calls.get(), 2);
        assert_eq!(d.get_value(), 4);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn subscription_keeps_derivation_alive() {
        let b = ValueBox::new(1);
        let seen = Rc::new(Cell::new(0));
        let seen_in = Rc::clone(&seen);
        let sub = b.derivation().map(|v| v * 3).on_change(move |v| seen_in.set(*v));

        b.set(5);
        assert_eq!(seen.get(), 15);
        drop(sub);
        b.set(6);
        assert_eq!(seen.get(), 15);
    }

    #[test]
    fn weak_handle_upgrades_while_alive() {
        let d = Derivation::new(|| 1);
        let weak = d.downgrade();
        assert!(weak.upgrade().is_some_and(|up| up.ptr_eq(&d)));
        drop(d);
        assert!(weak.upgrade().is_none());
    }
}
