//! Identifiers for graph nodes and emitter listeners.
//!
//! Every derivation gets a [`DerivationId`] when created. Ids are used as
//! keys for dependency and dependent edges so that a node can be removed
//! from another node's edge set without comparing trait objects.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a derivation.
///
/// Allocated from a process-wide counter, so ids never collide even when
/// derivations are created on different threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DerivationId(u64);

impl DerivationId {
    /// Allocate a fresh id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for DerivationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DerivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d#{}", self.0)
    }
}

/// Identifier of a listener registered on an [`Emitter`](super::Emitter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_ids_are_unique() {
        let id1 = DerivationId::new();
        let id2 = DerivationId::new();
        let id3 = DerivationId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn derivation_ids_increase() {
        let a = DerivationId::new();
        let b = DerivationId::new();
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn display_prefixes_id() {
        let id = DerivationId::new();
        assert_eq!(id.to_string(), format!("d#{}", id.raw()));
    }
}
