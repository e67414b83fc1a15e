//! Lockable values.
//!
//! A [`Lockable`] holds an underlying value that can be temporarily
//! overridden. While a [`LockHandle`] is alive, [`Lockable::derivation`]
//! yields the locked value; once the handle is released it falls back to the
//! underlying one. Only one lock may be held at a time.

use std::fmt::{self, Debug};

use tracing::debug;

use crate::error::{DataverseError, Result};
use crate::reactive::{Derivation, ValueBox};

pub struct Lockable<V> {
    unlocked: ValueBox<V>,
    locked: ValueBox<Option<V>>,
    derivation: Derivation<V>,
}

impl<V> Lockable<V>
where
    V: Clone + PartialEq + 'static,
{
    pub fn new(value: V) -> Self {
        let unlocked = ValueBox::new(value);
        let locked: ValueBox<Option<V>> = ValueBox::new(None);

        let (unlocked_source, locked_source) = (unlocked.derivation(), locked.derivation());
        let derivation = Derivation::new(move || match locked_source.get_value() {
            Some(value) => value,
            None => unlocked_source.get_value(),
        });

        Self {
            unlocked,
            locked,
            derivation,
        }
    }

    /// Set the underlying value. Visible once no lock is held.
    pub fn set(&self, value: V) {
        self.unlocked.set(value);
    }

    /// The effective value. Never tracked.
    pub fn get(&self) -> V {
        self.locked.get().unwrap_or_else(|| self.unlocked.get())
    }

    /// The underlying value, ignoring any lock.
    pub fn unlocked(&self) -> V {
        self.unlocked.get()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get().is_some()
    }

    /// Override the value with `value` until the returned handle is
    /// released.
    pub fn lock(&self, value: V) -> Result<LockHandle<V>> {
        if self.is_locked() {
            return Err(DataverseError::AlreadyLocked);
        }
        debug!("lock acquired");
        self.locked.set(Some(value));
        Ok(LockHandle {
            locked: self.locked.clone(),
        })
    }

    /// The effective value as a derivation.
    pub fn derivation(&self) -> Derivation<V> {
        self.derivation.clone()
    }

    pub fn unlocked_derivation(&self) -> Derivation<V> {
        self.unlocked.derivation()
    }

    pub fn is_locked_derivation(&self) -> Derivation<bool> {
        self.locked.derivation().map(Option::is_some)
    }
}

impl<V> Debug for Lockable<V>
where
    V: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lockable")
            .field("unlocked", &self.unlocked.get())
            .field("locked", &self.locked.get())
            .finish()
    }
}

/// A held lock. Dropping it unlocks.
#[must_use = "dropping the handle releases the lock immediately"]
pub struct LockHandle<V>
where
    V: Clone + PartialEq + 'static,
{
    locked: ValueBox<Option<V>>,
}

impl<V> LockHandle<V>
where
    V: Clone + PartialEq + 'static,
{
    /// Replace the locked value.
    pub fn relock(&self, value: V) {
        self.locked.set(Some(value));
    }

    /// The locked value.
    pub fn value(&self) -> Option<V> {
        self.locked.get()
    }

    pub fn unlock(self) {}
}

impl<V> Drop for LockHandle<V>
where
    V: Clone + PartialEq + 'static,
{
    fn drop(&mut self) {
        debug!("lock released");
        self.locked.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn lock_overrides_until_released() {
        let range = Lockable::new((0, 10));
        let effective = range.derivation();
        assert_eq!(effective.get_value(), (0, 10));

        let handle = range.lock((2, 4)).unwrap();
        assert_eq!(effective.get_value(), (2, 4));
        assert!(range.is_locked());

        range.set((0, 20));
        assert_eq!(effective.get_value(), (2, 4));
        assert_eq!(range.unlocked(), (0, 20));

        handle.relock((3, 5));
        assert_eq!(range.get(), (3, 5));

        handle.unlock();
        assert_eq!(effective.get_value(), (0, 20));
        assert!(!range.is_locked());
    }

    #[test]
    fn double_lock_is_rejected() {
        let value = Lockable::new(1);
        let _held = value.lock(2).unwrap();
        assert_eq!(value.lock(3).err(), Some(DataverseError::AlreadyLocked));
    }

    #[test]
    fn relocking_after_release_works() {
        let value = Lockable::new(1);
        drop(value.lock(2).unwrap());
        let handle = value.lock(3).unwrap();
        assert_eq!(handle.value(), Some(3));
    }

    #[test]
    fn listeners_see_lock_transitions() {
        let value = Lockable::new("a".to_string());
        let locked = value.is_locked_derivation();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = locked.on_change(move |flag| sink.borrow_mut().push(*flag));

        let handle = value.lock("b".to_string()).unwrap();
        handle.unlock();
        assert_eq!(*seen.borrow(), vec![true, false]);
    }
}
