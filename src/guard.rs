//! Share registers: mutual exclusion around mutable channel state.
//!
//! Every channel whose state can be touched by a concurrent `write` and `read` keeps that
//! state in a [`ShareRegister`]. Sections are short and never block on I/O; a kind that
//! needs to dispatch to other channels first collects what it wants to send, drops the
//! guard, then sends. Release is scoped, so an early return can never leak a held lock.

use parking_lot::{Mutex, MutexGuard};
use std::fmt;

/// A value behind a short-section lock.
pub struct ShareRegister<T> {
    slot: Mutex<T>,
}

impl<T> ShareRegister<T> {
    /// Wrap `value`.
    pub const fn new(value: T) -> Self {
        ShareRegister {
            slot: Mutex::new(value),
        }
    }

    /// Acquire the register. The guard releases on drop.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.slot.lock()
    }

    /// Swap in a new value and return the old one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.slot.lock(), value)
    }
}

impl<T: Clone> ShareRegister<T> {
    /// Copy of the current value, taken under the lock.
    pub fn snapshot(&self) -> T {
        self.slot.lock().clone()
    }
}

impl<T: Default> Default for ShareRegister<T> {
    fn default() -> Self {
        ShareRegister::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ShareRegister<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot.try_lock() {
            Some(value) => f.debug_tuple("ShareRegister").field(&*value).finish(),
            None => f.write_str("ShareRegister(<held>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_releases_on_scope_exit() {
        let register = ShareRegister::new(1u32);
        {
            let mut guard = register.lock();
            *guard += 1;
            assert_eq!(format!("{register:?}"), "ShareRegister(<held>)");
        }
        assert_eq!(format!("{register:?}"), "ShareRegister(2)");
        assert_eq!(register.snapshot(), 2);
    }

    #[test]
    fn replace_returns_previous_value() {
        let register = ShareRegister::new(String::from("old"));
        assert_eq!(register.replace("new".into()), "old");
        assert_eq!(register.snapshot(), "new");
    }

    #[test]
    fn concurrent_writers_never_tear_pairs() {
        let register = ShareRegister::new((0u64, 0u64));
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for i in 0..1_000u64 {
                        register.replace((i, i));
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..1_000 {
                    let (a, b) = register.snapshot();
                    assert_eq!(a, b);
                }
            });
        });
    }
}
