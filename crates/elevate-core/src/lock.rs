//! Exclusive-Operation Lock
//!
//! Single-slot mutual exclusion for one category of async operation
//! (payment reconciliation, portal handoff). `try_acquire` either hands
//! back a guard or signals "already in progress"; the second caller is
//! dropped, never queued. The guard releases on drop, so success and
//! failure paths both unlock.

use std::cell::Cell;
use std::rc::Rc;

/// Single-slot lock for one operation category
#[derive(Clone, Default)]
pub struct OpLock {
    busy: Rc<Cell<bool>>,
}

impl OpLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusively, or `None` if an operation is already in flight
    pub fn try_acquire(&self) -> Option<OpGuard> {
        if self.busy.get() {
            return None;
        }
        self.busy.set(true);
        Some(OpGuard {
            busy: Rc::clone(&self.busy),
        })
    }

    pub fn is_locked(&self) -> bool {
        self.busy.get()
    }
}

/// Held for the duration of the exclusive operation
pub struct OpGuard {
    busy: Rc<Cell<bool>>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

/// Cooperative cancellation flag tied to a view or session lifetime.
///
/// An operation checks it after each suspension point; once cancelled, no
/// further state writes are applied.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let lock = OpLock::new();

        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_locked());
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_release_on_failure_path() {
        let lock = OpLock::new();

        let result: Result<(), ()> = (|| {
            let _guard = lock.try_acquire().unwrap();
            Err(())
        })();

        assert!(result.is_err());
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let observer = token.clone();

        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
