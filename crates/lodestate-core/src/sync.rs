//! Synchronized state cells
//!
//! Producers may notify from arbitrary threads. Every piece of mutable
//! reconciler state lives in one of these cells so that a read after a write
//! on the same instance always observes that write.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot` locks because:
//! 1. Critical sections are short, synchronous recombinations
//! 2. No lock is ever held across an `.await` point
//! 3. No I/O happens inside a lock scope, except the fire-and-forget
//!    persister call, which must stay ordered with emissions

use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;

/// Mutex-guarded value with closure-based access.
#[derive(Debug, Default)]
pub struct Synchronized<T> {
    value: Mutex<T>,
}

impl<T> Synchronized<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Run `f` with exclusive access to the value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.value.lock())
    }

    /// Mutate the value in place.
    pub fn modify(&self, mutate: impl FnOnce(&mut T)) {
        mutate(&mut self.value.lock());
    }

    /// Replace the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.lock(), value)
    }

    /// Set `value` only if `condition` holds for the current value.
    /// Returns whether the value was set.
    pub fn set_if(&self, value: T, condition: impl FnOnce(&T) -> bool) -> bool {
        let mut guard = self.value.lock();
        if condition(&guard) {
            *guard = value;
            true
        } else {
            false
        }
    }
}

impl<T: Clone> Synchronized<T> {
    /// Clone out the current value.
    pub fn get(&self) -> T {
        self.value.lock().clone()
    }
}

/// A serializing executor for read-modify-emit sequences.
///
/// [`SerialCell::step_then`] runs a mutation and then a follow-up (typically
/// an emission) as one atomic unit with respect to other threads. The lock is
/// reentrant so a downstream observer that synchronously feeds back into the
/// same instance does not deadlock; the mutable borrow is released before the
/// follow-up runs.
pub struct SerialCell<T> {
    state: ReentrantMutex<RefCell<T>>,
}

impl<T> SerialCell<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(value)),
        }
    }

    /// Mutate with `step`, then run `then` on its output while still
    /// holding the serializing lock.
    pub fn step_then<R, O>(
        &self,
        step: impl FnOnce(&mut T) -> R,
        then: impl FnOnce(R) -> O,
    ) -> O {
        let guard = self.state.lock();
        let output = {
            let mut state = guard.borrow_mut();
            step(&mut state)
        };
        then(output)
    }

    /// Read the value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.state.lock();
        let state = guard.borrow();
        f(&state)
    }
}

impl<T: Default> Default for SerialCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_synchronized_with_and_get() {
        let cell = Synchronized::new(1);
        let doubled = cell.with(|v| {
            *v *= 2;
            *v
        });
        assert_eq!(doubled, 2);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_synchronized_set_if() {
        let cell = Synchronized::new(false);
        assert!(cell.set_if(true, |current| !*current));
        assert!(!cell.set_if(true, |current| !*current));
        assert!(cell.get());
    }

    #[test]
    fn test_synchronized_replace() {
        let cell = Synchronized::new("a");
        assert_eq!(cell.replace("b"), "a");
        assert_eq!(cell.get(), "b");
    }

    #[test]
    fn test_synchronized_concurrent_modify() {
        let cell = Arc::new(Synchronized::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.modify(|v| *v += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.get(), 8000);
    }

    #[test]
    fn test_serial_cell_step_then_sees_step_output() {
        let cell = SerialCell::new(Vec::new());
        let len = cell.step_then(
            |v| {
                v.push(1);
                v.len()
            },
            |len| len * 10,
        );
        assert_eq!(len, 10);
        assert_eq!(cell.with(Vec::len), 1);
    }

    #[test]
    fn test_serial_cell_reentrant_follow_up() {
        let cell = SerialCell::new(0);
        cell.step_then(
            |v| *v += 1,
            |()| {
                // Nested step from the follow-up of the outer step.
                cell.step_then(|v| *v += 1, |()| ());
            },
        );
        assert_eq!(cell.with(|v| *v), 2);
    }
}
