//! Fan-out of values to registered observers

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::subscription::Subscription;
use super::{Observable, Observer};

struct BroadcastInner<T> {
    observers: Mutex<Vec<(u64, Observer<T>)>>,
    next_id: AtomicU64,
}

/// Synchronous multicast to a set of observers.
///
/// Observers are keyed by a monotonically increasing id, so registration
/// never collides and removal through a [`Subscription`] is exact. Emission
/// iterates a snapshot of the observer list, so observers may subscribe or
/// unsubscribe from inside a callback.
pub struct Broadcast<T> {
    inner: Arc<BroadcastInner<T>>,
}

impl<T> Broadcast<T> {
    /// Broadcast with no observers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BroadcastInner {
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register an observer.
    pub fn subscribe(&self, observer: Observer<T>) -> Subscription
    where
        T: 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().push((id, observer));

        let weak: Weak<BroadcastInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.observers.lock().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Deliver `value` to every observer registered at call time.
    ///
    /// An `emit` from inside an observer is delivered at once, ahead of the
    /// rest of the outer delivery. [`Property`](super::Property) queues
    /// nested values instead and keeps one delivery order.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in snapshot {
            observer(value);
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

impl<T> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Observable<T> for Broadcast<T> {
    fn observe(&self, observer: Observer<T>) -> Subscription {
        self.subscribe(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<i32>>>, Observer<i32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Arc::new(move |v: &i32| sink.lock().push(*v)))
    }

    #[test]
    fn test_emit_reaches_all_observers() {
        let broadcast = Broadcast::new();
        let (a, obs_a) = recorder();
        let (b, obs_b) = recorder();
        let _sub_a = broadcast.subscribe(obs_a);
        let _sub_b = broadcast.subscribe(obs_b);

        broadcast.emit(&1);
        broadcast.emit(&2);

        assert_eq!(*a.lock(), vec![1, 2]);
        assert_eq!(*b.lock(), vec![1, 2]);
    }

    #[test]
    fn test_cancel_removes_only_that_observer() {
        let broadcast = Broadcast::new();
        let (a, obs_a) = recorder();
        let (b, obs_b) = recorder();
        let sub_a = broadcast.subscribe(obs_a);
        let _sub_b = broadcast.subscribe(obs_b);

        drop(sub_a);
        broadcast.emit(&7);

        assert!(a.lock().is_empty());
        assert_eq!(*b.lock(), vec![7]);
        assert_eq!(broadcast.observer_count(), 1);
    }

    #[test]
    fn test_subscription_outliving_broadcast() {
        let broadcast = Broadcast::<i32>::new();
        let (_, obs) = recorder();
        let sub = broadcast.subscribe(obs);
        drop(broadcast);
        drop(sub);
    }

    #[test]
    fn test_unsubscribe_during_emit() {
        let broadcast = Broadcast::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let slot_in = Arc::clone(&slot);
        let calls_in = Arc::clone(&calls);
        let sub = broadcast.subscribe(Arc::new(move |_: &i32| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            slot_in.lock().take();
        }));
        *slot.lock() = Some(sub);

        broadcast.emit(&1);
        broadcast.emit(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
