//! Property<T> - a current value with push-based change notification
//!
//! `Property<T>` holds the latest value of a stream. New observers are handed
//! the current value immediately and every later `set()` afterwards, so a
//! late subscriber never misses the state it should render.
//!
//! A `set()` issued by an observer while a value is being delivered is
//! queued and delivered after the current value has reached every observer.
//! All observers therefore see values in store order and end on the stored
//! value.

use parking_lot::{ReentrantMutex, RwLock};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::broadcast::Broadcast;
use super::subscription::Subscription;
use super::{Observable, Observer};

struct PropertyInner<T> {
    value: RwLock<T>,
    /// Incremented on each `set()`.
    version: AtomicU64,
    /// Serializes store-then-notify so observers see updates in store order.
    emitting: ReentrantMutex<RefCell<Delivery<T>>>,
    observers: Broadcast<T>,
}

/// Values stored but not yet delivered, and whether a delivery loop is
/// running on the thread holding `emitting`.
struct Delivery<T> {
    draining: bool,
    pending: VecDeque<T>,
}

impl<T> Default for Delivery<T> {
    fn default() -> Self {
        Self {
            draining: false,
            pending: VecDeque::new(),
        }
    }
}

/// Ends a delivery loop, also when an observer panics.
struct DrainGuard<'a, T> {
    delivery: &'a RefCell<Delivery<T>>,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        let mut delivery = self.delivery.borrow_mut();
        delivery.draining = false;
        delivery.pending.clear();
    }
}

/// A replaying observable value.
///
/// # Thread Safety
///
/// `Property<T>` is `Send + Sync`. Concurrent `set()` calls are serialized:
/// the stored value and the order in which observers receive values always
/// agree. An observer may call `set()` on the same property from its
/// callback; the nested value is stored at once and delivered, in order,
/// before the outermost `set()` returns.
pub struct Property<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    /// Create a property holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                emitting: ReentrantMutex::new(RefCell::new(Delivery::default())),
                observers: Broadcast::new(),
            }),
        }
    }

    /// Clone out the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Number of `set()` calls so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Store `value` and notify observers.
    pub fn set(&self, value: T) {
        let serial = self.inner.emitting.lock();
        *self.inner.value.write() = value.clone();
        self.inner.version.fetch_add(1, Ordering::Release);

        {
            let mut delivery = serial.borrow_mut();
            delivery.pending.push_back(value);
            if delivery.draining {
                return;
            }
            delivery.draining = true;
        }

        let _guard = DrainGuard { delivery: &*serial };
        self.deliver_pending(&*serial);
    }

    fn deliver_pending(&self, delivery: &RefCell<Delivery<T>>) {
        loop {
            let next = delivery.borrow_mut().pending.pop_front();
            match next {
                Some(next) => self.inner.observers.emit(&next),
                None => break,
            }
        }
    }

    /// Replace the value using a function of the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let _serial = self.inner.emitting.lock();
        let next = f(&self.inner.value.read());
        self.set(next);
    }

    /// Register `observer` for later values only, without replay.
    pub fn subscribe(&self, observer: Observer<T>) -> Subscription {
        self.inner.observers.subscribe(observer)
    }

    /// Derived property kept in sync with this one while the returned
    /// subscription is alive.
    pub fn map<U, F>(&self, f: F) -> (Property<U>, Subscription)
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let _serial = self.inner.emitting.lock();
        let derived = Property::new(f(&self.inner.value.read()));
        let target = derived.clone();
        let link = self
            .inner
            .observers
            .subscribe(Arc::new(move |value: &T| target.set(f(value))));
        (derived, link)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.observer_count()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> for Property<T> {
    fn observe(&self, observer: Observer<T>) -> Subscription {
        let serial = self.inner.emitting.lock();
        let (queued, draining) = {
            let delivery = serial.borrow();
            (!delivery.pending.is_empty(), delivery.draining)
        };
        // Queued values end with the stored one; the new observer receives
        // them in order instead of a replay.
        if queued {
            return self.inner.observers.subscribe(observer);
        }
        if draining {
            observer(&self.get());
            return self.inner.observers.subscribe(observer);
        }

        // Values set from inside the replay are queued until the observer
        // is registered, then delivered to everyone.
        serial.borrow_mut().draining = true;
        let _guard = DrainGuard { delivery: &*serial };
        observer(&self.get());
        let subscription = self.inner.observers.subscribe(observer);
        self.deliver_pending(&*serial);
        subscription
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .field("version", &self.version())
            .finish()
    }
}
