//! # Observation Plumbing
//!
//! Push-based, synchronous observation used to wire producers, reconcilers
//! and consumers together.
//!
//! - [`Observable`]: anything that can be observed, returning a [`Subscription`].
//! - [`Broadcast`]: fan-out to the observers registered at emission time.
//! - [`Property`]: a current value that is replayed to new observers.
//! - [`Subscription`] / [`SubscriptionBag`]: RAII observation handles. There
//!   is no global registry; dropping the handle ends the observation.

mod broadcast;
mod property;
mod subscription;

pub use broadcast::Broadcast;
pub use property::Property;
pub use subscription::{Subscription, SubscriptionBag};

use std::sync::Arc;

/// Callback invoked with every observed value.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A source of values that observers can attach to.
pub trait Observable<T>: Send + Sync {
    /// Register `observer`. Observation lasts until the returned
    /// subscription is cancelled or dropped.
    fn observe(&self, observer: Observer<T>) -> Subscription;

    /// Register a closure as observer.
    fn observe_with<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
        Self: Sized,
    {
        self.observe(Arc::new(f))
    }
}

impl<T, O> Observable<T> for Arc<O>
where
    O: Observable<T> + ?Sized,
{
    fn observe(&self, observer: Observer<T>) -> Subscription {
        (**self).observe(observer)
    }
}
