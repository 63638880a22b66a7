//! Subscription handles

use parking_lot::Mutex;
use std::fmt;

/// Handle to an active observation.
///
/// Dropping the handle (or calling [`Subscription::cancel`]) removes the
/// observer. Cancelling twice is a no-op.
#[must_use = "dropping a Subscription immediately cancels the observation"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Subscription that runs `cancel` once when cancelled or dropped.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Subscription with nothing to cancel.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Cancel the observation.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether the observation is still registered.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Keep the observation alive for the lifetime of its source.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A collection of subscriptions cancelled together.
#[derive(Debug, Default)]
pub struct SubscriptionBag {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionBag {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a subscription.
    pub fn add(&self, subscription: Subscription) {
        self.subscriptions.lock().push(subscription);
    }

    /// Number of held subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Whether the bag holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel and release every held subscription.
    pub fn cancel_all(&self) {
        // Cancel outside the lock; cancellation may drop observers that own bags.
        let drained: Vec<Subscription> = std::mem::take(&mut *self.subscriptions.lock());
        drop(drained);
    }
}

impl From<SubscriptionBag> for Subscription {
    fn from(bag: SubscriptionBag) -> Self {
        Subscription::new(move || bag.cancel_all())
    }
}

impl Extend<Subscription> for SubscriptionBag {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.get_mut().extend(iter);
    }
}
