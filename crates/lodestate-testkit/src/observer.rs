//! Observer that records everything it sees

use lodestate_core::Observer;
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every observed value in order.
pub struct RecordingObserver<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> RecordingObserver<T> {
    /// Empty recorder.
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Observer callback appending to this recorder.
    pub fn observer(&self) -> Observer<T> {
        let seen = Arc::clone(&self.seen);
        Arc::new(move |value: &T| seen.lock().push(value.clone()))
    }

    /// Everything observed so far.
    pub fn values(&self) -> Vec<T> {
        self.seen.lock().clone()
    }

    /// Most recent value.
    pub fn last(&self) -> Option<T> {
        self.seen.lock().last().cloned()
    }

    /// Number of observed values.
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Whether nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything observed so far.
    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl<T: Clone + Send + 'static> Default for RecordingObserver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RecordingObserver<T> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}
