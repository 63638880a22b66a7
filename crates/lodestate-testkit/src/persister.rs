//! In-memory persister recording every call

use lodestate_core::{
    LodestateError, ResourceError, ResourceParams, ResourceState, ResourceValue,
    Result, StatePersister,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Keeps the last persisted state in memory and counts calls.
pub struct RecordingPersister<V, P, E> {
    stored: Mutex<Option<ResourceState<V, P, E>>>,
    persisted: Mutex<Vec<ResourceState<V, P, E>>>,
    loads: AtomicUsize,
    purges: AtomicUsize,
    fail_loads: AtomicBool,
}

impl<V, P, E> RecordingPersister<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Empty persister.
    pub fn new() -> Self {
        Self {
            stored: Mutex::new(None),
            persisted: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
            purges: AtomicUsize::new(0),
            fail_loads: AtomicBool::new(false),
        }
    }

    /// Persister pre-populated with `state`.
    pub fn with_stored(state: ResourceState<V, P, E>) -> Self {
        let persister = Self::new();
        *persister.stored.lock() = Some(state);
        persister
    }

    /// Number of `persist` calls.
    pub fn persist_count(&self) -> usize {
        self.persisted.lock().len()
    }

    /// Every state passed to `persist`, in order.
    pub fn persisted(&self) -> Vec<ResourceState<V, P, E>> {
        self.persisted.lock().clone()
    }

    /// Number of `load` calls.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `purge` calls.
    pub fn purge_count(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    /// Make subsequent `load` calls fail with a storage error.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }
}

impl<V, P, E> Default for RecordingPersister<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, P, E> StatePersister<V, P, E> for RecordingPersister<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn persist(&self, state: &ResourceState<V, P, E>) -> Result<()> {
        self.persisted.lock().push(state.clone());
        *self.stored.lock() = Some(state.clone());
        Ok(())
    }

    fn load(&self, params: &P) -> Result<Option<ResourceState<V, P, E>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(LodestateError::storage("recording persister set to fail"));
        }
        let stored = self.stored.lock();
        Ok(stored
            .as_ref()
            .filter(|state| {
                state
                    .load_request()
                    .is_some_and(|request| request.params().is_cache_compatible(params))
            })
            .cloned())
    }

    fn purge(&self) -> Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        *self.stored.lock() = None;
        Ok(())
    }
}
