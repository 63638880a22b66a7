//! Cache producer backed by a [`StatePersister`]

use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use lodestate_core::{
    LoadRequest, Observable, Observer, Property, ResourceError, ResourceParams, ResourceState,
    ResourceValue, SerialCell, StatePersister, Subscription,
};

/// Emits the persisted state for every load request.
///
/// When nothing compatible is stored (or loading fails) it emits
/// `Error(cache_miss_error, request)`, which reconcilers ignore because it
/// carries no value.
pub struct PersistedCacheSource<V, P, E> {
    persister: Arc<dyn StatePersister<V, P, E>>,
    cache_miss_error: E,
    loads: SerialCell<u64>,
    output: Property<ResourceState<V, P, E>>,
}

impl<V, P, E> PersistedCacheSource<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Source reading from `persister`.
    pub fn new(persister: Arc<dyn StatePersister<V, P, E>>, cache_miss_error: E) -> Self {
        Self {
            persister,
            cache_miss_error,
            loads: SerialCell::new(0),
            output: Property::new(ResourceState::not_ready()),
        }
    }

    /// Load the cached state for `request` and emit it.
    pub fn on_request(&self, request: &LoadRequest<P>) {
        self.loads.step_then(
            |loads| {
                *loads += 1;
                self.load_state(request)
            },
            |state| self.output.set(state),
        );
    }

    /// Latest emitted state.
    pub fn state(&self) -> ResourceState<V, P, E> {
        self.output.get()
    }

    /// Number of cache reads so far.
    pub fn load_count(&self) -> u64 {
        self.loads.with(|loads| *loads)
    }

    /// Read the cache for every request of `requests`.
    pub fn attach(self: &Arc<Self>, requests: &dyn Observable<LoadRequest<P>>) -> Subscription {
        let weak: Weak<Self> = Arc::downgrade(self);
        requests.observe(Arc::new(move |request: &LoadRequest<P>| {
            if let Some(source) = weak.upgrade() {
                source.on_request(request);
            }
        }))
    }

    fn load_state(&self, request: &LoadRequest<P>) -> ResourceState<V, P, E> {
        match self.persister.load(request.params()) {
            Ok(Some(state)) => {
                debug!(request = %request.identity(), "cache hit");
                state
            }
            Ok(None) => {
                debug!(request = %request.identity(), "cache miss");
                self.miss(request)
            }
            Err(error) => {
                warn!(%error, request = %request.identity(), "failed to load cached state");
                self.miss(request)
            }
        }
    }

    fn miss(&self, request: &LoadRequest<P>) -> ResourceState<V, P, E> {
        ResourceState::error(self.cache_miss_error.clone(), request.clone(), None)
    }
}

impl<V, P, E> Observable<ResourceState<V, P, E>> for PersistedCacheSource<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn observe(&self, observer: Observer<ResourceState<V, P, E>>) -> Subscription {
        self.output.observe(observer)
    }
}
