//! Primary producer running an async loader per load request

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use lodestate_core::{
    LoadRequest, Observable, Observer, Property, ResourceError, ResourceParams, ResourceState,
    ResourceValue, SerialCell, Subscription, ValueBox,
};

use crate::tasks::TaskRegistry;

/// Future produced by a [`Loader`].
pub type LoadFuture<V, E> = BoxFuture<'static, std::result::Result<V, E>>;

/// Async function loading the resource for a request.
pub type Loader<V, P, E> = Arc<dyn Fn(LoadRequest<P>) -> LoadFuture<V, E> + Send + Sync>;

struct LoaderInner<V, P, E> {
    loader: Loader<V, P, E>,
    /// Incremented per request; a result is emitted only while its
    /// generation is still current.
    generation: SerialCell<u64>,
    in_flight: Mutex<Option<AbortHandle>>,
    output: Property<ResourceState<V, P, E>>,
    tasks: TaskRegistry,
}

/// For every load request, emits `Loading(request)`, runs the loader and
/// emits `Value` or `Error` for that request.
///
/// The latest request wins: a new request aborts the in-flight load, and a
/// superseded load never emits its result.
pub struct LoaderSource<V, P, E> {
    inner: Arc<LoaderInner<V, P, E>>,
}

impl<V, P, E> LoaderSource<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Source spawning loads on `runtime`.
    pub fn new(loader: Loader<V, P, E>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                loader,
                generation: SerialCell::new(0),
                in_flight: Mutex::new(None),
                output: Property::new(ResourceState::not_ready()),
                tasks: TaskRegistry::new(runtime),
            }),
        }
    }

    /// Start loading for `request`, superseding any in-flight load.
    pub fn on_request(&self, request: &LoadRequest<P>) {
        LoaderInner::start(&self.inner, request);
    }

    /// Latest emitted state.
    pub fn state(&self) -> ResourceState<V, P, E> {
        self.inner.output.get()
    }

    /// Handle to the output stream.
    pub fn states(&self) -> Property<ResourceState<V, P, E>> {
        self.inner.output.clone()
    }

    /// Number of loads still running.
    pub fn in_flight_loads(&self) -> usize {
        self.inner.tasks.active_tasks()
    }

    /// Load for every request of `requests`.
    pub fn attach(&self, requests: &dyn Observable<LoadRequest<P>>) -> Subscription {
        let weak: Weak<LoaderInner<V, P, E>> = Arc::downgrade(&self.inner);
        requests.observe(Arc::new(move |request: &LoadRequest<P>| {
            if let Some(inner) = weak.upgrade() {
                LoaderInner::start(&inner, request);
            }
        }))
    }
}

impl<V, P, E> LoaderInner<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn start(this: &Arc<Self>, request: &LoadRequest<P>) {
        this.generation.step_then(
            |generation| {
                *generation += 1;
                *generation
            },
            |generation| {
                let load = (this.loader)(request.clone());
                let weak = Arc::downgrade(this);
                let pending = request.clone();
                let handle = this.tasks.spawn_cancellable(async move {
                    let result = load.await;
                    if let Some(inner) = weak.upgrade() {
                        inner.finish(generation, pending, result);
                    }
                });
                // Stored before `Loading` is published: an observer may start
                // the next load from that emission and must be able to abort
                // this one.
                if let Some(previous) = this.in_flight.lock().replace(handle) {
                    previous.abort();
                    debug!("aborted superseded load");
                }
                this.output
                    .set(ResourceState::loading(request.clone(), None, None));
            },
        );
    }

    fn finish(&self, generation: u64, request: LoadRequest<P>, result: std::result::Result<V, E>) {
        self.generation.step_then(
            |current| *current == generation,
            |is_current| {
                if !is_current {
                    trace!(request = %request.identity(), "dropping result of superseded load");
                    return;
                }
                let state = match result {
                    Ok(value) => ResourceState::value(ValueBox::new(value), request, None),
                    Err(error) => ResourceState::error(error, request, None),
                };
                trace!(state = %state.provisioning_state(), "load finished");
                self.output.set(state);
            },
        );
    }
}

impl<V, P, E> Clone for LoaderSource<V, P, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, P, E> Observable<ResourceState<V, P, E>> for LoaderSource<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn observe(&self, observer: Observer<ResourceState<V, P, E>>) -> Subscription {
        self.inner.output.observe(observer)
    }
}
