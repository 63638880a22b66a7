//! Datasource facade
//!
//! Wires a load request emitter, the loader and cache sources, optional
//! fallback retention on the loader stream and the dual-source reconciler
//! (with persistence) into a single observable resource:
//!
//! ```text
//! emitter ──► LoaderSource ──► FallbackRetention ──┐
//!    │                                             ├──► DualSourceReconciler ──► output
//!    ├──────► PersistedCacheSource ────────────────┘            ▲
//!    └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Retention sits on the primary side so a refresh keeps showing the last
//! loaded value, while the cache still fills in when nothing was loaded yet.
//!
//! The datasource owns every subscription and task of the pipeline. Dropping
//! it tears the whole graph down.

use futures::future::{self, Either, FutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use lodestate_core::{
    DualSourceReconciler, FallbackRetentionReconciler, Issuer, LatestResult, LoadRequest,
    LodestateConfig, LodestateError, Observable, Observer, Property, RequestType, ResourceError,
    ResourceParams, ResourceState, ResourceValue, Result, StatePersister, Subscription,
    SubscriptionBag,
};

use crate::cache_source::PersistedCacheSource;
use crate::config::{DatasourceConfig, RetentionMode};
use crate::emitter::{LoadRequestEmitter, RecurringLoadRequestEmitter, SimpleLoadRequestEmitter};
use crate::loader_source::{Loader, LoaderSource};

/// Builder for [`Datasource`].
pub struct DatasourceBuilder<V, P, E> {
    loader: Loader<V, P, E>,
    persistence: Option<(Arc<dyn StatePersister<V, P, E>>, E)>,
    initial_request: Option<LoadRequest<P>>,
    config: DatasourceConfig,
    runtime: Option<Handle>,
}

impl<V, P, E> DatasourceBuilder<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Start building a datasource loading through `loader`.
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn(LoadRequest<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        Self {
            loader: Arc::new(move |request| loader(request).boxed()),
            persistence: None,
            initial_request: None,
            config: DatasourceConfig::default(),
            runtime: None,
        }
    }

    /// Serve cached states from `persister` while loading and persist every
    /// successful load. `cache_miss_error` is emitted by the cache source
    /// when nothing compatible is stored.
    pub fn persister(
        mut self,
        persister: Arc<dyn StatePersister<V, P, E>>,
        cache_miss_error: E,
    ) -> Self {
        self.persistence = Some((persister, cache_miss_error));
        self
    }

    /// Request emitted as soon as the datasource is built.
    pub fn initial_request(mut self, request: LoadRequest<P>) -> Self {
        self.initial_request = Some(request);
        self
    }

    /// Replace the configuration.
    pub fn config(mut self, config: DatasourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime for loads and timers. Defaults to the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validate the configuration and wire the pipeline.
    pub fn build(self) -> Result<Datasource<V, P, E>> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                LodestateError::internal(format!("Datasource requires a tokio runtime: {e}"))
            })?,
        };

        let recurring = self.config.recurring_interval().map(|interval| {
            Arc::new(RecurringLoadRequestEmitter::new(
                self.initial_request.clone(),
                Some(interval),
                runtime.clone(),
            ))
        });
        let emitter: Arc<dyn LoadRequestEmitter<P>> = match &recurring {
            Some(recurring) => Arc::clone(recurring) as Arc<dyn LoadRequestEmitter<P>>,
            None => Arc::new(SimpleLoadRequestEmitter::new(self.initial_request)),
        };

        let loader = LoaderSource::new(self.loader, runtime);
        let mut dual = DualSourceReconciler::with_config(self.config.reconciler.clone());
        let cache = match self.persistence {
            Some((persister, cache_miss_error)) => {
                dual = dual.with_persister(Arc::clone(&persister));
                Some(Arc::new(PersistedCacheSource::new(
                    persister,
                    cache_miss_error,
                )))
            }
            None => None,
        };
        let dual = Arc::new(dual);
        let retention = match self.config.retention {
            RetentionMode::Combine => Some(Arc::new(FallbackRetentionReconciler::with_config(
                self.config.reconciler.clone(),
            ))),
            RetentionMode::None => None,
        };

        // Downstream stages attach first so every stage sees a request
        // before the states produced for it.
        let subscriptions = SubscriptionBag::new();
        if let Some(retention) = &retention {
            subscriptions.add(retention.attach(&loader));
        }
        let primary_input: &dyn Observable<ResourceState<V, P, E>> = match &retention {
            Some(retention) => retention.as_ref(),
            None => &loader,
        };
        let no_cache = Property::new(ResourceState::not_ready());
        let cache_input: &dyn Observable<ResourceState<V, P, E>> = match &cache {
            Some(cache) => cache.as_ref(),
            None => &no_cache,
        };
        subscriptions.add(dual.attach(primary_input, cache_input, &emitter).into());
        if let Some(cache) = &cache {
            subscriptions.add(cache.attach(&emitter));
        }
        subscriptions.add(loader.attach(&emitter));

        info!(
            retention = %self.config.retention,
            persistence = cache.is_some(),
            recurring = recurring.is_some(),
            "datasource built"
        );

        Ok(Datasource {
            emitter,
            recurring,
            loader,
            cache,
            dual,
            retention,
            subscriptions,
        })
    }
}

/// Tracks one refresh until a load it started (or a later one) completes.
///
/// The reconciled output always carries the latest request, so following the
/// request of each emitted state is enough. A `Result` counts only once a
/// `Loading` for the same request was seen; a request's first output may be
/// a stale result recombined under the new request.
struct RefreshProgress<P> {
    target: LoadRequest<P>,
    target_seen: bool,
    current: Option<LoadRequest<P>>,
    loading_seen: bool,
}

impl<P: ResourceParams> RefreshProgress<P> {
    fn new(target: LoadRequest<P>) -> Self {
        Self {
            target,
            target_seen: false,
            current: None,
            loading_seen: false,
        }
    }

    fn on_request(&mut self, request: &LoadRequest<P>) {
        if *request == self.target {
            self.target_seen = true;
        }
    }

    /// Whether `state` completes the refresh.
    fn on_state<V, E>(&mut self, state: &ResourceState<V, P, E>) -> bool {
        let Some(request) = state.load_request() else {
            return false;
        };
        self.on_request(request);
        if !self.target_seen {
            return false;
        }
        if self.current.as_ref() != Some(request) {
            self.current = Some(request.clone());
            self.loading_seen = false;
        }
        if state.is_loading() {
            self.loading_seen = true;
            return false;
        }
        state.is_result() && self.loading_seen
    }
}

/// A reconciled, observable resource.
pub struct Datasource<V, P, E> {
    emitter: Arc<dyn LoadRequestEmitter<P>>,
    recurring: Option<Arc<RecurringLoadRequestEmitter<P>>>,
    loader: LoaderSource<V, P, E>,
    cache: Option<Arc<PersistedCacheSource<V, P, E>>>,
    dual: Arc<DualSourceReconciler<V, P, E>>,
    retention: Option<Arc<FallbackRetentionReconciler<V, P, E>>>,
    subscriptions: SubscriptionBag,
}

impl<V, P, E> Datasource<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Latest output state.
    pub fn state(&self) -> ResourceState<V, P, E> {
        self.dual.current()
    }

    /// Handle to the output stream.
    pub fn states(&self) -> Property<ResourceState<V, P, E>> {
        self.dual.states()
    }

    /// Issue a load request.
    pub fn emit(&self, request: LoadRequest<P>) {
        debug!(request = %request.identity(), "datasource: emit");
        self.emitter.emit(request);
    }

    /// Most recently issued request.
    pub fn latest_request(&self) -> Option<LoadRequest<P>> {
        self.emitter.latest()
    }

    /// Latest state of the loader, before reconciliation.
    pub fn loader_state(&self) -> ResourceState<V, P, E> {
        self.loader.state()
    }

    /// Latest state of the cache source, if persistence is enabled.
    pub fn cached_state(&self) -> Option<ResourceState<V, P, E>> {
        self.cache.as_ref().map(|cache| cache.state())
    }

    /// Whether a persister was configured.
    pub fn persistence_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Result retained by fallback retention, if it is enabled.
    pub fn retained(&self) -> Option<LatestResult<V, P, E>> {
        self.retention
            .as_ref()
            .map(|retention| retention.latest_result())
    }

    /// Change the recurring reload period. Returns false if the datasource
    /// was built without one.
    pub fn set_refresh_interval(&self, interval: Option<Duration>) -> bool {
        match &self.recurring {
            Some(recurring) => {
                recurring.set_interval(interval);
                true
            }
            None => false,
        }
    }

    /// Emit a user full refresh for `params`.
    ///
    /// The returned future resolves once a `Result` state for that request,
    /// or for a request issued after it, has been emitted. With
    /// `skip_if_successfully_loaded` and a successful current state nothing
    /// is emitted and the future is ready immediately. Fails with
    /// [`LodestateError::Closed`] if the datasource is dropped first.
    pub fn refresh(
        &self,
        params: P,
        skip_if_successfully_loaded: bool,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let current = self.state();
        let loaded = current
            .load_request()
            .is_some_and(|request| current.has_loaded_successfully(request));
        if skip_if_successfully_loaded && loaded {
            debug!("refresh skipped, already loaded");
            return Either::Left(future::ready(Ok(())));
        }

        let request = LoadRequest::new(params, RequestType::full_refresh(Issuer::User));
        let progress = Arc::new(Mutex::new(RefreshProgress::new(request.clone())));

        let watch = Arc::clone(&progress);
        let request_watch = self
            .emitter
            .observe(Arc::new(move |emitted: &LoadRequest<P>| {
                watch.lock().on_request(emitted);
            }));

        let (done_tx, done_rx) = oneshot::channel();
        let done_tx = Mutex::new(Some(done_tx));
        let watch = Arc::clone(&progress);
        let state_watch = self
            .dual
            .states()
            .subscribe(Arc::new(move |state: &ResourceState<V, P, E>| {
                if !watch.lock().on_state(state) {
                    return;
                }
                if let Some(done) = done_tx.lock().take() {
                    let _ = done.send(());
                }
            }));

        self.emit(request);

        Either::Right(async move {
            let _watches = (request_watch, state_watch);
            done_rx
                .await
                .map_err(|_| LodestateError::closed("datasource dropped before refresh completed"))
        })
    }

    /// Current state; emits a system full refresh for `params` if it carries
    /// no value.
    pub fn first_state_and_refresh_if_no_value(&self, params: P) -> ResourceState<V, P, E> {
        let current = self.state();
        if current.value_box().is_none() {
            self.emit(LoadRequest::new(
                params,
                RequestType::full_refresh(Issuer::System),
            ));
        }
        current
    }

    /// One event per emitted `Result` state while the returned handle is
    /// alive.
    pub fn loading_ended(&self) -> LoadingEnded {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription =
            self.dual.states().subscribe(Arc::new(move |state: &ResourceState<V, P, E>| {
                if state.is_result() {
                    let _ = tx.send(());
                }
            }));
        LoadingEnded {
            events: rx,
            _subscription: subscription,
        }
    }
}

/// Receiver of `loading_ended` events. Dropping it unregisters its observer.
#[derive(Debug)]
pub struct LoadingEnded {
    events: mpsc::UnboundedReceiver<()>,
    _subscription: Subscription,
}

impl LoadingEnded {
    /// Wait for the next `Result` state. `None` once the datasource is gone
    /// and every buffered event was received.
    pub async fn recv(&mut self) -> Option<()> {
        self.events.recv().await
    }

    /// Take a buffered event without waiting.
    pub fn try_recv(&mut self) -> std::result::Result<(), TryRecvError> {
        self.events.try_recv()
    }
}

impl<V, P, E> Observable<ResourceState<V, P, E>> for Datasource<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn observe(&self, observer: Observer<ResourceState<V, P, E>>) -> Subscription {
        self.dual.observe(observer)
    }
}

impl<V, P, E> Drop for Datasource<V, P, E> {
    fn drop(&mut self) {
        self.subscriptions.cancel_all();
        debug!("datasource dropped");
    }
}
