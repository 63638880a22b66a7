//! Dual-source reconciliation
//!
//! Merges a primary producer (e.g. the network), a cache producer and the
//! stream of load requests into one authoritative state. Primary results
//! take precedence over cached ones, and any state whose request is not
//! cache-compatible with the current request is discarded.

use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use crate::config::ReconcilerConfig;
use crate::observe::{Observable, Observer, Property, Subscription, SubscriptionBag};
use crate::state::{
    CacheCompatible, LoadRequest, ProvisioningState, ResourceError, ResourceParams,
    ResourceState, ResourceValue,
};
use crate::sync::SerialCell;

use super::persist::{PersistenceTrigger, StatePersister};

/// Combine the latest primary state, cache state and load request.
///
/// Pure function of its inputs. A primary `Result` that does not belong to
/// `load_request` yields `NotReady`: producers are not trusted to emit a
/// fresh `Loading` for every request, so request compatibility alone keeps
/// a previous request's data from surfacing.
pub fn combine<V, P, E>(
    primary: &ResourceState<V, P, E>,
    cache: &ResourceState<V, P, E>,
    load_request: Option<&LoadRequest<P>>,
) -> ResourceState<V, P, E>
where
    P: CacheCompatible + Clone,
    E: Clone,
{
    let Some(request) = load_request else {
        return ResourceState::not_ready();
    };

    match primary.provisioning_state() {
        ProvisioningState::NotReady | ProvisioningState::Loading => {
            if let Some(value) = primary.cache_compatible_value(request) {
                ResourceState::loading(
                    request.clone(),
                    Some(value.clone()),
                    primary.error_ref().cloned(),
                )
            } else if let Some(value) = cache.cache_compatible_value(request) {
                ResourceState::loading(
                    request.clone(),
                    Some(value.clone()),
                    cache.error_ref().cloned(),
                )
            } else if primary.is_loading() {
                ResourceState::loading(request.clone(), None, primary.error_ref().cloned())
            } else {
                ResourceState::not_ready()
            }
        }
        ProvisioningState::Result => {
            if let Some(value) = primary.cache_compatible_value(request) {
                match primary.error_ref() {
                    Some(error) => {
                        ResourceState::error(error.clone(), request.clone(), Some(value.clone()))
                    }
                    None => ResourceState::value(value.clone(), request.clone(), None),
                }
            } else if let Some(error) = primary.error_ref() {
                ResourceState::error(
                    error.clone(),
                    request.clone(),
                    cache.cache_compatible_value(request).cloned(),
                )
            } else {
                ResourceState::not_ready()
            }
        }
    }
}

/// The latest input triple of a [`DualSourceReconciler`].
pub struct CachedComponents<V, P, E> {
    /// Latest primary producer state
    pub latest_primary: ResourceState<V, P, E>,
    /// Latest cache producer state
    pub latest_cache: ResourceState<V, P, E>,
    /// Latest load request, if any was issued yet
    pub latest_load_request: Option<LoadRequest<P>>,
}

impl<V, P, E> Default for CachedComponents<V, P, E> {
    fn default() -> Self {
        Self {
            latest_primary: ResourceState::not_ready(),
            latest_cache: ResourceState::not_ready(),
            latest_load_request: None,
        }
    }
}

impl<V, P: CacheCompatible + Clone, E: Clone> CachedComponents<V, P, E> {
    /// Combined state of the current triple.
    pub fn combined(&self) -> ResourceState<V, P, E> {
        combine(
            &self.latest_primary,
            &self.latest_cache,
            self.latest_load_request.as_ref(),
        )
    }
}

/// Merges primary, cache and load-request streams into one output stream.
///
/// Each `on_*` entry point stores its input, recombines and emits as one
/// atomic step. Output states are totally ordered and always computed from a
/// consistent input triple.
pub struct DualSourceReconciler<V, P, E> {
    config: ReconcilerConfig,
    components: SerialCell<CachedComponents<V, P, E>>,
    persistence: Option<PersistenceTrigger<V, P, E>>,
    output: Property<ResourceState<V, P, E>>,
}

impl<V, P, E> DualSourceReconciler<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Reconciler with default configuration and no persistence.
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    /// Reconciler with the given configuration.
    pub fn with_config(config: ReconcilerConfig) -> Self {
        Self {
            config,
            components: SerialCell::default(),
            persistence: None,
            output: Property::new(ResourceState::not_ready()),
        }
    }

    /// Persist every distinct primary state that loaded successfully for
    /// the current request.
    pub fn with_persister(mut self, persister: Arc<dyn StatePersister<V, P, E>>) -> Self {
        self.persistence = Some(PersistenceTrigger::new(persister));
        self
    }

    /// Record a new primary producer state.
    pub fn on_primary(&self, state: ResourceState<V, P, E>) {
        trace!(state = %state.provisioning_state(), "dual-source: primary");
        if let Some(trigger) = &self.persistence {
            trigger.on_state(&state);
        }
        self.update(|components| components.latest_primary = state);
    }

    /// Record a new cache producer state.
    pub fn on_cache(&self, state: ResourceState<V, P, E>) {
        trace!(state = %state.provisioning_state(), "dual-source: cache");
        self.update(|components| components.latest_cache = state);
    }

    /// Record a newly issued load request.
    pub fn on_load_request(&self, request: LoadRequest<P>) {
        trace!(request = %request.identity(), "dual-source: load request");
        if let Some(trigger) = &self.persistence {
            trigger.on_load_request(&request);
        }
        self.update(|components| components.latest_load_request = Some(request));
    }

    /// Latest emitted state.
    pub fn current(&self) -> ResourceState<V, P, E> {
        self.output.get()
    }

    /// Handle to the output stream.
    pub fn states(&self) -> Property<ResourceState<V, P, E>> {
        self.output.clone()
    }

    /// Observe the three inputs. Observation ends when the returned bag is
    /// dropped or the reconciler is dropped, whichever comes first.
    pub fn attach(
        self: &Arc<Self>,
        primary: &dyn Observable<ResourceState<V, P, E>>,
        cache: &dyn Observable<ResourceState<V, P, E>>,
        load_requests: &dyn Observable<LoadRequest<P>>,
    ) -> SubscriptionBag {
        let bag = SubscriptionBag::new();

        let weak: Weak<Self> = Arc::downgrade(self);
        bag.add(primary.observe(Arc::new(move |state: &ResourceState<V, P, E>| {
            if let Some(reconciler) = weak.upgrade() {
                reconciler.on_primary(state.clone());
            }
        })));

        let weak: Weak<Self> = Arc::downgrade(self);
        bag.add(cache.observe(Arc::new(move |state: &ResourceState<V, P, E>| {
            if let Some(reconciler) = weak.upgrade() {
                reconciler.on_cache(state.clone());
            }
        })));

        let weak: Weak<Self> = Arc::downgrade(self);
        bag.add(load_requests.observe(Arc::new(move |request: &LoadRequest<P>| {
            if let Some(reconciler) = weak.upgrade() {
                reconciler.on_load_request(request.clone());
            }
        })));

        debug!(subscriptions = bag.len(), "dual-source reconciler attached");
        bag
    }

    fn update(&self, apply: impl FnOnce(&mut CachedComponents<V, P, E>)) {
        self.components.step_then(
            |components| {
                apply(components);
                components.combined()
            },
            |combined| self.publish(combined),
        );
    }

    fn publish(&self, next: ResourceState<V, P, E>) {
        let previous = self.output.get();
        if self.config.skip_repeated_states && previous == next {
            return;
        }
        if self.config.trace_transitions {
            debug!(
                from = %previous.provisioning_state(),
                to = %next.provisioning_state(),
                has_value = next.value_box().is_some(),
                has_error = next.error_ref().is_some(),
                "dual-source transition"
            );
        }
        self.output.set(next);
    }
}

impl<V, P, E> Default for DualSourceReconciler<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, P, E> Observable<ResourceState<V, P, E>> for DualSourceReconciler<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn observe(&self, observer: Observer<ResourceState<V, P, E>>) -> Subscription {
        self.output.observe(observer)
    }
}
