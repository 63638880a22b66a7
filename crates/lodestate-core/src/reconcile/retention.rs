//! Fallback retention for a single producer
//!
//! Remembers the last success or error of one state stream and attaches it
//! as fallback to later `Loading` and error states, so a refresh never blanks
//! what was shown before. A `NotReady` wipes everything retained.
//!
//! Input sequences and their final output (S = success, E = error,
//! L = loading, NR = not ready):
//!
//! ```text
//! S > L            Loading with fallback value from S
//! E > L            Loading with fallback error from E
//! S > E > L        Loading with fallback error from E
//!                  (fallback value from S when preferring values)
//! S1 > E > S2 > L  Loading with fallback value from S2
//! S > E > NR > L   Loading without any fallbacks
//! E1 > E2 > L      Loading with fallback error from E2
//! E > S            Success without any fallbacks
//! E > NR > S       Success without any fallbacks
//! S > E            Error with fallback value from S
//! S1 > S2          Success with value from S2
//! E1 > E2          Error with error from E2
//! ```
//!
//! Fallbacks follow request compatibility in every branch, including errors:
//! `S > E` attaches the value of S to the error only when S was loaded for
//! parameters compatible with the error's request. An error for an
//! incompatible request is passed through without a fallback value.

use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use crate::config::ReconcilerConfig;
use crate::observe::{Observable, Observer, Property, Subscription};
use crate::state::{
    CacheCompatible, LoadRequest, ProvisioningState, ResourceError, ResourceParams,
    ResourceState, ResourceValue, ValueBox,
};
use crate::sync::SerialCell;

/// The last terminal observation, replaced wholesale on every update.
#[derive(Debug)]
pub enum LatestResult<V, P, E> {
    /// Nothing retained
    None,
    /// Last result was a success
    SuccessValue {
        /// Parameters the value was loaded with
        params: P,
        /// The loaded value
        value: ValueBox<V>,
    },
    /// Last result was an error
    Error {
        /// Parameters the failed load used
        params: P,
        /// The error
        error: E,
    },
}

impl<V, P: Clone, E: Clone> Clone for LatestResult<V, P, E> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::SuccessValue { params, value } => Self::SuccessValue {
                params: params.clone(),
                value: value.clone(),
            },
            Self::Error { params, error } => Self::Error {
                params: params.clone(),
                error: error.clone(),
            },
        }
    }
}

impl<V, P: PartialEq, E: PartialEq> PartialEq for LatestResult<V, P, E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (
                Self::SuccessValue { params, value },
                Self::SuccessValue {
                    params: other_params,
                    value: other_value,
                },
            ) => params == other_params && value == other_value,
            (
                Self::Error { params, error },
                Self::Error {
                    params: other_params,
                    error: other_error,
                },
            ) => params == other_params && error == other_error,
            _ => false,
        }
    }
}

impl<V, P: CacheCompatible, E: Clone> LatestResult<V, P, E> {
    fn value_for(&self, request: &LoadRequest<P>) -> Option<ValueBox<V>> {
        match self {
            Self::SuccessValue { params, value } if params.is_cache_compatible(request.params()) => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    fn error_for(&self, request: &LoadRequest<P>) -> Option<E> {
        match self {
            Self::Error { params, error } if params.is_cache_compatible(request.params()) => {
                Some(error.clone())
            }
            _ => None,
        }
    }
}

/// The retention state machine, without any synchronization.
pub struct FallbackRetention<V, P, E> {
    latest_result: LatestResult<V, P, E>,
    prefer_fallback_value_over_error: bool,
}

impl<V, P, E> FallbackRetention<V, P, E>
where
    P: CacheCompatible + Clone,
    E: Clone,
{
    /// Retention with nothing retained yet.
    pub fn new(prefer_fallback_value_over_error: bool) -> Self {
        Self {
            latest_result: LatestResult::None,
            prefer_fallback_value_over_error,
        }
    }

    /// What is currently retained.
    pub fn latest_result(&self) -> &LatestResult<V, P, E> {
        &self.latest_result
    }

    /// Map an observed state to its output, then retain it.
    ///
    /// The output is computed before `state` is registered, so a success
    /// followed directly by an error surfaces that error.
    pub fn apply(&mut self, state: &ResourceState<V, P, E>) -> ResourceState<V, P, E> {
        let output = self.output_for(state);
        self.register(state);
        output
    }

    fn output_for(&self, state: &ResourceState<V, P, E>) -> ResourceState<V, P, E> {
        let Some(request) = state.load_request() else {
            return ResourceState::not_ready();
        };

        match state.provisioning_state() {
            ProvisioningState::NotReady => ResourceState::not_ready(),
            ProvisioningState::Loading => ResourceState::loading(
                request.clone(),
                self.latest_result.value_for(request),
                self.latest_result.error_for(request),
            ),
            ProvisioningState::Result => {
                if let Some(error) = state.cache_compatible_error(request) {
                    match self.latest_result.value_for(request) {
                        Some(value) => {
                            ResourceState::error(error.clone(), request.clone(), Some(value))
                        }
                        None => state.clone(),
                    }
                } else if state.cache_compatible_value(request).is_some() {
                    state.clone()
                } else {
                    ResourceState::not_ready()
                }
            }
        }
    }

    fn register(&mut self, state: &ResourceState<V, P, E>) {
        let request = match (state.provisioning_state(), state.load_request()) {
            (ProvisioningState::Loading, _) => return,
            (ProvisioningState::Result, Some(request)) => request,
            _ => {
                self.latest_result = LatestResult::None;
                return;
            }
        };

        if let Some(error) = state.cache_compatible_error(request) {
            let keep_value = self.prefer_fallback_value_over_error
                && self.latest_result.value_for(request).is_some();
            if !keep_value {
                self.latest_result = LatestResult::Error {
                    params: request.params().clone(),
                    error: error.clone(),
                };
            }
        } else if let Some(value) = state.cache_compatible_value(request) {
            self.latest_result = LatestResult::SuccessValue {
                params: request.params().clone(),
                value: value.clone(),
            };
        } else {
            self.latest_result = LatestResult::None;
        }
    }
}

/// Thread-safe [`FallbackRetention`] with an observable output.
pub struct FallbackRetentionReconciler<V, P, E> {
    config: ReconcilerConfig,
    retention: SerialCell<FallbackRetention<V, P, E>>,
    output: Property<ResourceState<V, P, E>>,
}

impl<V, P, E> FallbackRetentionReconciler<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    /// Reconciler with default configuration.
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    /// Reconciler with the given configuration.
    pub fn with_config(config: ReconcilerConfig) -> Self {
        Self {
            retention: SerialCell::new(FallbackRetention::new(
                config.prefer_fallback_value_over_error,
            )),
            config,
            output: Property::new(ResourceState::not_ready()),
        }
    }

    /// Observe the next state of the single upstream producer.
    pub fn on_state(&self, state: &ResourceState<V, P, E>) {
        trace!(state = %state.provisioning_state(), "fallback-retention: input");
        self.retention
            .step_then(|retention| retention.apply(state), |next| self.publish(next));
    }

    /// Map one state synchronously and return the output (also emitted).
    pub fn map(&self, state: &ResourceState<V, P, E>) -> ResourceState<V, P, E> {
        self.retention.step_then(
            |retention| retention.apply(state),
            |next| {
                self.publish(next.clone());
                next
            },
        )
    }

    /// What is currently retained.
    pub fn latest_result(&self) -> LatestResult<V, P, E> {
        self.retention.with(|retention| retention.latest_result().clone())
    }

    /// Latest emitted state.
    pub fn current(&self) -> ResourceState<V, P, E> {
        self.output.get()
    }

    /// Handle to the output stream.
    pub fn states(&self) -> Property<ResourceState<V, P, E>> {
        self.output.clone()
    }

    /// Observe `source`. Observation ends when the returned subscription is
    /// dropped or the reconciler is dropped.
    pub fn attach(self: &Arc<Self>, source: &dyn Observable<ResourceState<V, P, E>>) -> Subscription {
        let weak: Weak<Self> = Arc::downgrade(self);
        source.observe(Arc::new(move |state: &ResourceState<V, P, E>| {
            if let Some(reconciler) = weak.upgrade() {
                reconciler.on_state(state);
            }
        }))
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
                "fallback-retention transition"
            );
        }
        self.output.set(next);
    }
}

impl<V, P, E> Default for FallbackRetentionReconciler<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, P, E> Observable<ResourceState<V, P, E>> for FallbackRetentionReconciler<V, P, E>
where
    V: ResourceValue,
    P: ResourceParams,
    E: ResourceError,
{
    fn observe(&self, observer: Observer<ResourceState<V, P, E>>) -> Subscription {
        self.output.observe(observer)
    }
}
