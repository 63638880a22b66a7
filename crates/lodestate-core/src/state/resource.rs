//! The resource state envelope

use serde::{Deserialize, Serialize};
use std::fmt;

use super::request::{CacheCompatible, LoadRequest};
use super::value_box::ValueBox;

/// Where a resource is within its lifetime, before or following a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// No data can be provided yet (or any more, for the current request)
    NotReady,
    /// A load is in flight; a fallback value and/or error may be attached
    Loading,
    /// A load finished with a value, an error, or both
    Result,
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "not-ready"),
            Self::Loading => write!(f, "loading"),
            Self::Result => write!(f, "result"),
        }
    }
}

/// What a resource (API response, cache entry, computed value) currently is.
///
/// States are immutable values built through the four constructors, which
/// uphold the envelope invariants:
/// - `NotReady` carries neither request, value nor error.
/// - every other state carries the request that produced it.
/// - a value and an error may coexist (stale value plus fresh error).
#[derive(Serialize, Deserialize)]
pub struct ResourceState<V, P, E> {
    provisioning_state: ProvisioningState,
    load_request: Option<LoadRequest<P>>,
    value: Option<ValueBox<V>>,
    error: Option<E>,
}

impl<V, P, E> ResourceState<V, P, E> {
    /// Not ready to provide data.
    pub fn not_ready() -> Self {
        Self {
            provisioning_state: ProvisioningState::NotReady,
            load_request: None,
            value: None,
            error: None,
        }
    }

    /// Loading, optionally showing a previously obtained value and/or error.
    pub fn loading(
        load_request: LoadRequest<P>,
        fallback_value: Option<ValueBox<V>>,
        fallback_error: Option<E>,
    ) -> Self {
        Self {
            provisioning_state: ProvisioningState::Loading,
            load_request: Some(load_request),
            value: fallback_value,
            error: fallback_error,
        }
    }

    /// A value has been produced. A fallback error may still be attached.
    pub fn value(
        value: ValueBox<V>,
        load_request: LoadRequest<P>,
        fallback_error: Option<E>,
    ) -> Self {
        Self {
            provisioning_state: ProvisioningState::Result,
            load_request: Some(load_request),
            value: Some(value),
            error: fallback_error,
        }
    }

    /// Loading failed. A fallback value (e.g. from a cache) may still be attached.
    pub fn error(
        error: E,
        load_request: LoadRequest<P>,
        fallback_value: Option<ValueBox<V>>,
    ) -> Self {
        Self {
            provisioning_state: ProvisioningState::Result,
            load_request: Some(load_request),
            value: fallback_value,
            error: Some(error),
        }
    }

    /// Provisioning state.
    pub fn provisioning_state(&self) -> ProvisioningState {
        self.provisioning_state
    }

    /// The request that produced this state (`None` only when not ready).
    pub fn load_request(&self) -> Option<&LoadRequest<P>> {
        self.load_request.as_ref()
    }

    /// Value box, if any (regardless of request compatibility).
    pub fn value_box(&self) -> Option<&ValueBox<V>> {
        self.value.as_ref()
    }

    /// Borrow the payload of the value box, if any.
    pub fn value_ref(&self) -> Option<&V> {
        self.value.as_ref().map(ValueBox::value)
    }

    /// Error, if any (regardless of request compatibility).
    pub fn error_ref(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// Whether this is `NotReady`.
    pub fn is_not_ready(&self) -> bool {
        self.provisioning_state == ProvisioningState::NotReady
    }

    /// Whether this is `Loading`.
    pub fn is_loading(&self) -> bool {
        self.provisioning_state == ProvisioningState::Loading
    }

    /// Whether this is a `Result`.
    pub fn is_result(&self) -> bool {
        self.provisioning_state == ProvisioningState::Result
    }

    /// Transform the value payload. The request identity is kept, the value
    /// box is re-minted.
    pub fn map<U>(&self, transform: impl FnOnce(&V) -> U) -> ResourceState<U, P, E>
    where
        P: Clone,
        E: Clone,
    {
        ResourceState {
            provisioning_state: self.provisioning_state,
            load_request: self.load_request.clone(),
            value: self.value.as_ref().map(|v| v.map(transform)),
            error: self.error.clone(),
        }
    }
}

impl<V, P, E> ResourceState<V, P, E>
where
    P: Clone,
    E: Clone,
{
    /// Same state with the value replaced. `NotReady` is returned unchanged.
    pub fn with_value(&self, value: Option<ValueBox<V>>) -> Self {
        if self.is_not_ready() {
            return self.clone();
        }
        Self {
            value,
            ..self.clone()
        }
    }

    /// Same state with the error replaced. `NotReady` is returned unchanged.
    pub fn with_error(&self, error: Option<E>) -> Self {
        if self.is_not_ready() {
            return self.clone();
        }
        Self {
            error,
            ..self.clone()
        }
    }
}

impl<V, P: CacheCompatible, E> ResourceState<V, P, E> {
    /// The value, but only if this state's request is compatible with `request`.
    pub fn cache_compatible_value(&self, request: &LoadRequest<P>) -> Option<&ValueBox<V>> {
        let value = self.value.as_ref()?;
        let own_request = self.load_request.as_ref()?;
        own_request.is_cache_compatible(request).then_some(value)
    }

    /// The error, but only if this state's request is compatible with `request`.
    pub fn cache_compatible_error(&self, request: &LoadRequest<P>) -> Option<&E> {
        let error = self.error.as_ref()?;
        let own_request = self.load_request.as_ref()?;
        own_request.is_cache_compatible(request).then_some(error)
    }

    /// A compatible value is present, no error is present, and loading finished.
    pub fn has_loaded_successfully(&self, request: &LoadRequest<P>) -> bool {
        self.is_result() && self.error.is_none() && self.cache_compatible_value(request).is_some()
    }
}

impl<V, P, E> Default for ResourceState<V, P, E> {
    fn default() -> Self {
        Self::not_ready()
    }
}

impl<V, P: Clone, E: Clone> Clone for ResourceState<V, P, E> {
    fn clone(&self) -> Self {
        Self {
            provisioning_state: self.provisioning_state,
            load_request: self.load_request.clone(),
            value: self.value.clone(),
            error: self.error.clone(),
        }
    }
}

/// Equality is cheap: requests and values compare by identity, only the error
/// payload is compared structurally.
impl<V, P, E: PartialEq> PartialEq for ResourceState<V, P, E> {
    fn eq(&self, other: &Self) -> bool {
        self.provisioning_state == other.provisioning_state
            && self.load_request == other.load_request
            && self.value == other.value
            && self.error == other.error
    }
}

impl<V: fmt::Debug, P: fmt::Debug, E: fmt::Debug> fmt::Debug for ResourceState<V, P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceState")
            .field("provisioning_state", &self.provisioning_state)
            .field("load_request", &self.load_request)
            .field("value", &self.value)
            .field("error", &self.error)
            .finish()
    }
}
