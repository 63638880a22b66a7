//! # Resource State Model
//!
//! - [`ResourceState`]: provisioning state, originating request, optional
//!   identity-boxed value, optional error.
//! - [`LoadRequest`]: parameters plus a [`RequestType`] tag.
//! - [`CacheCompatible`]: the integrator-supplied predicate deciding whether
//!   a state still belongs to a newly issued request.
//! - [`ValueBox`]: identity-compared shared value.

mod request;
mod resource;
mod value_box;

pub use request::{CacheCompatible, Issuer, LoadMode, LoadRequest, NoParams, RequestType};
pub use resource::{ProvisioningState, ResourceState};
pub use value_box::ValueBox;

/// Bounds for resource payloads carried across threads.
pub trait ResourceValue: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> ResourceValue for T {}

/// Bounds for request parameters.
pub trait ResourceParams: CacheCompatible + Clone + Send + Sync + 'static {}

impl<T: CacheCompatible + Clone + Send + Sync + 'static> ResourceParams for T {}

/// Bounds for upstream error payloads.
pub trait ResourceError: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> ResourceError for T {}
