//! Lodestate Core - Resource-State Reconciliation Engine
//!
//! Gives applications a single, coherent view of a resource that may be
//! loading, cached, freshly fetched or failed, while independent producers
//! emit states asynchronously and out of order.
//!
//! # Architecture Layers
//!
//! ## State Model
//! - `ResourceState`: provisioning state, originating request, value, error
//! - `LoadRequest` + `CacheCompatible`: request identity and staleness predicate
//! - `ValueBox`: identity-compared values for cheap change detection
//!
//! ## Reconcilers
//! - `DualSourceReconciler`: primary + cache + requests, primary first
//! - `FallbackRetentionReconciler`: one producer with retained fallbacks
//! - `PersistenceTrigger`: one write per distinct successful state
//!
//! ## Plumbing
//! - `Observable`, `Broadcast`, `Property`, `Subscription`: RAII observation
//! - `Synchronized`, `SerialCell`: the per-instance serializing discipline
//!
//! This crate is synchronous and runtime agnostic. Async composition lives in
//! `lodestate-datasource`.

#![forbid(unsafe_code)]

/// Reconciler configuration
pub mod config;

/// Unified error handling
pub mod errors;

/// Observation plumbing
pub mod observe;

/// Reconciliation algorithms
pub mod reconcile;

/// Resource state model
pub mod state;

/// Synchronized state cells
pub mod sync;

pub use config::{LodestateConfig, ReconcilerConfig};
pub use errors::{LodestateError, Result};
pub use observe::{Broadcast, Observable, Observer, Property, Subscription, SubscriptionBag};
pub use reconcile::{
    combine, CachedComponents, DualSourceReconciler, FallbackRetention,
    FallbackRetentionReconciler, LatestResult, PersistenceTrigger, PersistingObservable,
    StatePersister,
};
pub use state::{
    CacheCompatible, Issuer, LoadMode, LoadRequest, NoParams, ProvisioningState, RequestType,
    ResourceError, ResourceParams, ResourceState, ResourceValue, ValueBox,
};
pub use sync::{SerialCell, Synchronized};
