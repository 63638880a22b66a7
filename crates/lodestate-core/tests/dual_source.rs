//! Dual-Source Reconciler Tests
//!
//! Concrete merge scenarios plus property tests for the guarantees every
//! combined output must hold:
//!
//! - A result of an incompatible request never surfaces its value
//! - A compatible primary value always wins over the cached one
//! - Re-feeding an identical input never re-emits

use std::sync::Arc;

use lodestate_core::{
    combine, DualSourceReconciler, LoadRequest, Observable, Property, ProvisioningState,
    ResourceState, ValueBox,
};
use lodestate_testkit::assertions::{assert_provisioning, assert_state_sequence};
use lodestate_testkit::strategies::{arb_state_plan, arb_user, StatePlan};
use lodestate_testkit::{
    assert_not_ready, loading, request_for, success, RecordingObserver, TestError, TestParams,
    TestState,
};
use proptest::prelude::*;

type Reconciler = DualSourceReconciler<String, TestParams, TestError>;

// ============================================================================
// Concrete scenarios
// ============================================================================

#[test]
fn test_loading_primary_shows_cached_value() {
    let r = request_for("ann");
    let cached = success("cached", &r);

    let out = combine(&loading(&r), &cached, Some(&r));
    assert_eq!(
        out,
        ResourceState::loading(r.clone(), cached.value_box().cloned(), None)
    );
}

#[test]
fn test_fresh_primary_value_replaces_cached_value() {
    let r = request_for("ann");
    let fresh = success("fresh", &r);
    let cached = success("cached", &r);

    let out = combine(&fresh, &cached, Some(&r));
    assert_eq!(out, fresh);
    assert!(out.error_ref().is_none());
}

#[test]
fn test_logout_never_leaks_previous_user() {
    let reconciler = Reconciler::new();
    let ann = request_for("ann");
    let bob = request_for("bob");

    reconciler.on_load_request(ann.clone());
    reconciler.on_cache(success("ann's cache", &ann));
    reconciler.on_primary(success("ann's inbox", &ann));
    assert_eq!(
        reconciler.current().value_ref().map(String::as_str),
        Some("ann's inbox")
    );

    // Producers have not caught up with bob's request yet.
    reconciler.on_load_request(bob.clone());
    assert_not_ready!(reconciler.current());

    reconciler.on_cache(ResourceState::error(TestError::CacheMiss, bob.clone(), None));
    assert_not_ready!(reconciler.current());

    reconciler.on_primary(loading(&bob));
    assert_eq!(reconciler.current(), loading(&bob));
}

#[test]
fn test_primary_error_keeps_cached_value_as_fallback() {
    let reconciler = Reconciler::new();
    let r = request_for("ann");
    let cached = success("cached", &r);

    reconciler.on_load_request(r.clone());
    reconciler.on_cache(cached.clone());
    reconciler.on_primary(loading(&r));
    reconciler.on_primary(ResourceState::error(TestError::SomeError, r.clone(), None));

    let out = reconciler.current();
    assert_provisioning(&out, ProvisioningState::Result);
    assert_eq!(out.error_ref(), Some(&TestError::SomeError));
    assert_eq!(out.value_box(), cached.value_box());
}

#[test]
fn test_attached_inputs_emit_in_order() {
    let r = request_for("ann");
    let primary = Property::new(ResourceState::not_ready());
    let cache = Property::new(ResourceState::not_ready());
    let requests = Property::new(r.clone());

    let reconciler = Arc::new(Reconciler::new());
    let recorder = RecordingObserver::<TestState>::new();
    let _out = reconciler.observe(recorder.observer());
    let _inputs = reconciler.attach(&primary, &cache, &requests);

    let cached = success("cached", &r);
    let fresh = success("fresh", &r);
    cache.set(cached.clone());
    primary.set(loading(&r));
    primary.set(fresh.clone());

    assert_state_sequence(
        &recorder.values(),
        &[
            ResourceState::not_ready(),
            ResourceState::loading(r.clone(), cached.value_box().cloned(), None),
            fresh,
        ],
    );
}

#[test]
fn test_dropping_input_subscriptions_stops_observing() {
    let primary = Property::new(ResourceState::not_ready());
    let cache = Property::new(ResourceState::not_ready());
    let requests = Property::new(request_for("ann"));

    let reconciler = Arc::new(Reconciler::new());
    let inputs = reconciler.attach(&primary, &cache, &requests);
    assert_eq!(primary.observer_count(), 1);

    drop(inputs);
    assert_eq!(primary.observer_count(), 0);
    assert_eq!(requests.observer_count(), 0);
}

// ============================================================================
// Properties
// ============================================================================

fn result_plan() -> impl Strategy<Value = StatePlan> {
    arb_state_plan().prop_filter("result states only", |plan| {
        matches!(
            plan,
            StatePlan::Success(_) | StatePlan::Failure(_) | StatePlan::FailureWithValue(..)
        )
    })
}

proptest! {
    /// Property: a stale primary result never surfaces its value under an
    /// incompatible request
    #[test]
    fn prop_incompatible_result_never_leaks_value(
        first in arb_user(),
        second in arb_user(),
        plan in result_plan(),
        cache_plan in arb_state_plan(),
    ) {
        prop_assume!(first != second);
        let stale_request = request_for(&first);
        let current_request = request_for(&second);
        let stale = plan.build(&stale_request);

        let reconciler = Reconciler::new();
        reconciler.on_load_request(stale_request.clone());
        reconciler.on_cache(cache_plan.build(&stale_request));
        reconciler.on_primary(stale.clone());
        reconciler.on_load_request(current_request.clone());

        let out = reconciler.current();
        prop_assert!(
            out.value_box().is_none(),
            "stale value surfaced: {out:?}"
        );
        if stale.error_ref().is_none() {
            prop_assert!(out.is_not_ready(), "expected NotReady, got {out:?}");
        }
        if let Some(request) = out.load_request() {
            prop_assert_eq!(request, &current_request);
        }
    }

    /// Property: a compatible primary value always wins over the cache
    #[test]
    fn prop_primary_value_takes_precedence(
        user in arb_user(),
        page in 0u32..3,
        primary_value in "[a-z]{1,6}",
        cached_value in "[a-z]{1,6}",
        loading_primary in any::<bool>(),
    ) {
        let r = request_for(&user);
        let cache_request = LoadRequest::initial(TestParams::page(&user, page));
        let primary_box = ValueBox::new(primary_value);
        let primary: TestState = if loading_primary {
            ResourceState::loading(r.clone(), Some(primary_box.clone()), None)
        } else {
            ResourceState::value(primary_box.clone(), r.clone(), None)
        };
        let cache = ResourceState::value(ValueBox::new(cached_value), cache_request, None);

        let out = combine(&primary, &cache, Some(&r));
        prop_assert_eq!(out.value_box(), Some(&primary_box));
    }

    /// Property: re-feeding an identical primary state does not re-emit
    #[test]
    fn prop_repeated_primary_is_idempotent(
        user in arb_user(),
        plan in arb_state_plan(),
        cache_plan in arb_state_plan(),
    ) {
        let r = request_for(&user);
        let state = plan.build(&r);

        let reconciler = Reconciler::new();
        let recorder = RecordingObserver::<TestState>::new();
        let _sub = reconciler.observe(recorder.observer());
        reconciler.on_load_request(r.clone());
        reconciler.on_cache(cache_plan.build(&r));
        reconciler.on_primary(state.clone());

        let emitted = recorder.len();
        let before = reconciler.current();
        reconciler.on_primary(state);

        prop_assert_eq!(recorder.len(), emitted);
        prop_assert_eq!(reconciler.current(), before);
    }

    /// Property: without a load request nothing but NotReady is emitted
    #[test]
    fn prop_no_request_is_not_ready(
        user in arb_user(),
        plan in arb_state_plan(),
        cache_plan in arb_state_plan(),
    ) {
        let r = request_for(&user);
        let out = combine(&plan.build(&r), &cache_plan.build(&r), None);
        prop_assert!(out.is_not_ready());
    }
}

#[test]
fn test_loading_without_values_keeps_primary_error() {
    let r = request_for("ann");
    let primary: TestState = ResourceState::loading(r.clone(), None, Some(TestError::SomeError));

    let out = combine(&primary, &ResourceState::not_ready(), Some(&r));
    assert_eq!(out, primary);
}

#[test]
fn test_state_fed_back_from_observer_reaches_all_observers_in_order() {
    let reconciler = Arc::new(Reconciler::new());
    let r = request_for("ann");
    let fresh = success("fresh", &r);

    // One observer completes the load as soon as it sees `Loading`.
    let feedback = Arc::downgrade(&reconciler);
    let loaded = fresh.clone();
    let _completes = reconciler.observe(Arc::new(move |state: &TestState| {
        if state.is_loading() {
            if let Some(reconciler) = feedback.upgrade() {
                reconciler.on_primary(loaded.clone());
            }
        }
    }));
    let recorder = RecordingObserver::<TestState>::new();
    let _records = reconciler.observe(recorder.observer());

    reconciler.on_load_request(r.clone());
    reconciler.on_primary(loading(&r));

    assert_state_sequence(
        &recorder.values(),
        &[ResourceState::not_ready(), loading(&r), fresh.clone()],
    );
    assert_eq!(reconciler.current(), fresh);
    assert_eq!(recorder.last(), Some(fresh));
}
