//! Fallback-Retention Sequence Table
//!
//! Every input sequence of the retention contract, fed through a
//! [`FallbackRetentionReconciler`] under one request. The final output of
//! each sequence is checked in full.
//!
//! ```text
//! S > L            Loading with fallback value from S
//! E > L            Loading with fallback error from E
//! S > E > L        Loading with fallback error from E
//! S1 > E > S2 > L  Loading with fallback value from S2
//! S > E > NR > L   Loading without any fallbacks
//! E1 > E2 > L      Loading with fallback error from E2
//! E > S            Success without any fallbacks
//! E > NR > S       Success without any fallbacks
//! S > E            Error with fallback value from S
//! S1 > S2          Success with value from S2
//! E1 > E2          Error with error from E2
//! ```

use std::sync::Arc;

use lodestate_core::{
    FallbackRetentionReconciler, LatestResult, LoadRequest, Observable, Property,
    ReconcilerConfig, ResourceState, ValueBox,
};
use lodestate_testkit::assertions::assert_state_sequence;
use lodestate_testkit::{
    assert_has_error, assert_has_value, assert_no_value, failure, loading, request_for, success,
    RecordingObserver, TestError, TestParams, TestState,
};

type Retention = FallbackRetentionReconciler<String, TestParams, TestError>;

fn reconciler(prefer_fallback_value_over_error: bool) -> Retention {
    FallbackRetentionReconciler::with_config(ReconcilerConfig {
        prefer_fallback_value_over_error,
        ..ReconcilerConfig::default()
    })
}

/// Feed `sequence` and return the output for its last state.
fn final_output(prefer: bool, sequence: &[TestState]) -> TestState {
    let reconciler = reconciler(prefer);
    let mut last = ResourceState::not_ready();
    for state in sequence {
        last = reconciler.map(state);
    }
    last
}

struct Fixture {
    r: LoadRequest<TestParams>,
    s1: TestState,
    s2: TestState,
    e1: TestState,
    e2: TestState,
}

impl Fixture {
    fn new() -> Self {
        let r = request_for("ann");
        Self {
            s1: success("first", &r),
            s2: success("second", &r),
            e1: failure(TestError::SomeError, &r),
            e2: failure(TestError::AnotherError, &r),
            r,
        }
    }

    fn loading(&self) -> TestState {
        loading(&self.r)
    }

    fn value_of(state: &TestState) -> Option<ValueBox<String>> {
        state.value_box().cloned()
    }
}

// ============================================================================
// Sequences ending in Loading
// ============================================================================

#[test]
fn test_success_then_loading_carries_value() {
    let f = Fixture::new();
    let out = final_output(false, &[f.s1.clone(), f.loading()]);
    assert_eq!(
        out,
        ResourceState::loading(f.r.clone(), Fixture::value_of(&f.s1), None)
    );
}

#[test]
fn test_error_then_loading_carries_error() {
    let f = Fixture::new();
    let out = final_output(false, &[f.e1.clone(), f.loading()]);
    assert_eq!(
        out,
        ResourceState::loading(f.r.clone(), None, Some(TestError::SomeError))
    );
}

#[test]
fn test_success_error_loading_carries_error() {
    let f = Fixture::new();
    let out = final_output(false, &[f.s1.clone(), f.e1.clone(), f.loading()]);
    assert_eq!(
        out,
        ResourceState::loading(f.r.clone(), None, Some(TestError::SomeError))
    );
}

#[test]
fn test_success_error_loading_carries_value_when_preferring_values() {
    let f = Fixture::new();
    let out = final_output(true, &[f.s1.clone(), f.e1.clone(), f.loading()]);
    assert_eq!(
        out,
        ResourceState::loading(f.r.clone(), Fixture::value_of(&f.s1), None)
    );
}

#[test]
fn test_success_error_success_loading_carries_last_value() {
    let f = Fixture::new();
    for prefer in [false, true] {
        let out = final_output(
            prefer,
            &[f.s1.clone(), f.e1.clone(), f.s2.clone(), f.loading()],
        );
        assert_eq!(
            out,
            ResourceState::loading(f.r.clone(), Fixture::value_of(&f.s2), None)
        );
    }
}

#[test]
fn test_not_ready_wipes_fallbacks() {
    let f = Fixture::new();
    for prefer in [false, true] {
        let out = final_output(
            prefer,
            &[
                f.s1.clone(),
                f.e1.clone(),
                ResourceState::not_ready(),
                f.loading(),
            ],
        );
        assert_eq!(out, f.loading());
    }
}

#[test]
fn test_error_error_loading_carries_last_error() {
    let f = Fixture::new();
    let out = final_output(false, &[f.e1.clone(), f.e2.clone(), f.loading()]);
    assert_eq!(
        out,
        ResourceState::loading(f.r.clone(), None, Some(TestError::AnotherError))
    );
}

// ============================================================================
// Sequences ending in a Result
// ============================================================================

#[test]
fn test_error_then_success_has_no_fallbacks() {
    let f = Fixture::new();
    let out = final_output(false, &[f.e1.clone(), f.s1.clone()]);
    assert_eq!(out, f.s1);
    assert!(out.error_ref().is_none());
}

#[test]
fn test_error_not_ready_success_has_no_fallbacks() {
    let f = Fixture::new();
    let out = final_output(
        false,
        &[f.e1.clone(), ResourceState::not_ready(), f.s1.clone()],
    );
    assert_eq!(out, f.s1);
}

#[test]
fn test_success_then_error_carries_value() {
    let f = Fixture::new();
    for prefer in [false, true] {
        let out = final_output(prefer, &[f.s1.clone(), f.e1.clone()]);
        assert_eq!(
            out,
            ResourceState::error(
                TestError::SomeError,
                f.r.clone(),
                Fixture::value_of(&f.s1)
            )
        );
    }
}

#[test]
fn test_success_then_success_keeps_latest() {
    let f = Fixture::new();
    let out = final_output(false, &[f.s1.clone(), f.s2.clone()]);
    assert_eq!(out, f.s2);
    assert_has_value!(out, "second");
}

#[test]
fn test_error_then_error_keeps_latest() {
    let f = Fixture::new();
    let out = final_output(false, &[f.e1.clone(), f.e2.clone()]);
    assert_eq!(out, f.e2);
    assert_has_error!(out, TestError::AnotherError);
    assert_no_value!(out);
}

// ============================================================================
// Request compatibility
// ============================================================================

#[test]
fn test_fallbacks_apply_to_compatible_requests() {
    let first_page = request_for("ann");
    let next_page = LoadRequest::user_refresh(TestParams::page("ann", 1));
    let loaded = success("inbox", &first_page);

    let out = final_output(false, &[loaded.clone(), loading(&next_page)]);
    assert_eq!(
        out,
        ResourceState::loading(next_page, loaded.value_box().cloned(), None)
    );
}

#[test]
fn test_fallbacks_never_cross_to_incompatible_requests() {
    let ann = request_for("ann");
    let bob = request_for("bob");

    let out = final_output(false, &[success("ann's inbox", &ann), loading(&bob)]);
    assert_eq!(out, loading(&bob));

    let out = final_output(
        false,
        &[success("ann's inbox", &ann), failure(TestError::SomeError, &bob)],
    );
    assert_eq!(out, failure(TestError::SomeError, &bob));
}

// ============================================================================
// Streaming
// ============================================================================

#[test]
fn test_attached_reconciler_emits_full_sequence() {
    let f = Fixture::new();
    let source = Property::new(ResourceState::not_ready());
    let reconciler = Arc::new(reconciler(false));
    let recorder = RecordingObserver::<TestState>::new();
    let _out = reconciler.observe(recorder.observer());
    let _link = reconciler.attach(&source);

    source.set(f.s1.clone());
    source.set(f.loading());
    source.set(f.e1.clone());
    source.set(f.loading());

    assert_state_sequence(
        &recorder.values(),
        &[
            ResourceState::not_ready(),
            f.s1.clone(),
            ResourceState::loading(f.r.clone(), Fixture::value_of(&f.s1), None),
            ResourceState::error(TestError::SomeError, f.r.clone(), Fixture::value_of(&f.s1)),
            ResourceState::loading(f.r.clone(), None, Some(TestError::SomeError)),
        ],
    );
    assert_eq!(
        reconciler.latest_result(),
        LatestResult::Error {
            params: TestParams::for_user("ann"),
            error: TestError::SomeError,
        }
    );
}
