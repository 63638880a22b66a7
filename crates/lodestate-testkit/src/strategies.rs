//! Property test strategies for lodestate types
//!
//! Inputs are generated as small plans (which user, which kind of state)
//! and turned into states by the test, so that value-box identities stay
//! under the test's control.

use proptest::prelude::*;

// Re-export proptest for convenience
pub use proptest;

use crate::fixtures::{TestError, TestParams};

/// Strategy for user names from a small pool, so collisions are frequent.
pub fn arb_user() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["ann", "bob", "cyd"]).prop_map(str::to_string)
}

/// Strategy for request parameters.
pub fn arb_params() -> impl Strategy<Value = TestParams> {
    (arb_user(), 0u32..5).prop_map(|(user, page)| TestParams { user, page })
}

/// Strategy for error payloads.
pub fn arb_error() -> impl Strategy<Value = TestError> {
    prop_oneof![Just(TestError::SomeError), Just(TestError::AnotherError)]
}

/// Shape of a state to build for a given request.
#[derive(Debug, Clone, PartialEq)]
pub enum StatePlan {
    /// `NotReady`
    NotReady,
    /// `Loading` without fallbacks
    Loading,
    /// `Loading` with a fallback value
    LoadingWithValue(String),
    /// Successful result
    Success(String),
    /// Error result
    Failure(TestError),
    /// Error result with a fallback value
    FailureWithValue(TestError, String),
}

/// Strategy for state shapes.
pub fn arb_state_plan() -> impl Strategy<Value = StatePlan> {
    let value = "[a-z]{1,6}";
    prop_oneof![
        Just(StatePlan::NotReady),
        Just(StatePlan::Loading),
        value.prop_map(StatePlan::LoadingWithValue),
        value.prop_map(StatePlan::Success),
        arb_error().prop_map(StatePlan::Failure),
        (arb_error(), value).prop_map(|(e, v)| StatePlan::FailureWithValue(e, v)),
    ]
}

impl StatePlan {
    /// Build the planned state for `request`, minting fresh value boxes.
    pub fn build(
        &self,
        request: &lodestate_core::LoadRequest<TestParams>,
    ) -> crate::fixtures::TestState {
        use lodestate_core::{ResourceState, ValueBox};
        let boxed = |v: &String| Some(ValueBox::new(v.clone()));
        match self {
            Self::NotReady => ResourceState::not_ready(),
            Self::Loading => ResourceState::loading(request.clone(), None, None),
            Self::LoadingWithValue(v) => ResourceState::loading(request.clone(), boxed(v), None),
            Self::Success(v) => {
                ResourceState::value(ValueBox::new(v.clone()), request.clone(), None)
            }
            Self::Failure(e) => ResourceState::error(e.clone(), request.clone(), None),
            Self::FailureWithValue(e, v) => {
                ResourceState::error(e.clone(), request.clone(), boxed(v))
            }
        }
    }
}
