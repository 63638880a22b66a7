//! Standard assertion helpers for tests
//!
//! Macros checking the shape of a `ResourceState` without spelling out
//! every field.

use lodestate_core::{ProvisioningState, ResourceState};
use std::fmt::Debug;

/// Assert that a state is `NotReady`
#[macro_export]
macro_rules! assert_not_ready {
    ($state:expr) => {
        assert!(
            $state.is_not_ready(),
            "Expected NotReady, found {:?}",
            $state
        )
    };
}

/// Assert that a state carries the expected value payload
#[macro_export]
macro_rules! assert_has_value {
    ($state:expr, $expected:expr) => {
        match $state {
            ref state => assert_eq!(
                state.value_ref().map(|v| v.as_str()),
                Some($expected),
                "Unexpected value in {:?}",
                state
            ),
        }
    };
}

/// Assert that a state carries no value
#[macro_export]
macro_rules! assert_no_value {
    ($state:expr) => {
        assert!(
            $state.value_box().is_none(),
            "Expected no value in {:?}",
            $state
        )
    };
}

/// Assert that a state carries the expected error
#[macro_export]
macro_rules! assert_has_error {
    ($state:expr, $expected:expr) => {
        assert_eq!(
            $state.error_ref(),
            Some(&$expected),
            "Unexpected error in {:?}",
            $state
        )
    };
}

/// Assert the provisioning state of a resource state.
pub fn assert_provisioning<V: Debug, P: Debug, E: Debug>(
    state: &ResourceState<V, P, E>,
    expected: ProvisioningState,
) {
    assert_eq!(
        state.provisioning_state(),
        expected,
        "Provisioning state mismatch in {state:?}"
    );
}

/// Assert that two state sequences are equal, reporting the first mismatch.
pub fn assert_state_sequence<V: Debug, P: Debug, E: Debug + PartialEq>(
    actual: &[ResourceState<V, P, E>],
    expected: &[ResourceState<V, P, E>],
) {
    for (index, (actual, expected)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(actual, expected, "State #{index} differs");
    }
    assert_eq!(
        actual.len(),
        expected.len(),
        "Sequence length differs: {actual:?}"
    );
}
