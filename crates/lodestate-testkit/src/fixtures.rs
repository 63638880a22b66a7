//! Parameter, error and state fixtures

use lodestate_core::{CacheCompatible, LoadRequest, ResourceState, ValueBox};
use serde::{Deserialize, Serialize};

/// Request parameters of a paginated, per-user resource.
///
/// Two parameter sets are compatible iff they belong to the same user; the
/// page is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestParams {
    /// Authenticated user
    pub user: String,
    /// Page offset
    pub page: u32,
}

impl TestParams {
    /// First page for `user`.
    pub fn for_user(user: &str) -> Self {
        Self {
            user: user.to_string(),
            page: 0,
        }
    }

    /// Given page for `user`.
    pub fn page(user: &str, page: u32) -> Self {
        Self {
            user: user.to_string(),
            page,
        }
    }
}

impl CacheCompatible for TestParams {
    fn is_cache_compatible(&self, other: &Self) -> bool {
        self.user == other.user
    }
}

/// Upstream error payload used across tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestError {
    /// Generic failure
    SomeError,
    /// A second, distinguishable failure
    AnotherError,
    /// Nothing stored in the cache
    CacheMiss,
}

/// State type used by most tests.
pub type TestState = ResourceState<String, TestParams, TestError>;

/// Initial request for `user`.
pub fn request_for(user: &str) -> LoadRequest<TestParams> {
    LoadRequest::initial(TestParams::for_user(user))
}

/// Successful result for `request`, under a fresh value box.
pub fn success(value: &str, request: &LoadRequest<TestParams>) -> TestState {
    ResourceState::value(ValueBox::new(value.to_string()), request.clone(), None)
}

/// Failed result without fallback for `request`.
pub fn failure(error: TestError, request: &LoadRequest<TestParams>) -> TestState {
    ResourceState::error(error, request.clone(), None)
}

/// Loading without fallbacks for `request`.
pub fn loading(request: &LoadRequest<TestParams>) -> TestState {
    ResourceState::loading(request.clone(), None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_compatible_across_pages() {
        assert!(TestParams::page("ann", 0).is_cache_compatible(&TestParams::page("ann", 3)));
        assert!(!TestParams::for_user("ann").is_cache_compatible(&TestParams::for_user("bob")));
    }

    #[test]
    fn test_success_fixture_loaded_successfully() {
        let request = request_for("ann");
        assert!(success("inbox", &request).has_loaded_successfully(&request));
        assert!(!failure(TestError::SomeError, &request).has_loaded_successfully(&request));
    }
}
