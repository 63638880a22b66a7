//! Load requests and the cache-compatibility predicate

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Decides whether a state produced for `self` may stand in for `other`.
///
/// Implementations should be reflexive and treat "same logical resource" as
/// an equivalence: ignore pagination offsets, but never ignore the
/// authenticated identity. This predicate is the only thing preventing a
/// previous request's data from surfacing under a new one.
pub trait CacheCompatible {
    /// Returns true if a state loaded with `self` is valid for `other`.
    fn is_cache_compatible(&self, other: &Self) -> bool;
}

/// Parameters for resources without any varying request parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoParams;

impl CacheCompatible for NoParams {
    fn is_cache_compatible(&self, _other: &Self) -> bool {
        true
    }
}

/// What a load request asks the producers to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadMode {
    /// First load of the resource
    Initial,
    /// Reload everything
    FullRefresh,
    /// Load an additional part (e.g. next page)
    PartialLoad,
    /// Reload a part that was already loaded
    PartialReload,
}

/// Who triggered a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Issuer {
    /// Direct user interaction (pull to refresh, retry button)
    User,
    /// Triggered programmatically (startup, timer)
    System,
}

/// Tag attached to every load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestType {
    /// What to load
    pub mode: LoadMode,
    /// Who asked for it
    pub issuer: Issuer,
    /// Whether views should show a loading indicator
    pub show_loading_indicator: bool,
}

impl RequestType {
    /// System-issued initial load with loading indicator.
    pub const INITIAL: RequestType = RequestType {
        mode: LoadMode::Initial,
        issuer: Issuer::System,
        show_loading_indicator: true,
    };

    /// Create a request type.
    pub const fn new(mode: LoadMode, issuer: Issuer, show_loading_indicator: bool) -> Self {
        Self {
            mode,
            issuer,
            show_loading_indicator,
        }
    }

    /// Full refresh issued by the given actor, with loading indicator.
    pub const fn full_refresh(issuer: Issuer) -> Self {
        Self::new(LoadMode::FullRefresh, issuer, true)
    }
}

/// An immutable, parameterized trigger for (re)loading a resource.
///
/// Each request carries its own identity: two requests are equal iff they
/// are the same emission. Deciding whether a *state* still fits a request is
/// a separate question answered by [`LoadRequest::is_cache_compatible`].
#[derive(Clone, Serialize, Deserialize)]
pub struct LoadRequest<P> {
    params: P,
    request_type: RequestType,
    identity: Uuid,
}

impl<P> LoadRequest<P> {
    /// Create a request under a fresh identity.
    pub fn new(params: P, request_type: RequestType) -> Self {
        Self {
            params,
            request_type,
            identity: Uuid::new_v4(),
        }
    }

    /// System-issued initial request.
    pub fn initial(params: P) -> Self {
        Self::new(params, RequestType::INITIAL)
    }

    /// User-issued full refresh.
    pub fn user_refresh(params: P) -> Self {
        Self::new(params, RequestType::full_refresh(Issuer::User))
    }

    /// Request parameters.
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Request type tag.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Request identity.
    pub fn identity(&self) -> Uuid {
        self.identity
    }

    /// Same request (same identity) with replaced parameters.
    pub fn with_params(&self, params: P) -> Self {
        Self {
            params,
            request_type: self.request_type,
            identity: self.identity,
        }
    }
}

impl<P: CacheCompatible> LoadRequest<P> {
    /// Whether a state produced for `self` may be shown for `candidate`.
    pub fn is_cache_compatible(&self, candidate: &LoadRequest<P>) -> bool {
        self.params.is_cache_compatible(&candidate.params)
    }
}

impl<P> PartialEq for LoadRequest<P> {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl<P> Eq for LoadRequest<P> {}

impl<P: fmt::Debug> fmt::Debug for LoadRequest<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("params", &self.params)
            .field("request_type", &self.request_type)
            .field("identity", &self.identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Page {
        user: &'static str,
        offset: u32,
    }

    impl CacheCompatible for Page {
        fn is_cache_compatible(&self, other: &Self) -> bool {
            self.user == other.user
        }
    }

    #[test]
    fn test_requests_compare_by_identity() {
        let a = LoadRequest::initial(NoParams);
        let b = LoadRequest::initial(NoParams);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_with_params_keeps_identity() {
        let a = LoadRequest::initial(Page {
            user: "ann",
            offset: 0,
        });
        let b = a.with_params(Page {
            user: "ann",
            offset: 20,
        });
        assert_eq!(a, b);
        assert_eq!(b.params().offset, 20);
    }

    #[test]
    fn test_compatibility_follows_params() {
        let ann_0 = LoadRequest::initial(Page {
            user: "ann",
            offset: 0,
        });
        let ann_20 = LoadRequest::user_refresh(Page {
            user: "ann",
            offset: 20,
        });
        let bob = LoadRequest::initial(Page {
            user: "bob",
            offset: 0,
        });

        assert!(ann_0.is_cache_compatible(&ann_20));
        assert!(!ann_0.is_cache_compatible(&bob));
        assert_eq!(ann_20.request_type().issuer, Issuer::User);
        assert_eq!(ann_20.request_type().mode, LoadMode::FullRefresh);
    }

    #[test]
    fn test_no_params_always_compatible() {
        assert!(NoParams.is_cache_compatible(&NoParams));
    }
}
