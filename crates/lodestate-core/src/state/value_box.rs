//! Identity-boxed values
//!
//! A [`ValueBox`] is minted once, when a producer creates a value (API
//! response, cache read, computed result), and is then passed around and
//! compared many times. Two boxes are equal iff they were minted together,
//! so equality never inspects the payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// A shared value with identity-based equality.
///
/// Cloning a box is cheap (reference count bump) and preserves identity.
/// [`ValueBox::new`] and [`ValueBox::map`] always mint a new identity, even for
/// payloads that are structurally equal.
#[derive(Serialize, Deserialize)]
pub struct ValueBox<V> {
    value: Arc<V>,
    identity: Uuid,
}

impl<V> ValueBox<V> {
    /// Box a value under a fresh identity.
    pub fn new(value: V) -> Self {
        Self {
            value: Arc::new(value),
            identity: Uuid::new_v4(),
        }
    }

    /// Borrow the boxed value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The identity this box compares by.
    pub fn identity(&self) -> Uuid {
        self.identity
    }

    /// Transform the payload. The result is a distinct box.
    pub fn map<U>(&self, transform: impl FnOnce(&V) -> U) -> ValueBox<U> {
        ValueBox::new(transform(&self.value))
    }
}

impl<V> Clone for ValueBox<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            identity: self.identity,
        }
    }
}

impl<V> PartialEq for ValueBox<V> {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl<V> Eq for ValueBox<V> {}

impl<V> Hash for ValueBox<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl<V> Deref for ValueBox<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.value
    }
}

impl<V: fmt::Debug> fmt::Debug for ValueBox<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBox")
            .field("value", &self.value)
            .field("identity", &self.identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_payloads_are_distinct_boxes() {
        let a = ValueBox::new("same".to_string());
        let b = ValueBox::new("same".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn test_clone_preserves_identity() {
        let a = ValueBox::new(vec![1, 2, 3]);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.identity(), b.identity());
        assert_eq!(b.value(), &vec![1, 2, 3]);
    }

    #[test]
    fn test_map_mints_new_identity() {
        let a = ValueBox::new(2);
        let doubled = a.map(|v| v * 2);
        assert_eq!(*doubled, 4);
        assert_ne!(a.identity(), doubled.identity());
    }

    #[test]
    fn test_serde_keeps_identity() {
        let a = ValueBox::new("cached".to_string());
        let json = serde_json::to_string(&a).unwrap();
        let back: ValueBox<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
        assert_eq!(back.value(), "cached");
    }
}
