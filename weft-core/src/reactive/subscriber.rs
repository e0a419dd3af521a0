//! Subscriber identity.
//!
//! Every subscriber (render, computed value or user watch) gets a unique ID
//! when created. IDs are strictly increasing, so they double as the total
//! order the scheduler flushes in: parents are created before children and
//! therefore run first.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique, monotonically increasing identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate the next subscriber ID.
    ///
    /// Uses an atomic counter so IDs stay unique across threads even though
    /// each thread runs its own reactive runtime.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriberId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::next();
        let id2 = SubscriberId::next();
        let id3 = SubscriberId::next();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn subscriber_ids_increase() {
        let first = SubscriberId::next();
        let second = SubscriberId::next();

        assert!(first < second);
        assert!(first.raw() < second.raw());
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(SubscriberId::from(42).to_string(), "#42");
    }
}
