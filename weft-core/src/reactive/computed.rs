//! Computed Values
//!
//! A [`Computed`] is a derived value backed by a lazy [`Watcher`]. It
//! re-evaluates only when read after one of its sources changed, so within
//! one flush every reader sees the same cached result.
//!
//! # Reading from a render
//!
//! The computed watcher is the one registered with the sources it reads. To
//! make the reader (typically a render watcher) react to those sources too,
//! a tracked read calls [`Watcher::depend`], which registers the reader with
//! every dep of the computed watcher.

use std::fmt;

use super::context::ReactiveContext;
use super::watcher::WatcherState;
use super::{Value, Watcher};
use crate::error::Result;

/// A memoized derived value.
#[derive(Clone)]
pub struct Computed {
    watcher: Watcher,
}

impl Computed {
    /// Create a computed value. The derivation does not run until first read.
    pub fn new<F>(derive: F) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self {
            watcher: Watcher::lazy(derive),
        }
    }

    /// Get the current value, re-deriving if a source changed.
    pub fn get(&self) -> Result<Value> {
        let value = self.watcher.evaluate()?;
        if ReactiveContext::is_active() {
            self.watcher.depend();
        }
        Ok(value)
    }

    /// Check if the next read will re-derive.
    pub fn is_stale(&self) -> bool {
        self.watcher.is_stale()
    }

    /// Whether a value has been derived and not invalidated since.
    pub fn is_fresh(&self) -> bool {
        self.watcher.state() == WatcherState::LazyFresh
    }

    /// The backing lazy watcher.
    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.watcher.id())
            .field("state", &self.watcher.state())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
