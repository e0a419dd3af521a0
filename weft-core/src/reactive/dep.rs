//! Dependency Sets
//!
//! A [`Dep`] is the reverse index from one reactive property (or one observed
//! container) to the subscribers that read it. Reading registers the active
//! subscriber; writing notifies every registered subscriber in registration
//! order.
//!
//! Subscribers are held weakly: a Dep never keeps a torn-down render alive.
//! Teardown still removes the entry eagerly so notification lists don't grow
//! with dead references.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::watcher::WeakWatcher;
use super::{SubscriberId, Watcher};

/// Counter for generating unique dep IDs.
static DEP_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_dep_id() -> u64 {
    DEP_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Ordered set of subscribers attached to one reactive source.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

struct DepInner {
    id: u64,
    /// Insertion order is notification order.
    subscribers: RefCell<IndexMap<SubscriberId, WeakWatcher>>,
    notified: Cell<u64>,
}

impl Dep {
    /// Create an empty dependency set.
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            id: next_dep_id(),
            subscribers: RefCell::new(IndexMap::new()),
            notified: Cell::new(0),
        }))
    }

    /// Get the dep's unique ID.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Register the active subscriber, if there is one.
    ///
    /// Repeated reads within one evaluation register the subscriber once.
    pub fn depend(&self) {
        if let Some(watcher) = ReactiveContext::current() {
            self.add_subscriber(&watcher);
        }
    }

    /// Register `watcher` directly, bypassing the context stack.
    pub fn add_subscriber(&self, watcher: &Watcher) {
        let inserted = {
            let mut subscribers = self.0.subscribers.borrow_mut();
            if subscribers.contains_key(&watcher.id()) {
                false
            } else {
                subscribers.insert(watcher.id(), watcher.downgrade());
                true
            }
        };

        if inserted {
            tracing::trace!(dep = self.id(), subscriber = %watcher.id(), "dependency registered");
        }
        // Already subscribed from an earlier run still counts for this one.
        watcher.add_dep(self);
    }

    /// Remove a subscriber. Order of the remaining subscribers is preserved.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        self.0.subscribers.borrow_mut().shift_remove(&id);
    }

    /// Call `update()` on every live subscriber, in registration order.
    ///
    /// Deduplication across several deps notifying the same subscriber is the
    /// scheduler's job, not ours.
    pub fn notify(&self) {
        // Snapshot first: updating may register or remove subscribers.
        let subscribers: Vec<Watcher> = self
            .0
            .subscribers
            .borrow()
            .values()
            .filter_map(WeakWatcher::upgrade)
            .collect();

        self.0.notified.set(self.0.notified.get() + 1);
        tracing::trace!(dep = self.id(), count = subscribers.len(), "notifying subscribers");

        for watcher in subscribers {
            watcher.update();
        }
    }

    /// Get the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// How many times `notify()` has been called.
    pub fn notify_count(&self) -> u64 {
        self.0.notified.get()
    }

    /// Check whether `id` is registered.
    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.0.subscribers.borrow().contains_key(&id)
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.0))
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Non-owning reference to a [`Dep`], held by watchers for teardown.
#[derive(Clone)]
pub(crate) struct WeakDep(Weak<DepInner>);

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(Dep)
    }
}
