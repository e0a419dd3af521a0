//! Watcher Implementation
//!
//! A Watcher is a unit of reactive computation. The same type backs the three
//! kinds of subscriber the runtime creates:
//!
//! - Render watchers: eager, created when a component mounts. Their callback
//!   renders and patches.
//! - Computed watchers: lazy. Invalidation only marks them stale; the next
//!   read re-evaluates (see [`Computed`](super::Computed)).
//! - User watchers: eager, with a handler called with `(new, old)` whenever
//!   the watched value changes.
//!
//! # States
//!
//! ```text
//!   lazy:   LazyStale --evaluate--> LazyFresh --update--> LazyStale
//!   eager:  Eager --update--> Queued --flush/run--> Eager
//! ```
//!
//! An eager watcher never runs inside `update()`. It hands itself to the
//! scheduler so that a burst of synchronous writes becomes one run.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::dep::{Dep, WeakDep};
use super::{SubscriberId, Value};
use crate::error::Result;
use crate::scheduler;

/// Callback evaluated by a watcher.
pub type Getter = Rc<dyn Fn() -> Result<Value>>;

/// Handler of a user watcher, called with `(new, old)`.
pub type Handler = Rc<dyn Fn(&Value, &Value) -> Result<()>>;

type DepList = SmallVec<[(u64, WeakDep); 4]>;

/// Observable lifecycle state of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Lazy, never evaluated or invalidated since the last evaluation.
    LazyStale,
    /// Lazy, holding a cached value.
    LazyFresh,
    /// Eager and idle.
    Eager,
    /// Eager and waiting in the scheduler queue.
    Queued,
    /// Torn down; will never run again.
    Inactive,
}

/// A unit of reactive computation.
#[derive(Clone)]
pub struct Watcher(Rc<WatcherInner>);

struct WatcherInner {
    id: SubscriberId,
    getter: Getter,
    handler: Option<Handler>,
    lazy: bool,
    stale: Cell<bool>,
    active: Cell<bool>,
    value: RefCell<Value>,
    /// Deps this watcher joined, for teardown and for `depend()`.
    deps: RefCell<DepList>,
    /// Component that owns this watcher, if any.
    owner: Cell<Option<u64>>,
    run_count: Cell<usize>,
}

impl Watcher {
    fn create(getter: Getter, handler: Option<Handler>, lazy: bool) -> Self {
        Self(Rc::new(WatcherInner {
            id: SubscriberId::next(),
            getter,
            handler,
            lazy,
            stale: Cell::new(lazy),
            active: Cell::new(true),
            value: RefCell::new(Value::Null),
            deps: RefCell::new(SmallVec::new()),
            owner: Cell::new(None),
            run_count: Cell::new(0),
        }))
    }

    /// Create an eager watcher and evaluate it immediately to collect its
    /// initial dependencies.
    pub fn new<F>(getter: F) -> Result<Self>
    where
        F: Fn() -> Result<Value> + 'static,
    {
        let watcher = Self::create(Rc::new(getter), None, false);
        watcher.get()?;
        Ok(watcher)
    }

    /// Create a lazy watcher. Nothing runs until the first `evaluate()`.
    pub fn lazy<F>(getter: F) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self::create(Rc::new(getter), None, true)
    }

    /// Create an eager watcher whose `handler` runs after each re-evaluation
    /// that produced a different value.
    pub fn user<F, H>(getter: F, handler: H) -> Result<Self>
    where
        F: Fn() -> Result<Value> + 'static,
        H: Fn(&Value, &Value) -> Result<()> + 'static,
    {
        let watcher = Self::create(Rc::new(getter), Some(Rc::new(handler)), false);
        watcher.get()?;
        Ok(watcher)
    }

    /// Get the watcher's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    /// Evaluate the callback with this watcher on top of the context stack,
    /// caching the result.
    ///
    /// A successful run leaves the watcher subscribed to exactly the deps it
    /// read. A failed run keeps the earlier subscriptions as well.
    pub fn get(&self) -> Result<Value> {
        // Clone the callback out so a re-entrant run never aliases a borrow.
        let getter = Rc::clone(&self.0.getter);
        let previous = std::mem::take(&mut *self.0.deps.borrow_mut());
        let result = {
            let _ctx = ReactiveContext::enter(self);
            getter()
        };
        self.0.run_count.set(self.0.run_count.get() + 1);

        match result {
            Ok(value) => {
                self.cleanup_deps(previous);
                *self.0.value.borrow_mut() = value.clone();
                Ok(value)
            }
            Err(error) => {
                self.restore_deps(previous);
                Err(error)
            }
        }
    }

    /// Unsubscribe from deps read by the previous run but not by this one.
    fn cleanup_deps(&self, previous: DepList) {
        if !self.is_active() {
            self.detach(previous);
            return;
        }
        let dropped: Vec<Dep> = {
            let current = self.0.deps.borrow();
            previous
                .iter()
                .filter(|(id, _)| !current.iter().any(|(kept, _)| kept == id))
                .filter_map(|(_, dep)| dep.upgrade())
                .collect()
        };
        for dep in &dropped {
            dep.remove_subscriber(self.id());
        }
        if !dropped.is_empty() {
            tracing::trace!(subscriber = %self.id(), dropped = dropped.len(), "stale deps pruned");
        }
    }

    fn restore_deps(&self, previous: DepList) {
        if !self.is_active() {
            self.detach(previous);
            return;
        }
        let mut deps = self.0.deps.borrow_mut();
        for (id, dep) in previous {
            if !deps.iter().any(|(kept, _)| *kept == id) {
                deps.push((id, dep));
            }
        }
    }

    /// Torn down mid-run: drop whatever the run and its predecessor joined.
    fn detach(&self, previous: DepList) {
        let current = std::mem::take(&mut *self.0.deps.borrow_mut());
        for dep in previous.iter().chain(current.iter()).filter_map(|(_, dep)| dep.upgrade()) {
            dep.remove_subscriber(self.id());
        }
    }

    /// React to a dependency change.
    ///
    /// Lazy watchers only become stale. Eager watchers are queued.
    pub fn update(&self) {
        if !self.is_active() {
            return;
        }
        if self.0.lazy {
            self.0.stale.set(true);
        } else {
            scheduler::queue_watcher(self.clone());
        }
    }

    /// Return the cached value, re-evaluating first if stale.
    ///
    /// A failed evaluation leaves the watcher stale.
    pub fn evaluate(&self) -> Result<Value> {
        if self.0.stale.get() {
            self.get()?;
            self.0.stale.set(false);
        }
        Ok(self.value())
    }

    /// Re-run the watcher. Called by the scheduler during a flush.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }

        let old = self.value();
        let new = self.get()?;

        if let Some(handler) = &self.0.handler {
            if !new.same(&old) || new.is_container() {
                handler(&new, &old)?;
            }
        }
        Ok(())
    }

    /// Register every dep of this watcher with the active subscriber.
    ///
    /// A render that reads a computed value must also be invalidated by that
    /// value's own sources.
    pub fn depend(&self) {
        let deps: Vec<Dep> = self
            .0
            .deps
            .borrow()
            .iter()
            .filter_map(|(_, dep)| dep.upgrade())
            .collect();
        for dep in deps {
            dep.depend();
        }
    }

    /// Detach from every dep. The watcher never runs again.
    pub fn teardown(&self) {
        if !self.0.active.replace(false) {
            return;
        }
        let deps = std::mem::take(&mut *self.0.deps.borrow_mut());
        for dep in deps.iter().filter_map(|(_, dep)| dep.upgrade()) {
            dep.remove_subscriber(self.id());
        }
        tracing::debug!(subscriber = %self.id(), deps = deps.len(), "watcher torn down");
    }

    pub(crate) fn add_dep(&self, dep: &Dep) {
        let mut deps = self.0.deps.borrow_mut();
        if !deps.iter().any(|(id, _)| *id == dep.id()) {
            deps.push((dep.id(), dep.downgrade()));
        }
    }

    /// The cached value of the last successful evaluation.
    pub fn value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Check if the watcher is lazy.
    pub fn is_lazy(&self) -> bool {
        self.0.lazy
    }

    /// Check if a lazy watcher needs re-evaluation.
    pub fn is_stale(&self) -> bool {
        self.0.stale.get()
    }

    /// Check if the watcher has not been torn down.
    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatcherState {
        match (self.is_active(), self.0.lazy, self.0.stale.get()) {
            (false, _, _) => WatcherState::Inactive,
            (true, true, true) => WatcherState::LazyStale,
            (true, true, false) => WatcherState::LazyFresh,
            (true, false, _) if scheduler::is_queued(self.id()) => WatcherState::Queued,
            (true, false, _) => WatcherState::Eager,
        }
    }

    /// Number of times the callback has been invoked.
    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Number of deps this watcher is registered with.
    pub fn dep_count(&self) -> usize {
        self.0.deps.borrow().len()
    }

    /// Record the component that owns this watcher.
    pub fn set_owner(&self, owner: u64) {
        self.0.owner.set(Some(owner));
    }

    /// Component that owns this watcher, if any.
    pub fn owner(&self) -> Option<u64> {
        self.0.owner.get()
    }

    pub(crate) fn downgrade(&self) -> WeakWatcher {
        WeakWatcher(Rc::downgrade(&self.0))
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("run_count", &self.run_count())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

/// Non-owning reference to a [`Watcher`], held by deps.
#[derive(Clone)]
pub(crate) struct WeakWatcher(Weak<WatcherInner>);

impl WeakWatcher {
    pub(crate) fn upgrade(&self) -> Option<Watcher> {
        self.0.upgrade().map(Watcher)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
