//! Reactive Primitives
//!
//! This module implements fine-grained dependency tracking: observed data,
//! the dependency sets that index it, and the watchers that subscribe to it.
//!
//! # Concepts
//!
//! ## Observed data
//!
//! Plain JSON-shaped data is converted once by [`observe`]. Objects become
//! [`ReactiveObject`]s holding one [`ReactiveProperty`] per key; arrays become
//! [`ReactiveArray`]s whose mutating methods notify.
//!
//! ## Deps
//!
//! Every property and every container owns a [`Dep`]: the set of watchers
//! that read it. Reads register, writes notify.
//!
//! ## Watchers
//!
//! A [`Watcher`] is a unit of reactive computation. Eager watchers (renders,
//! user watches) are queued on the scheduler when notified; lazy watchers
//! (backing [`Computed`] values) become stale and re-evaluate on next read.
//!
//! # Implementation Notes
//!
//! The runtime is single-threaded and uses a thread-local context stack to
//! know which watcher is collecting dependencies. Nested evaluation, such as
//! a computed value read during a render, pushes and pops its own frame.

mod array;
mod computed;
mod context;
mod dep;
mod object;
mod observer;
mod property;
mod subscriber;
mod value;
mod watcher;

pub use array::ReactiveArray;
pub use computed::Computed;
pub use context::ReactiveContext;
pub use dep::Dep;
pub use object::ReactiveObject;
pub use observer::{observe, observer_of, Observer};
pub use property::ReactiveProperty;
pub use subscriber::SubscriberId;
pub use value::Value;
pub use watcher::{Getter, Handler, Watcher, WatcherState};
