//! Weft Core
//!
//! This crate provides the core runtime for the Weft reactive UI framework.
//! It implements:
//!
//! - Observed data with fine-grained dependency tracking
//! - Watchers (render, computed, user) and a batching update scheduler
//! - Virtual tree reconciliation with a keyed children diff
//! - Components tying the three together
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: observed data, deps, watchers and computed values
//! - `scheduler`: the per-thread event loop, `next_tick` and the watcher queue
//! - `render`: virtual nodes, the external tree contract and patching
//! - `component`: component descriptors and live instances
//!
//! Everything runs on one thread. Writes notify synchronously; re-renders
//! are queued and happen when the host drives the event loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use weft_core::component::{ComponentDescriptor, Instance, MountPoint};
//! use weft_core::render::{shared, MemoryTree, Target};
//! use weft_core::scheduler::EventLoop;
//!
//! let counter = ComponentDescriptor::new()
//!     .data(json!({ "count": 0 }))
//!     .render(|vm| Ok(vm.h("p", [vm.bind_text("count")])));
//!
//! let target = shared(MemoryTree::new());
//! let body = target.borrow_mut().create_element("body");
//!
//! let vm = Instance::new(counter)?;
//! vm.mount(target.clone(), MountPoint::Append { parent: body })?;
//!
//! vm.set("count", 1)?;
//! // Nothing re-rendered yet: the write only queued the render watcher.
//! EventLoop::run_until_idle()?;
//! // Now the text node reads "1".
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use component::{ComponentDescriptor, Instance, MountPoint};
pub use config::Config;
pub use error::{Error, Result};
pub use reactive::{observe, Computed, ReactiveArray, ReactiveObject, Value, Watcher};
pub use render::{Handle, MemoryTree, SharedTarget, Target, VNode};
pub use scheduler::{next_tick, EventLoop};
