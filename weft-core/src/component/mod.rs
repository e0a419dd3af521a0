//! Components
//!
//! A component ties the reactive layer to the reconciler: its data is
//! observed, its computed values are lazy watchers, and its render function
//! runs inside an eager watcher whose every run re-renders and patches.

mod descriptor;
mod instance;

pub use descriptor::{ComponentDescriptor, ComputedFn, Data, MethodFn, RenderFn};
pub use instance::{Instance, MountPoint};
