//! Virtual Tree Reconciliation
//!
//! Render functions describe the desired tree as [`VNode`]s. [`patch`]
//! compares that description with the previous one and applies the
//! difference to a [`Target`], reusing external nodes wherever the key and
//! tag of a node are unchanged.

mod diff;
mod memory;
mod patch;
mod target;
mod vnode;

pub use memory::{MemoryTree, Op};
pub use patch::{patch, OldTree, Patched};
pub use target::{shared, Handle, SharedTarget, Target};
pub use vnode::{same_vnode, Binding, Key, Text, VNode};
