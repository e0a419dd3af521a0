//! External Tree Contract
//!
//! The reconciler never touches a real tree directly. It drives an
//! implementation of [`Target`], which owns the nodes and hands out opaque
//! [`Handle`]s for them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;

/// Opaque reference to a node owned by a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Handle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Tree-mutation primitives the reconciler requires.
///
/// Creation is infallible. Structural and content operations may be refused,
/// for example when a handle was replaced by markup the runtime does not
/// manage; the reconciler treats those refusals as recoverable.
pub trait Target {
    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> Handle;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> Handle;

    fn set_attribute(&mut self, node: Handle, name: &str, value: &str) -> Result<()>;

    fn remove_attribute(&mut self, node: Handle, name: &str) -> Result<()>;

    /// Insert `child` under `parent` before `reference`, or last when
    /// `reference` is `None`. A child that is already attached is moved.
    fn insert_before(&mut self, parent: Handle, child: Handle, reference: Option<Handle>) -> Result<()>;

    fn append_child(&mut self, parent: Handle, child: Handle) -> Result<()>;

    fn remove_child(&mut self, parent: Handle, child: Handle) -> Result<()>;

    /// Replace the text of a text node.
    fn set_text_content(&mut self, node: Handle, text: &str) -> Result<()>;

    fn parent_node(&self, node: Handle) -> Option<Handle>;

    fn next_sibling(&self, node: Handle) -> Option<Handle>;

    /// Current text of a text node. Fails for nodes that hold no text.
    fn text_content(&self, node: Handle) -> Result<String>;
}

/// A target shared between a component tree and its patches.
///
/// Borrows are held for one primitive at a time, so a patch can mount a
/// nested component against the same target.
pub type SharedTarget = Rc<RefCell<dyn Target>>;

/// Wrap a target for sharing.
pub fn shared<T: Target + 'static>(target: T) -> SharedTarget {
    Rc::new(RefCell::new(target))
}
