//! Patching
//!
//! [`patch`] converges the external tree from an old virtual tree to a new
//! one. Matched nodes keep their external handles; unmatched ones are created
//! or removed. Children lists are reconciled by [`update_children`].
//!
//! # Errors
//!
//! Failures are collected, not propagated: a subtree that cannot be patched
//! records its error and the pass moves on to its siblings. A bound text
//! node whose handle no longer holds text is skipped with a warning.
//!
//! [`update_children`]: super::diff

use std::rc::Rc;

use super::target::{Handle, SharedTarget};
use super::vnode::{same_vnode, ComponentSlot, Text, VNode};
use crate::component::{Instance, MountPoint};
use crate::config;
use crate::error::{Error, Result};

/// What currently occupies the position being patched.
#[derive(Debug)]
pub enum OldTree {
    /// Nothing yet: materialize under `parent`, before `reference`.
    Absent {
        parent: Option<Handle>,
        reference: Option<Handle>,
    },
    /// An unmanaged external node, replaced on first render.
    Raw(Handle),
    /// The tree produced by the previous patch.
    Virtual(VNode),
}

/// Outcome of a patch pass.
#[derive(Debug)]
pub struct Patched {
    /// The new tree, with handles resolved.
    pub vnode: VNode,
    /// Recoverable failures, in the order they happened.
    pub errors: Vec<Error>,
}

impl Patched {
    /// Fold the collected errors into a result.
    pub fn into_result(self) -> Result<VNode> {
        Error::collect(self.errors).map(|()| self.vnode)
    }
}

/// Reconcile `old` into `new` against `target`.
pub fn patch(target: &SharedTarget, old: OldTree, new: VNode) -> Patched {
    let mut patcher = Patcher::new(target.clone());
    let vnode = patcher.patch(old, new);
    Patched {
        vnode,
        errors: patcher.errors,
    }
}

/// State of one patch pass.
pub(crate) struct Patcher {
    target: SharedTarget,
    pub(crate) errors: Vec<Error>,
    warn_on_text_mismatch: bool,
}

impl Patcher {
    pub(crate) fn new(target: SharedTarget) -> Self {
        Self {
            target,
            errors: Vec::new(),
            warn_on_text_mismatch: config::current().warn_on_text_mismatch,
        }
    }

    pub(crate) fn patch(&mut self, old: OldTree, mut new: VNode) -> VNode {
        match old {
            OldTree::Absent { parent, reference } => {
                self.create_elm(&mut new, parent, reference);
            }
            OldTree::Raw(raw) => {
                let (parent, reference) = self.position_of(raw);
                self.create_elm(&mut new, parent, reference);
                if let Some(parent) = parent {
                    let result = self.target.borrow_mut().remove_child(parent, raw);
                    self.record(result);
                }
            }
            OldTree::Virtual(old) if same_vnode(&old, &new) => {
                self.patch_vnode(old, &mut new);
            }
            OldTree::Virtual(old) => {
                // Different root: build the new one beside it, then drop the old.
                let (parent, reference) = match old.handle() {
                    Some(handle) => self.position_of(handle),
                    None => (old.parent, None),
                };
                tracing::debug!(old = ?old.tag(), new = ?new.tag(), "replacing root");
                self.create_elm(&mut new, parent, reference);
                self.remove_vnode(old);
            }
        }
        new
    }

    pub(crate) fn target(&self) -> &SharedTarget {
        &self.target
    }

    fn position_of(&self, node: Handle) -> (Option<Handle>, Option<Handle>) {
        let target = self.target.borrow();
        (target.parent_node(node), target.next_sibling(node))
    }

    pub(crate) fn record(&mut self, result: Result<()>) {
        if let Err(error) = result {
            tracing::warn!(%error, "patch operation failed");
            self.errors.push(error);
        }
    }

    /// Materialize `vnode` and its subtree, inserting it under `parent`.
    pub(crate) fn create_elm(&mut self, vnode: &mut VNode, parent: Option<Handle>, reference: Option<Handle>) {
        vnode.parent = parent;

        if let Some(ComponentSlot::Pending(descriptor)) = &vnode.component {
            let descriptor = Rc::clone(descriptor);
            self.create_component(vnode, descriptor, parent, reference);
            return;
        }

        let handle = match &vnode.text {
            Some(text) => {
                let content = text.render().unwrap_or_else(|error| {
                    self.errors.push(error);
                    String::new()
                });
                self.target.borrow_mut().create_text(&content)
            }
            None => {
                let tag = vnode.tag.as_deref().unwrap_or_default();
                let handle = self.target.borrow_mut().create_element(tag);
                for (name, value) in &vnode.props {
                    let result = self.target.borrow_mut().set_attribute(handle, name, value);
                    self.record(result);
                }
                for child in &mut vnode.children {
                    self.create_elm(child, Some(handle), None);
                }
                handle
            }
        };
        vnode.handle = Some(handle);
        tracing::debug!(%handle, tag = ?vnode.tag(), "created node");

        if let Some(parent) = parent {
            self.insert(parent, handle, reference);
        }
    }

    fn create_component(
        &mut self,
        vnode: &mut VNode,
        descriptor: Rc<crate::component::ComponentDescriptor>,
        parent: Option<Handle>,
        reference: Option<Handle>,
    ) {
        let Some(parent) = parent else {
            self.errors.push(Error::MissingHandle);
            return;
        };
        let at = match reference {
            Some(reference) => MountPoint::Before { parent, reference },
            None => MountPoint::Append { parent },
        };

        let instance = match Instance::new(descriptor) {
            Ok(instance) => instance,
            Err(error) => {
                self.errors.push(error);
                return;
            }
        };
        // A child whose own subtree failed is still mounted and tracked.
        if let Err(error) = instance.mount(self.target.clone(), at) {
            self.errors.push(error);
        }
        if instance.is_mounted() {
            vnode.handle = instance.root_handle();
            tracing::debug!(instance = instance.id(), tag = ?vnode.tag(), "mounted child component");
            vnode.component = Some(ComponentSlot::Mounted(instance));
        }
    }

    pub(crate) fn insert(&mut self, parent: Handle, child: Handle, reference: Option<Handle>) {
        let result = match reference {
            Some(reference) => self
                .target
                .borrow_mut()
                .insert_before(parent, child, Some(reference)),
            None => self.target.borrow_mut().append_child(parent, child),
        };
        self.record(result);
    }

    /// Patch `new` in place of the matching `old` node.
    pub(crate) fn patch_vnode(&mut self, mut old: VNode, new: &mut VNode) {
        new.parent = old.parent;

        if let Some(ComponentSlot::Mounted(instance)) = old.component.take() {
            // The child re-renders on its own; only carry it forward.
            new.handle = instance.root_handle().or(old.handle);
            new.component = Some(ComponentSlot::Mounted(instance));
            return;
        }

        if matches!(old.component, Some(ComponentSlot::Pending(_))) && old.handle.is_none() {
            // The child failed to mount; that failure was already reported.
            return;
        }

        let Some(handle) = old.handle else {
            self.errors.push(Error::MissingHandle);
            return;
        };
        new.handle = Some(handle);

        if new.text.is_some() {
            self.patch_text(&old, new, handle);
            return;
        }

        self.patch_props(&old, new, handle);

        let old_children = std::mem::take(&mut old.children);
        match (old_children.is_empty(), new.children.is_empty()) {
            (false, false) => self.update_children(handle, old_children, &mut new.children),
            (true, false) => {
                for child in &mut new.children {
                    self.create_elm(child, Some(handle), None);
                }
            }
            (false, true) => {
                for child in old_children {
                    self.remove_vnode(child);
                }
            }
            (true, true) => {}
        }
    }

    fn patch_props(&mut self, old: &VNode, new: &VNode, handle: Handle) {
        for (name, value) in &new.props {
            if old.props.get(name) != Some(value) {
                let result = self.target.borrow_mut().set_attribute(handle, name, value);
                self.record(result);
            }
        }
        for name in old.props.keys() {
            if !new.props.contains_key(name) {
                let result = self.target.borrow_mut().remove_attribute(handle, name);
                self.record(result);
            }
        }
    }

    fn patch_text(&mut self, old: &VNode, new: &VNode, handle: Handle) {
        let next = match &new.text {
            Some(Text::Static(literal)) => {
                if let Some(Text::Static(previous)) = &old.text {
                    if previous == literal {
                        return;
                    }
                }
                literal.clone()
            }
            Some(Text::Bound(binding)) => match binding.render() {
                Ok(text) => text,
                Err(error) => {
                    self.errors.push(error);
                    return;
                }
            },
            None => return,
        };

        let current = self.target.borrow().text_content(handle);
        match current {
            Ok(current) if current == next => {}
            Ok(_) => {
                let result = self.target.borrow_mut().set_text_content(handle, &next);
                if let Err(error) = result {
                    self.skip_text(handle, &error);
                }
            }
            Err(error) => self.skip_text(handle, &error),
        }
    }

    fn skip_text(&self, handle: Handle, error: &Error) {
        if self.warn_on_text_mismatch {
            tracing::warn!(%handle, %error, "text node no longer accepts text, skipping write");
        }
    }

    /// Detach `vnode` from the tree and destroy any components inside it.
    pub(crate) fn remove_vnode(&mut self, vnode: VNode) {
        if let Some(handle) = vnode.handle() {
            let parent = vnode
                .parent
                .or_else(|| self.target.borrow().parent_node(handle));
            if let Some(parent) = parent {
                let result = self.target.borrow_mut().remove_child(parent, handle);
                self.record(result);
            }
            tracing::debug!(%handle, "removed node");
        }
        vnode.for_each_instance(&mut |instance| instance.destroy());
    }
}
