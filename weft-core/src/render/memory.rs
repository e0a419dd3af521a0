//! In-memory [`Target`].
//!
//! `MemoryTree` keeps nodes in an arena and records every mutating call in an
//! operation log, which makes it convenient for asserting exactly which
//! writes a patch performed.

use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;

use super::target::{Handle, Target};
use crate::error::{Error, Result};

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    CreateElement { node: Handle, tag: String },
    CreateText { node: Handle, text: String },
    SetAttribute { node: Handle, name: String, value: String },
    RemoveAttribute { node: Handle, name: String },
    InsertBefore { parent: Handle, child: Handle, reference: Option<Handle> },
    AppendChild { parent: Handle, child: Handle },
    RemoveChild { parent: Handle, child: Handle },
    SetText { node: Handle, text: String },
}

impl Op {
    /// Whether this op creates a node.
    pub fn is_create(&self) -> bool {
        matches!(self, Op::CreateElement { .. } | Op::CreateText { .. })
    }

    /// Whether this op attaches or moves a node.
    pub fn is_insert(&self) -> bool {
        matches!(self, Op::InsertBefore { .. } | Op::AppendChild { .. })
    }
}

#[derive(Debug)]
enum Content {
    Element { tag: String, attributes: IndexMap<String, String> },
    Text(String),
}

#[derive(Debug)]
struct MemoryNode {
    content: Content,
    parent: Option<Handle>,
    children: Vec<Handle>,
}

/// Arena-backed tree with an operation log.
#[derive(Debug, Default)]
pub struct MemoryTree {
    nodes: HashMap<Handle, MemoryNode>,
    next_id: u64,
    ops: Vec<Op>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation recorded since creation or the last `clear_ops`.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Count recorded operations matching `pred`.
    pub fn count_ops(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: Handle) -> Vec<Handle> {
        self.nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Tag of an element node.
    pub fn tag(&self, node: Handle) -> Option<&str> {
        match &self.nodes.get(&node)?.content {
            Content::Element { tag, .. } => Some(tag.as_str()),
            Content::Text(_) => None,
        }
    }

    pub fn attribute(&self, node: Handle, name: &str) -> Option<&str> {
        match &self.nodes.get(&node)?.content {
            Content::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            Content::Text(_) => None,
        }
    }

    pub fn contains(&self, node: Handle) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Drop a node from the arena without recording an op, as if something
    /// outside the runtime had replaced it.
    pub fn discard(&mut self, node: Handle) {
        if let Some(removed) = self.nodes.remove(&node) {
            if let Some(parent) = removed.parent.and_then(|p| self.nodes.get_mut(&p)) {
                parent.children.retain(|&c| c != node);
            }
        }
    }

    /// Render the subtree at `node` as markup.
    pub fn serialize(&self, node: Handle) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: Handle, out: &mut String) {
        let Some(entry) = self.nodes.get(&node) else {
            return;
        };
        match &entry.content {
            Content::Text(text) => out.push_str(text),
            Content::Element { tag, attributes } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for &child in &entry.children {
                    self.write_node(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn alloc(&mut self, content: Content) -> Handle {
        self.next_id += 1;
        let handle = Handle::from(self.next_id);
        self.nodes.insert(
            handle,
            MemoryNode {
                content,
                parent: None,
                children: Vec::new(),
            },
        );
        handle
    }

    fn node_mut(&mut self, node: Handle, op: &'static str) -> Result<&mut MemoryNode> {
        self.nodes.get_mut(&node).ok_or_else(|| Error::Target {
            op,
            reason: format!("unknown node {node}"),
        })
    }

    fn element_attributes(
        &mut self,
        node: Handle,
        op: &'static str,
    ) -> Result<&mut IndexMap<String, String>> {
        match &mut self.node_mut(node, op)?.content {
            Content::Element { attributes, .. } => Ok(attributes),
            Content::Text(_) => Err(Error::Target {
                op,
                reason: format!("{node} is a text node"),
            }),
        }
    }

    fn detach(&mut self, child: Handle) {
        let parent = self.nodes.get(&child).and_then(|n| n.parent);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|&c| c != child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
    }

    fn attach(&mut self, parent: Handle, child: Handle, reference: Option<Handle>, op: &'static str) -> Result<()> {
        if parent == child {
            return Err(Error::Target {
                op,
                reason: format!("cannot insert {child} into itself"),
            });
        }
        if !self.nodes.contains_key(&child) {
            return Err(Error::Target {
                op,
                reason: format!("unknown node {child}"),
            });
        }
        if let Content::Text(_) = self.node_mut(parent, op)?.content {
            return Err(Error::Target {
                op,
                reason: format!("{parent} is a text node"),
            });
        }

        self.detach(child);

        let parent_node = self.node_mut(parent, op)?;
        let at = match reference {
            Some(reference) => parent_node
                .children
                .iter()
                .position(|&c| c == reference)
                .ok_or_else(|| Error::Target {
                    op,
                    reason: format!("{reference} is not a child of {parent}"),
                })?,
            None => parent_node.children.len(),
        };
        parent_node.children.insert(at, child);
        self.node_mut(child, op)?.parent = Some(parent);
        Ok(())
    }
}

impl Target for MemoryTree {
    fn create_element(&mut self, tag: &str) -> Handle {
        let node = self.alloc(Content::Element {
            tag: tag.to_owned(),
            attributes: IndexMap::new(),
        });
        self.ops.push(Op::CreateElement { node, tag: tag.to_owned() });
        node
    }

    fn create_text(&mut self, text: &str) -> Handle {
        let node = self.alloc(Content::Text(text.to_owned()));
        self.ops.push(Op::CreateText { node, text: text.to_owned() });
        node
    }

    fn set_attribute(&mut self, node: Handle, name: &str, value: &str) -> Result<()> {
        self.element_attributes(node, "set_attribute")?
            .insert(name.to_owned(), value.to_owned());
        self.ops.push(Op::SetAttribute {
            node,
            name: name.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: Handle, name: &str) -> Result<()> {
        self.element_attributes(node, "remove_attribute")?.shift_remove(name);
        self.ops.push(Op::RemoveAttribute { node, name: name.to_owned() });
        Ok(())
    }

    fn insert_before(&mut self, parent: Handle, child: Handle, reference: Option<Handle>) -> Result<()> {
        self.attach(parent, child, reference, "insert_before")?;
        self.ops.push(Op::InsertBefore { parent, child, reference });
        Ok(())
    }

    fn append_child(&mut self, parent: Handle, child: Handle) -> Result<()> {
        self.attach(parent, child, None, "append_child")?;
        self.ops.push(Op::AppendChild { parent, child });
        Ok(())
    }

    fn remove_child(&mut self, parent: Handle, child: Handle) -> Result<()> {
        let attached = self.nodes.get(&child).and_then(|n| n.parent) == Some(parent);
        if !attached {
            return Err(Error::Target {
                op: "remove_child",
                reason: format!("{child} is not a child of {parent}"),
            });
        }
        self.detach(child);
        self.ops.push(Op::RemoveChild { parent, child });
        Ok(())
    }

    fn set_text_content(&mut self, node: Handle, text: &str) -> Result<()> {
        match &mut self.node_mut(node, "set_text_content")?.content {
            Content::Text(current) => *current = text.to_owned(),
            Content::Element { .. } => {
                return Err(Error::Target {
                    op: "set_text_content",
                    reason: format!("{node} is an element"),
                })
            }
        }
        self.ops.push(Op::SetText { node, text: text.to_owned() });
        Ok(())
    }

    fn parent_node(&self, node: Handle) -> Option<Handle> {
        self.nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: Handle) -> Option<Handle> {
        let parent = self.nodes.get(&self.parent_node(node)?)?;
        let at = parent.children.iter().position(|&c| c == node)?;
        parent.children.get(at + 1).copied()
    }

    fn text_content(&self, node: Handle) -> Result<String> {
        match self.nodes.get(&node).map(|n| &n.content) {
            Some(Content::Text(text)) => Ok(text.clone()),
            Some(Content::Element { .. }) => Err(Error::Target {
                op: "text_content",
                reason: format!("{node} is an element"),
            }),
            None => Err(Error::Target {
                op: "text_content",
                reason: format!("unknown node {node}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_serializes() {
        let mut tree = MemoryTree::new();
        let root = tree.create_element("div");
        let text = tree.create_text("hi");
        tree.set_attribute(root, "id", "app").unwrap();
        tree.append_child(root, text).unwrap();

        assert_eq!(tree.serialize(root), r#"<div id="app">hi</div>"#);
        assert_eq!(tree.parent_node(text), Some(root));
    }

    #[test]
    fn insert_before_moves_attached_nodes() {
        let mut tree = MemoryTree::new();
        let list = tree.create_element("ul");
        let items: Vec<_> = (0..3).map(|_| tree.create_element("li")).collect();
        for &item in &items {
            tree.append_child(list, item).unwrap();
        }

        tree.insert_before(list, items[2], Some(items[0])).unwrap();

        assert_eq!(tree.children(list), vec![items[2], items[0], items[1]]);
        assert_eq!(tree.next_sibling(items[0]), Some(items[1]));
        assert_eq!(tree.next_sibling(items[1]), None);
    }

    #[test]
    fn text_operations_reject_elements() {
        let mut tree = MemoryTree::new();
        let div = tree.create_element("div");

        assert!(tree.set_text_content(div, "x").is_err());
        assert!(tree.text_content(div).is_err());
        assert!(tree.ops().iter().all(|op| !matches!(op, Op::SetText { .. })));
    }

    #[test]
    fn removing_a_stranger_fails() {
        let mut tree = MemoryTree::new();
        let a = tree.create_element("a");
        let b = tree.create_element("b");

        assert!(tree.remove_child(a, b).is_err());
    }

    #[test]
    fn discarded_nodes_disappear_silently() {
        let mut tree = MemoryTree::new();
        let root = tree.create_element("p");
        let text = tree.create_text("x");
        tree.append_child(root, text).unwrap();
        tree.clear_ops();

        tree.discard(text);

        assert!(!tree.contains(text));
        assert!(tree.children(root).is_empty());
        assert!(tree.ops().is_empty());
    }
}
