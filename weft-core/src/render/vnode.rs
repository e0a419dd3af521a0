//! Virtual Nodes
//!
//! A [`VNode`] describes one node of the desired tree. Render functions build
//! a fresh tree on every run; the reconciler compares it with the previous
//! one and copies each matched node's external [`Handle`] forward.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::target::Handle;
use crate::component::{ComponentDescriptor, Instance};
use crate::error::Result;
use crate::reactive::Value;

/// Identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Num(f64),
    Str(String),
}

impl Key {
    /// Loose equality: a numeric key matches a string key holding the same
    /// number, so `1` and `"1"` identify the same item.
    pub fn loose_eq(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::Num(a), Key::Num(b)) => a == b,
            (Key::Str(a), Key::Str(b)) => a == b,
            (Key::Num(n), Key::Str(s)) | (Key::Str(s), Key::Num(n)) => {
                s.trim().parse::<f64>().map_or(false, |parsed| parsed == *n)
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Num(n) => write!(f, "{}", Value::Number(*n)),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_owned())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Num(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Num(n.into())
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Num(n as f64)
    }
}

impl From<usize> for Key {
    fn from(n: usize) -> Self {
        Key::Num(n as f64)
    }
}

/// An embedded expression, re-evaluated whenever its text node is patched.
#[derive(Clone)]
pub struct Binding(Rc<dyn Fn() -> Result<Value>>);

impl Binding {
    pub fn new<F>(expr: F) -> Self
    where
        F: Fn() -> Result<Value> + 'static,
    {
        Self(Rc::new(expr))
    }

    /// Evaluate and format for display.
    pub fn render(&self) -> Result<String> {
        Ok((self.0)()?.to_string())
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Binding(..)")
    }
}

/// Payload of a text node.
#[derive(Debug, Clone)]
pub enum Text {
    Static(String),
    Bound(Binding),
}

impl Text {
    /// The text this payload currently renders to.
    pub fn render(&self) -> Result<String> {
        match self {
            Text::Static(text) => Ok(text.clone()),
            Text::Bound(binding) => binding.render(),
        }
    }
}

/// Child component carried by a vnode.
pub(crate) enum ComponentSlot {
    /// Not instantiated yet.
    Pending(Rc<ComponentDescriptor>),
    Mounted(Instance),
}

impl fmt::Debug for ComponentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentSlot::Pending(_) => f.write_str("Pending"),
            ComponentSlot::Mounted(instance) => write!(f, "Mounted({})", instance.id()),
        }
    }
}

/// A node of the virtual tree.
#[derive(Debug, Default)]
pub struct VNode {
    pub(crate) tag: Option<String>,
    pub(crate) props: IndexMap<String, String>,
    pub(crate) children: Vec<VNode>,
    pub(crate) text: Option<Text>,
    pub(crate) key: Option<Key>,
    /// Set once, when the node is first materialized.
    pub(crate) handle: Option<Handle>,
    pub(crate) parent: Option<Handle>,
    pub(crate) component: Option<ComponentSlot>,
}

impl VNode {
    /// An element with no props or children.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// A text node with fixed content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(Text::Static(text.into())),
            ..Self::default()
        }
    }

    /// A text node whose content is the current value of `binding`.
    pub fn bound_text(binding: Binding) -> Self {
        Self {
            text: Some(Text::Bound(binding)),
            ..Self::default()
        }
    }

    /// A placeholder for a child component, instantiated on first patch.
    pub fn component(tag: impl Into<String>, descriptor: Rc<ComponentDescriptor>) -> Self {
        Self {
            tag: Some(tag.into()),
            component: Some(ComponentSlot::Pending(descriptor)),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn props(&self) -> &IndexMap<String, String> {
        &self.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn text_payload(&self) -> Option<&Text> {
        self.text.as_ref()
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// External node this vnode is materialized as.
    ///
    /// For a component vnode this is the child's current root, which may
    /// change when the child replaces its root element.
    pub fn handle(&self) -> Option<Handle> {
        match &self.component {
            Some(ComponentSlot::Mounted(instance)) => instance.root_handle().or(self.handle),
            _ => self.handle,
        }
    }

    /// Parent the node was inserted under.
    pub fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub fn is_text(&self) -> bool {
        self.text.is_some()
    }

    /// The mounted child component, if this vnode hosts one.
    pub fn instance(&self) -> Option<&Instance> {
        match &self.component {
            Some(ComponentSlot::Mounted(instance)) => Some(instance),
            _ => None,
        }
    }

    /// Visit every mounted child component in this subtree.
    pub(crate) fn for_each_instance(&self, f: &mut dyn FnMut(&Instance)) {
        if let Some(instance) = self.instance() {
            f(instance);
        }
        for child in &self.children {
            child.for_each_instance(f);
        }
    }
}

/// Whether `a` and `b` describe the same logical node: equal key (loosely)
/// and equal tag.
pub fn same_vnode(a: &VNode, b: &VNode) -> bool {
    let same_key = match (&a.key, &b.key) {
        (None, None) => true,
        (Some(x), Some(y)) => x.loose_eq(y),
        _ => false,
    };
    same_key && a.tag == b.tag && a.is_text() == b.is_text()
}
