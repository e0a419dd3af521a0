//! Component Instances
//!
//! An [`Instance`] owns the observed data of one component, its computed
//! values and watchers, and the render watcher that keeps its part of the
//! external tree up to date.
//!
//! # Lifecycle
//!
//! 1. `Instance::new` observes a fresh copy of the descriptor's data and
//!    creates one lazy watcher per computed value.
//! 2. `mount` creates the render watcher. Its first run renders, patches
//!    against the mount point and collects the dependencies of both.
//! 3. Every later change to those dependencies queues the render watcher;
//!    the flush re-renders and patches against the previous tree.
//! 4. `destroy` tears down every watcher, including those of nested
//!    components still present in the tree.
//!
//! Closures created by the instance hold it weakly. Using one after the
//! instance is dropped fails with [`Error::TornDown`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::ComponentDescriptor;
use crate::error::{Error, Result};
use crate::reactive::{Computed, ReactiveObject, Value, Watcher};
use crate::render::{self, Binding, Handle, Key, OldTree, SharedTarget, VNode};
use crate::scheduler;

static INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Where a component's root is placed on first render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPoint {
    /// Replace an existing unmanaged node.
    Replace(Handle),
    /// Append under `parent`.
    Append { parent: Handle },
    /// Insert under `parent`, before `reference`.
    Before { parent: Handle, reference: Handle },
}

impl MountPoint {
    fn into_old_tree(self) -> OldTree {
        match self {
            MountPoint::Replace(raw) => OldTree::Raw(raw),
            MountPoint::Append { parent } => OldTree::Absent {
                parent: Some(parent),
                reference: None,
            },
            MountPoint::Before { parent, reference } => OldTree::Absent {
                parent: Some(parent),
                reference: Some(reference),
            },
        }
    }
}

/// A live component.
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

struct InstanceInner {
    id: u64,
    descriptor: Rc<ComponentDescriptor>,
    data: ReactiveObject,
    computed: IndexMap<String, Computed>,
    watchers: RefCell<Vec<Watcher>>,
    render_watcher: RefCell<Option<Watcher>>,
    /// Tree produced by the last patch. Empty while a patch is running.
    vnode: RefCell<Option<VNode>>,
    /// Consumed by the first render.
    mount_point: Cell<Option<MountPoint>>,
    /// Subtree failures of the last patch, not yet surfaced.
    patch_errors: RefCell<Vec<Error>>,
    destroyed: Cell<bool>,
}

impl Instance {
    /// Create an instance. Nothing is rendered until [`mount`](Self::mount).
    pub fn new(descriptor: impl Into<Rc<ComponentDescriptor>>) -> Result<Self> {
        let descriptor = descriptor.into();
        let data = descriptor.resolve_data()?;
        let id = INSTANCE_ID.fetch_add(1, Ordering::Relaxed);

        let inner = Rc::new_cyclic(|weak: &Weak<InstanceInner>| {
            let computed = descriptor
                .computed
                .iter()
                .map(|(name, derive)| {
                    let (weak, derive) = (weak.clone(), Rc::clone(derive));
                    let computed = Computed::new(move || derive(&Instance::upgrade(&weak, id)?));
                    computed.watcher().set_owner(id);
                    (name.clone(), computed)
                })
                .collect();

            InstanceInner {
                id,
                descriptor,
                data,
                computed,
                watchers: RefCell::new(Vec::new()),
                render_watcher: RefCell::new(None),
                vnode: RefCell::new(None),
                mount_point: Cell::new(None),
                patch_errors: RefCell::new(Vec::new()),
                destroyed: Cell::new(false),
            }
        });

        tracing::debug!(instance = id, component = inner.descriptor.display_name(), "instance created");
        Ok(Self(inner))
    }

    fn upgrade(weak: &Weak<InstanceInner>, id: u64) -> Result<Instance> {
        weak.upgrade().map(Instance).ok_or(Error::TornDown { id })
    }

    fn weak(&self) -> Weak<InstanceInner> {
        Rc::downgrade(&self.0)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.0.destroyed.get() {
            return Err(Error::TornDown { id: self.0.id });
        }
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.0.descriptor
    }

    /// The observed data object.
    pub fn data(&self) -> &ReactiveObject {
        &self.0.data
    }

    /// Read a computed value or a data property, tracking it if a watcher
    /// is collecting dependencies.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.ensure_alive()?;
        if let Some(computed) = self.0.computed.get(key) {
            return computed.get();
        }
        self.0.data.get(key).ok_or_else(|| Error::UnknownProperty { key: key.to_owned() })
    }

    /// Write a data property. Computed values cannot be written.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_alive()?;
        if self.0.data.property(key).is_none() {
            return Err(Error::UnknownProperty { key: key.to_owned() });
        }
        self.0.data.set(key, value)
    }

    /// Invoke a method by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.ensure_alive()?;
        let method = self
            .0
            .descriptor
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownMethod { name: name.to_owned() })?;
        method(self, args)
    }

    /// Call `handler` with `(new, old)` after each flush in which `key` changed.
    pub fn watch(
        &self,
        key: &str,
        handler: impl Fn(&Value, &Value) -> Result<()> + 'static,
    ) -> Result<Watcher> {
        let key = key.to_owned();
        self.watch_with(move |vm| vm.get(&key), handler)
    }

    /// Like [`watch`](Self::watch), for an arbitrary expression.
    pub fn watch_with(
        &self,
        expr: impl Fn(&Instance) -> Result<Value> + 'static,
        handler: impl Fn(&Value, &Value) -> Result<()> + 'static,
    ) -> Result<Watcher> {
        self.ensure_alive()?;
        let (weak, id) = (self.weak(), self.id());
        let watcher = Watcher::user(move || expr(&Instance::upgrade(&weak, id)?), handler)?;
        watcher.set_owner(id);
        self.0.watchers.borrow_mut().push(watcher.clone());
        Ok(watcher)
    }

    /// Run `callback` after the pending flush.
    pub fn next_tick(&self, callback: impl FnOnce(&Instance) + 'static) {
        let weak = self.weak();
        scheduler::next_tick(move || {
            if let Some(inner) = weak.upgrade() {
                callback(&Instance(inner));
            }
        });
    }

    /// Build an element, or a child component placeholder when `tag` names
    /// a registered component. Children of a component placeholder are
    /// ignored.
    pub fn h(&self, tag: &str, children: impl IntoIterator<Item = VNode>) -> VNode {
        match self.0.descriptor.components.get(tag) {
            Some(descriptor) => VNode::component(tag, Rc::clone(descriptor)),
            None => VNode::element(tag).with_children(children),
        }
    }

    /// [`h`](Self::h) with a key.
    pub fn keyed(&self, key: impl Into<Key>, tag: &str, children: impl IntoIterator<Item = VNode>) -> VNode {
        self.h(tag, children).with_key(key)
    }

    pub fn text(&self, text: impl Into<String>) -> VNode {
        VNode::text(text)
    }

    /// A text node showing the current value of `key`.
    pub fn bind_text(&self, key: &str) -> VNode {
        let key = key.to_owned();
        self.bind_text_with(move |vm| vm.get(&key))
    }

    /// A text node showing the current value of `expr`.
    pub fn bind_text_with(&self, expr: impl Fn(&Instance) -> Result<Value> + 'static) -> VNode {
        let (weak, id) = (self.weak(), self.id());
        VNode::bound_text(Binding::new(move || expr(&Instance::upgrade(&weak, id)?)))
    }

    /// Render into `target` at `at` and keep it up to date.
    ///
    /// A failing render function fails the mount. Subtree failures of the
    /// first patch are returned too, but the instance stays mounted and
    /// keeps re-rendering.
    pub fn mount(&self, target: SharedTarget, at: MountPoint) -> Result<()> {
        self.ensure_alive()?;
        if self.0.descriptor.render.is_none() {
            return Err(Error::MissingRender);
        }
        if self.is_mounted() {
            tracing::warn!(instance = self.id(), "instance is already mounted");
            return Ok(());
        }

        self.0.mount_point.set(Some(at));
        let (weak, id) = (self.weak(), self.id());
        let watcher = Watcher::new(move || {
            let vm = Instance::upgrade(&weak, id)?;
            vm.update(&target)?;
            vm.report_patch_errors();
            Ok(Value::Null)
        })?;
        watcher.set_owner(id);
        *self.0.render_watcher.borrow_mut() = Some(watcher);

        tracing::debug!(instance = id, root = ?self.root_handle(), "instance mounted");
        Error::collect(std::mem::take(&mut *self.0.patch_errors.borrow_mut()))
    }

    /// Hand the last patch's subtree failures to the event loop. Before the
    /// render watcher exists they are kept for `mount` to return.
    fn report_patch_errors(&self) {
        let Some(watcher) = self.render_watcher() else {
            return;
        };
        let errors = std::mem::take(&mut *self.0.patch_errors.borrow_mut());
        for error in errors {
            tracing::warn!(instance = self.id(), %error, "subtree patch failed");
            scheduler::report(Error::Evaluation {
                id: watcher.id(),
                source: Box::new(error),
            });
        }
    }

    /// Render and patch. Runs inside the render watcher.
    fn update(&self, target: &SharedTarget) -> Result<()> {
        let render = self.0.descriptor.render.clone().ok_or(Error::MissingRender)?;
        let vnode = render(self)?;

        let previous = self.0.vnode.borrow_mut().take();
        let old = match previous {
            Some(previous) => OldTree::Virtual(previous),
            None => match self.0.mount_point.take() {
                Some(at) => at.into_old_tree(),
                None => OldTree::Absent {
                    parent: None,
                    reference: None,
                },
            },
        };

        let patched = render::patch(target, old, vnode);
        *self.0.vnode.borrow_mut() = Some(patched.vnode);
        self.0.patch_errors.borrow_mut().extend(patched.errors);
        Ok(())
    }

    /// Tear down every watcher and every nested component. The external
    /// nodes are left to whoever removes the root.
    pub fn destroy(&self) {
        if self.0.destroyed.replace(true) {
            return;
        }

        let render_watcher = self.0.render_watcher.borrow_mut().take();
        if let Some(watcher) = render_watcher {
            watcher.teardown();
        }
        let watchers = std::mem::take(&mut *self.0.watchers.borrow_mut());
        for watcher in watchers {
            watcher.teardown();
        }
        for computed in self.0.computed.values() {
            computed.watcher().teardown();
        }

        let vnode = self.0.vnode.borrow_mut().take();
        if let Some(vnode) = vnode {
            vnode.for_each_instance(&mut |child| child.destroy());
        }
        tracing::debug!(instance = self.id(), "instance destroyed");
    }

    /// External node at the root of this instance's tree.
    pub fn root_handle(&self) -> Option<Handle> {
        self.0.vnode.borrow().as_ref().and_then(VNode::handle)
    }

    /// Inspect the tree produced by the last patch.
    pub fn with_vnode<R>(&self, f: impl FnOnce(Option<&VNode>) -> R) -> R {
        f(self.0.vnode.borrow().as_ref())
    }

    /// The render watcher, once mounted.
    pub fn render_watcher(&self) -> Option<Watcher> {
        self.0.render_watcher.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.render_watcher.borrow().is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id())
            .field("component", &self.0.descriptor.display_name())
            .field("mounted", &self.is_mounted())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{shared, MemoryTree, Target};
    use crate::scheduler::EventLoop;
    use serde_json::json;
    use std::cell::RefCell;

    fn counter() -> ComponentDescriptor {
        ComponentDescriptor::new()
            .name("counter")
            .data(json!({ "count": 0 }))
            .computed("double", |vm| {
                Ok(Value::from(vm.get("count")?.as_f64().unwrap_or_default() * 2.0))
            })
            .method("increment", |vm, args| {
                let by = args.first().and_then(Value::as_f64).unwrap_or(1.0);
                let next = vm.get("count")?.as_f64().unwrap_or_default() + by;
                vm.set("count", next)?;
                Ok(Value::from(next))
            })
            .render(|vm| Ok(vm.h("p", [vm.bind_text("count")])))
    }

    fn tree_with_root() -> (Rc<RefCell<MemoryTree>>, Handle) {
        let tree = Rc::new(RefCell::new(MemoryTree::new()));
        let root = tree.borrow_mut().create_element("body");
        (tree, root)
    }

    #[test]
    fn reads_data_and_computed() {
        let vm = Instance::new(counter()).unwrap();
        assert_eq!(vm.get("count").unwrap(), Value::from(0));

        vm.set("count", 4).unwrap();
        assert_eq!(vm.get("double").unwrap(), Value::from(8));
    }

    #[test]
    fn unknown_names_are_errors() {
        let vm = Instance::new(counter()).unwrap();

        assert!(matches!(vm.get("missing"), Err(Error::UnknownProperty { .. })));
        assert!(matches!(vm.set("double", 1), Err(Error::UnknownProperty { .. })));
        assert!(matches!(vm.call("missing", &[]), Err(Error::UnknownMethod { .. })));
    }

    #[test]
    fn methods_receive_the_instance() {
        let vm = Instance::new(counter()).unwrap();
        assert_eq!(vm.call("increment", &[Value::from(5)]).unwrap(), Value::from(5));
        assert_eq!(vm.get("count").unwrap(), Value::from(5));
    }

    #[test]
    fn mount_without_render_fails() {
        let (tree, root) = tree_with_root();
        let vm = Instance::new(ComponentDescriptor::new()).unwrap();
        let err = vm.mount(tree, MountPoint::Append { parent: root }).unwrap_err();
        assert!(matches!(err, Error::MissingRender));
    }

    #[test]
    fn mount_replaces_raw_node() {
        let (tree, root) = tree_with_root();
        let placeholder = tree.borrow_mut().create_element("div");
        tree.borrow_mut().append_child(root, placeholder).unwrap();

        let vm = Instance::new(counter()).unwrap();
        vm.mount(tree.clone(), MountPoint::Replace(placeholder)).unwrap();

        assert_eq!(tree.borrow().serialize(root), "<body><p>0</p></body>");
        assert_eq!(tree.borrow().children(root), vec![vm.root_handle().unwrap()]);
    }

    #[test]
    fn watch_reports_new_and_old() {
        let vm = Instance::new(counter()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        vm.watch("count", move |new, old| {
            sink.borrow_mut().push((new.to_string(), old.to_string()));
            Ok(())
        })
        .unwrap();

        vm.set("count", 1).unwrap();
        vm.set("count", 2).unwrap();
        EventLoop::run_until_idle().unwrap();

        assert_eq!(*seen.borrow(), vec![("2".to_owned(), "0".to_owned())]);
    }

    #[test]
    fn next_tick_sees_the_patched_tree() {
        let (tree, root) = tree_with_root();
        let vm = Instance::new(counter()).unwrap();
        vm.mount(tree.clone(), MountPoint::Append { parent: root }).unwrap();

        vm.set("count", 3).unwrap();
        let seen = Rc::new(RefCell::new(String::new()));
        let (sink, reader) = (seen.clone(), tree.clone());
        vm.next_tick(move |_| *sink.borrow_mut() = reader.borrow().serialize(root));
        EventLoop::run_until_idle().unwrap();

        assert_eq!(*seen.borrow(), "<body><p>3</p></body>");
    }

    #[test]
    fn destroyed_instance_stops_rendering() {
        let (tree, root) = tree_with_root();
        let vm = Instance::new(counter()).unwrap();
        vm.mount(tree.clone(), MountPoint::Append { parent: root }).unwrap();
        let render = vm.render_watcher().unwrap();

        vm.destroy();
        assert!(!render.is_active());
        assert!(matches!(vm.get("count"), Err(Error::TornDown { .. })));

        vm.data().set("count", 9).unwrap();
        EventLoop::run_until_idle().unwrap();
        assert_eq!(tree.borrow().serialize(root), "<body><p>0</p></body>");
    }

    #[test]
    fn nested_components_mount_and_are_destroyed_with_their_node() {
        let (tree, root) = tree_with_root();
        let parent = ComponentDescriptor::new()
            .data(json!({ "show": true }))
            .component("counter", counter())
            .render(|vm| {
                let show = vm.get("show")?.as_bool().unwrap_or(false);
                let children = show.then(|| vm.h("counter", []));
                Ok(vm.h("div", children))
            });

        let vm = Instance::new(parent).unwrap();
        vm.mount(tree.clone(), MountPoint::Append { parent: root }).unwrap();
        assert_eq!(tree.borrow().serialize(root), "<body><div><p>0</p></div></body>");

        let child = vm
            .with_vnode(|v| v.and_then(|v| v.children().first()?.instance().cloned()))
            .unwrap();
        assert!(child.is_mounted());

        vm.set("show", false).unwrap();
        EventLoop::run_until_idle().unwrap();

        assert_eq!(tree.borrow().serialize(root), "<body><div></div></body>");
        assert!(child.is_destroyed());
    }

    #[test]
    fn failing_child_does_not_disable_parent() {
        let (tree, root) = tree_with_root();
        let parent = ComponentDescriptor::new()
            .data(json!({ "count": 0 }))
            .component("broken", ComponentDescriptor::new())
            .render(|vm| Ok(vm.h("div", [vm.h("p", [vm.bind_text("count")]), vm.h("broken", [])])));

        let vm = Instance::new(parent).unwrap();
        let err = vm.mount(tree.clone(), MountPoint::Append { parent: root }).unwrap_err();
        assert!(matches!(err, Error::MissingRender));
        assert!(vm.is_mounted());

        vm.set("count", 1).unwrap();
        EventLoop::run_until_idle().unwrap();

        assert_eq!(tree.borrow().serialize(root), "<body><div><p>1</p></div></body>");
    }

    #[test]
    fn failing_binding_is_reported_and_siblings_patch() {
        let (tree, root) = tree_with_root();
        let descriptor = ComponentDescriptor::new()
            .data(json!({ "n": 0 }))
            .render(|vm| {
                let guarded = vm.bind_text_with(|vm| {
                    let n = vm.get("n")?;
                    match n.as_f64() {
                        Some(n) if n > 0.0 => Err(Error::callback("too big")),
                        _ => Ok(n),
                    }
                });
                Ok(vm.h("div", [vm.h("p", [guarded]), vm.h("p", [vm.bind_text("n")])]))
            });
        let vm = Instance::new(descriptor).unwrap();
        vm.mount(tree.clone(), MountPoint::Append { parent: root }).unwrap();
        let render = vm.render_watcher().unwrap();

        vm.set("n", 1).unwrap();
        let err = EventLoop::run_until_idle().unwrap_err();
        assert!(matches!(err, Error::Evaluation { id, .. } if id == render.id()));
        assert_eq!(tree.borrow().serialize(root), "<body><div><p>0</p><p>1</p></div></body>");

        vm.set("n", -1).unwrap();
        EventLoop::run_until_idle().unwrap();
        assert_eq!(tree.borrow().serialize(root), "<body><div><p>-1</p><p>-1</p></div></body>");
    }

    #[test]
    fn shared_wraps_any_target() {
        let target = shared(MemoryTree::new());
        let node = target.borrow_mut().create_text("x");
        assert_eq!(target.borrow().text_content(node).unwrap(), "x");
    }
}
