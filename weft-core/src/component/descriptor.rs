//! Component Descriptors
//!
//! A [`ComponentDescriptor`] is the static definition of a component: its
//! initial data, computed values, methods, nested components and render
//! function. It is built once and shared by every [`Instance`] created from
//! it.
//!
//! ```rust,ignore
//! let counter = ComponentDescriptor::new()
//!     .data(json!({ "count": 0 }))
//!     .computed("double", |vm| Ok(Value::from(vm.get("count")?.as_f64().unwrap_or(0.0) * 2.0)))
//!     .render(|vm| Ok(vm.h("p", [vm.bind_text("count")])));
//! ```

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Instance;
use crate::error::{Error, Result};
use crate::reactive::{observe, ReactiveObject, Value};
use crate::render::VNode;

/// Produces the component's virtual tree.
pub type RenderFn = Rc<dyn Fn(&Instance) -> Result<VNode>>;

/// Derives a computed value from the instance.
pub type ComputedFn = Rc<dyn Fn(&Instance) -> Result<Value>>;

/// A method callable through [`Instance::call`].
pub type MethodFn = Rc<dyn Fn(&Instance, &[Value]) -> Result<Value>>;

/// Initial data of each instance.
#[derive(Clone)]
pub enum Data {
    /// Copied into every instance.
    Object(serde_json::Value),
    /// Called once per instance.
    Factory(Rc<dyn Fn() -> serde_json::Value>),
}

/// Static definition of a component.
#[derive(Clone, Default)]
pub struct ComponentDescriptor {
    pub(crate) name: Option<String>,
    pub(crate) data: Option<Data>,
    pub(crate) computed: IndexMap<String, ComputedFn>,
    pub(crate) methods: IndexMap<String, MethodFn>,
    pub(crate) components: IndexMap<String, Rc<ComponentDescriptor>>,
    pub(crate) render: Option<RenderFn>,
}

impl ComponentDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Initial data, copied into each instance.
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(Data::Object(data));
        self
    }

    /// Initial data produced by a factory, called once per instance.
    pub fn data_fn(mut self, factory: impl Fn() -> serde_json::Value + 'static) -> Self {
        self.data = Some(Data::Factory(Rc::new(factory)));
        self
    }

    pub fn computed(
        mut self,
        name: impl Into<String>,
        derive: impl Fn(&Instance) -> Result<Value> + 'static,
    ) -> Self {
        self.computed.insert(name.into(), Rc::new(derive));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&Instance, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    /// Register a nested component under `tag`.
    pub fn component(mut self, tag: impl Into<String>, descriptor: ComponentDescriptor) -> Self {
        self.components.insert(tag.into(), Rc::new(descriptor));
        self
    }

    pub fn render(mut self, render: impl Fn(&Instance) -> Result<VNode> + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    /// Display name for logs.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }

    /// Observe a fresh copy of the initial data.
    pub(crate) fn resolve_data(&self) -> Result<ReactiveObject> {
        let json = match &self.data {
            None => serde_json::Value::Object(serde_json::Map::new()),
            Some(Data::Object(json)) => json.clone(),
            Some(Data::Factory(factory)) => factory(),
        };
        match observe(json) {
            Value::Object(object) => Ok(object),
            other => Err(Error::InvalidData {
                found: other.type_name(),
            }),
        }
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.display_name())
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("has_render", &self.render.is_some())
            .finish()
    }
}
