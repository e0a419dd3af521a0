//! Deep Observer
//!
//! [`observe`] walks plain JSON data once and produces observed containers:
//! every object becomes a [`ReactiveObject`] with one [`ReactiveProperty`]
//! per key, every array becomes a [`ReactiveArray`] whose mutating methods
//! notify. Each container carries an [`Observer`], the marker that says it is
//! already reactive, plus a dep for whole-container invalidation.
//!
//! A container that already carries an observer is never wrapped again. That
//! is what makes storing the same container in two places, or in itself,
//! safe.
//!
//! [`ReactiveProperty`]: super::ReactiveProperty

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::{Dep, ReactiveArray, ReactiveObject, Value};
use crate::error::{Error, Result};

/// Marker attached to every observed container.
#[derive(Clone)]
pub struct Observer(Rc<ObserverInner>);

struct ObserverInner {
    /// Notified on structural change: array mutation, key addition or removal.
    dep: Dep,
    frozen: Cell<bool>,
}

impl Observer {
    pub(crate) fn new() -> Self {
        Self(Rc::new(ObserverInner {
            dep: Dep::new(),
            frozen: Cell::new(false),
        }))
    }

    /// The dep for whole-container invalidation.
    pub fn dep(&self) -> &Dep {
        &self.0.dep
    }

    /// Check if the container rejects writes.
    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub(crate) fn freeze(&self) {
        self.0.frozen.set(true);
    }

    /// Fail loudly if the container is frozen.
    pub(crate) fn ensure_writable(&self, key: &str) -> Result<()> {
        if self.is_frozen() {
            return Err(Error::Frozen {
                key: key.to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("dep", self.dep())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// Convert plain data into observed data.
///
/// Scalars pass through unchanged. Objects and arrays are walked recursively.
pub fn observe(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(ReactiveArray::from_values(items.into_iter().map(observe).collect()))
        }
        serde_json::Value::Object(map) => Value::Object(ReactiveObject::from_entries(
            map.into_iter().map(|(key, value)| (key, observe(value))),
        )),
    }
}

/// The observer of an already observed value.
///
/// Returns `None` for scalars; a container is returned as-is, never rewrapped.
pub fn observer_of(value: &Value) -> Option<Observer> {
    value.observer().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_are_not_observed() {
        assert!(observe(json!(1)).observer().is_none());
        assert!(observe(json!("s")).observer().is_none());
        assert!(observe(json!(null)).observer().is_none());
    }

    #[test]
    fn nested_containers_are_observed() {
        let value = observe(json!({ "list": [{ "x": 1 }], "inner": { "y": 2 } }));
        let object = value.as_object().unwrap();

        let list = object.get("list").unwrap();
        assert!(list.observer().is_some());
        let first = list.as_array().unwrap().get(0).unwrap();
        assert!(first.observer().is_some());
        assert!(object.get("inner").unwrap().observer().is_some());
    }

    #[test]
    fn observing_twice_keeps_the_same_observer() {
        let value = observe(json!({ "a": 1 }));
        let first = observer_of(&value).unwrap();
        let second = observer_of(&value.clone()).unwrap();
        assert_eq!(first.dep().id(), second.dep().id());
    }

    #[test]
    fn frozen_observer_rejects_writes() {
        let observer = Observer::new();
        assert!(observer.ensure_writable("a").is_ok());

        observer.freeze();
        let err = observer.ensure_writable("a").unwrap_err();
        assert!(matches!(err, Error::Frozen { key } if key == "a"));
    }
}
