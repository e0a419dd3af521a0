//! Observed objects.
//!
//! A [`ReactiveObject`] is a map from key to [`ReactiveProperty`]. Member
//! access goes through the map instead of runtime property interception:
//! `get` reads the slot (tracked), `set` writes it (notifying).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::observer::Observer;
use super::{ReactiveProperty, Value};
use crate::error::Result;

/// An observed object.
#[derive(Clone)]
pub struct ReactiveObject(Rc<ObjectInner>);

struct ObjectInner {
    observer: Observer,
    properties: RefCell<IndexMap<String, Rc<ReactiveProperty>>>,
}

impl ReactiveObject {
    /// Create an empty observed object.
    pub fn new() -> Self {
        Self::from_entries(std::iter::empty())
    }

    /// Build from already observed values, one reactive property per key.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        let properties = entries
            .into_iter()
            .map(|(key, value)| (key, Rc::new(ReactiveProperty::new(value))))
            .collect();
        Self(Rc::new(ObjectInner {
            observer: Observer::new(),
            properties: RefCell::new(properties),
        }))
    }

    /// Read `key`.
    ///
    /// Reading a missing key registers with the object's own dep so that a
    /// later `set` adding the key invalidates the reader.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.property(key) {
            Some(property) => Some(property.get()),
            None => {
                self.0.observer.dep().depend();
                None
            }
        }
    }

    /// Write `key`.
    ///
    /// An existing key notifies its own subscribers (and only if the value
    /// changed). A new key becomes a reactive property and notifies the
    /// object's dep.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.0.observer.ensure_writable(key)?;
        let value = value.into();

        if let Some(property) = self.property(key) {
            property.set(value);
            return Ok(());
        }

        self.0
            .properties
            .borrow_mut()
            .insert(key.to_owned(), Rc::new(ReactiveProperty::new(value)));
        tracing::trace!(key, "reactive property added");
        self.0.observer.dep().notify();
        Ok(())
    }

    /// Remove `key`, notifying the object's dep.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.0.observer.ensure_writable(key)?;
        let removed = self.0.properties.borrow_mut().shift_remove(key);
        match removed {
            Some(property) => {
                self.0.observer.dep().notify();
                Ok(Some(property.get_untracked()))
            }
            None => Ok(None),
        }
    }

    /// Check if `key` exists. Not tracked.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.properties.borrow().contains_key(key)
    }

    /// Keys in insertion order. Tracked on the object's dep.
    pub fn keys(&self) -> Vec<String> {
        self.0.observer.dep().depend();
        self.0.properties.borrow().keys().cloned().collect()
    }

    /// Number of keys. Tracked on the object's dep.
    pub fn len(&self) -> usize {
        self.0.observer.dep().depend();
        self.0.properties.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All key/value pairs, read through the tracked path.
    pub fn entries(&self) -> Vec<(String, Value)> {
        let properties: Vec<(String, Rc<ReactiveProperty>)> = self
            .0
            .properties
            .borrow()
            .iter()
            .map(|(key, property)| (key.clone(), Rc::clone(property)))
            .collect();
        if ReactiveContext::is_active() {
            self.0.observer.dep().depend();
        }
        properties
            .into_iter()
            .map(|(key, property)| (key, property.get()))
            .collect()
    }

    /// The slot behind `key`.
    pub fn property(&self, key: &str) -> Option<Rc<ReactiveProperty>> {
        self.0.properties.borrow().get(key).cloned()
    }

    /// Reject all further writes.
    pub fn freeze(&self) {
        self.0.observer.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.0.observer.is_frozen()
    }

    pub fn observer(&self) -> &Observer {
        &self.0.observer
    }

    /// Identity of the object, for cycle detection.
    pub(crate) fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    /// Check if both handles point at the same object.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReactiveObject({:?})", Value::Object(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::{observe, Watcher};
    use serde_json::json;

    fn object(json: serde_json::Value) -> ReactiveObject {
        observe(json).as_object().cloned().unwrap()
    }

    fn reader(object: &ReactiveObject, key: &'static str) -> Watcher {
        let source = object.clone();
        let watcher = Watcher::lazy(move || Ok(source.get(key).unwrap_or_default()));
        watcher.evaluate().unwrap();
        watcher
    }

    #[test]
    fn every_key_is_reactive() {
        let data = object(json!({ "a": 1, "b": 2 }));
        let a = reader(&data, "a");
        let b = reader(&data, "b");

        data.set("a", 10).unwrap();

        assert!(a.is_stale());
        assert!(!b.is_stale());
    }

    #[test]
    fn adding_a_key_notifies_missing_readers() {
        let data = object(json!({}));
        let watcher = reader(&data, "later");

        data.set("later", "here").unwrap();

        assert!(watcher.is_stale());
        assert_eq!(watcher.evaluate().unwrap(), Value::from("here"));
    }

    #[test]
    fn assigned_objects_are_observed() {
        let data = object(json!({ "inner": null }));
        data.set("inner", json!({ "x": 1 })).unwrap();

        let inner = data.get("inner").unwrap();
        assert!(inner.observer().is_some());
    }

    #[test]
    fn nested_structural_change_invalidates_parent_reader() {
        let data = object(json!({ "list": [1] }));
        let watcher = reader(&data, "list");

        let list = data.get("list").unwrap();
        list.as_array().unwrap().push([2]).unwrap();

        assert!(watcher.is_stale());
    }

    #[test]
    fn frozen_object_fails_loudly() {
        let data = object(json!({ "a": 1 }));
        data.freeze();

        let err = data.set("a", 2).unwrap_err();
        assert!(matches!(err, Error::Frozen { .. }));
        assert_eq!(data.get("a"), Some(Value::from(1)));
    }

    #[test]
    fn remove_notifies_object_dep() {
        let data = object(json!({ "a": 1 }));
        let source = data.clone();
        let watcher = Watcher::lazy(move || Ok(Value::from(source.len())));
        watcher.evaluate().unwrap();

        assert_eq!(data.remove("a").unwrap(), Some(Value::from(1)));
        assert!(watcher.is_stale());
        assert_eq!(data.remove("a").unwrap(), None);
    }

    #[test]
    fn self_reference_does_not_recurse() {
        let data = object(json!({}));
        data.set("me", data.clone()).unwrap();

        let me = data.get("me").unwrap();
        assert!(me.as_object().unwrap().ptr_eq(&data));
    }
}
