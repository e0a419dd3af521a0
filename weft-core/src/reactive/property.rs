//! Reactive Property Binder
//!
//! A [`ReactiveProperty`] is one named slot of an observed object. It owns
//! the slot's value and its [`Dep`].
//!
//! # Reads
//!
//! Inside a tracking context, reading registers the active subscriber with
//! this property's dep. If the value is itself a container, the subscriber is
//! also registered with the container's own dep, so structural changes to a
//! nested array invalidate whoever read the property holding it.
//!
//! # Writes
//!
//! Writing the same value (per [`Value::same`], which treats `NaN` as equal
//! to itself) is a no-op. Otherwise the value is stored and the dep notified.

use std::cell::RefCell;
use std::fmt;

use super::context::ReactiveContext;
use super::{Dep, Value};

/// A single reactive slot.
pub struct ReactiveProperty {
    value: RefCell<Value>,
    dep: Dep,
}

impl ReactiveProperty {
    /// Wrap an already observed value.
    pub fn new(value: Value) -> Self {
        Self {
            value: RefCell::new(value),
            dep: Dep::new(),
        }
    }

    /// Read the value, registering the active subscriber.
    pub fn get(&self) -> Value {
        let value = self.value.borrow().clone();
        if ReactiveContext::is_active() {
            self.dep.depend();
            if let Some(observer) = value.observer() {
                observer.dep().depend();
            }
        }
        value
    }

    /// Read the value without tracking.
    pub fn get_untracked(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Store `value` and notify subscribers. Returns whether anything changed.
    pub fn set(&self, value: Value) -> bool {
        if self.value.borrow().same(&value) {
            return false;
        }
        *self.value.borrow_mut() = value;
        self.dep.notify();
        true
    }

    /// The dep notified when this slot changes.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }
}

impl fmt::Debug for ReactiveProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveProperty")
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.dep.subscriber_count())
            .finish()
    }
}
