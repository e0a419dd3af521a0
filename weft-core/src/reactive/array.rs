//! Observed arrays.
//!
//! [`ReactiveArray`] owns a `Vec<Value>` and exposes the seven mutating
//! operations (`push`, `pop`, `shift`, `unshift`, `splice`, `sort`,
//! `reverse`). Each one performs the mutation, makes sure the inserted
//! elements are observed, then notifies the array's dep exactly once.
//!
//! [`ReactiveArray::assign`] writes by index without notifying. Index
//! assignment is deliberately not intercepted; use `splice` to replace an
//! element reactively.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::observer::Observer;
use super::Value;
use crate::error::{Error, Result};

/// An observed array.
#[derive(Clone)]
pub struct ReactiveArray(Rc<ArrayInner>);

struct ArrayInner {
    observer: Observer,
    items: RefCell<Vec<Value>>,
}

impl ReactiveArray {
    /// Create an empty observed array.
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    /// Wrap already observed values.
    pub fn from_values(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayInner {
            observer: Observer::new(),
            items: RefCell::new(items),
        }))
    }

    /// Read the element at `index`. Tracked on the array's dep.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.observer.dep().depend();
        self.0.items.borrow().get(index).cloned()
    }

    /// Number of elements. Tracked on the array's dep.
    pub fn len(&self) -> usize {
        self.0.observer.dep().depend();
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the elements. Tracked on the array's dep.
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.observer.dep().depend();
        self.0.items.borrow().clone()
    }

    /// Append elements; returns the new length.
    pub fn push<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let inserted = Self::observed(items);
        self.mutate("push", |vec| {
            vec.extend(inserted);
            vec.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.mutate("pop", Vec::pop)
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.mutate("shift", |vec| {
            if vec.is_empty() {
                None
            } else {
                Some(vec.remove(0))
            }
        })
    }

    /// Prepend elements, keeping their order; returns the new length.
    pub fn unshift<I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let inserted = Self::observed(items);
        self.mutate("unshift", |vec| {
            vec.splice(0..0, inserted);
            vec.len()
        })
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Out-of-range arguments are clamped. Returns the
    /// removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let inserted = Self::observed(items);
        self.mutate("splice", |vec| {
            let start = start.min(vec.len());
            let end = start.saturating_add(delete_count).min(vec.len());
            vec.splice(start..end, inserted).collect()
        })
    }

    /// Sort in place by rendered text; numbers are not compared numerically
    /// (`[10, 9, 1]` becomes `[1, 10, 9]`). Use [`sort_by`](Self::sort_by)
    /// for any other order.
    pub fn sort(&self) -> Result<()> {
        self.sort_by(Value::default_order)
    }

    /// Sort in place with a comparator. The sort is stable.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.mutate("sort", |vec| vec.sort_by(|a, b| compare(a, b)))
    }

    /// Reverse in place.
    pub fn reverse(&self) -> Result<()> {
        self.mutate("reverse", |vec| vec.reverse())
    }

    /// Write `value` at `index` without notifying anyone.
    ///
    /// Growing past the end pads with `Null`. An index the array cannot grow
    /// to is an error.
    pub fn assign(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.0.observer.ensure_writable("[index]")?;
        let value = value.into();
        let mut items = self.0.items.borrow_mut();
        if index >= items.len() {
            let out_of_range = || Error::IndexOutOfRange { index };
            let len = index.checked_add(1).ok_or_else(out_of_range)?;
            let additional = len - items.len();
            items
                .try_reserve(additional)
                .map_err(|_| out_of_range())?;
            items.resize(len, Value::Null);
        }
        items[index] = value;
        Ok(())
    }

    /// Reject all further mutation.
    pub fn freeze(&self) {
        self.0.observer.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.0.observer.is_frozen()
    }

    pub fn observer(&self) -> &Observer {
        &self.0.observer
    }

    /// Identity of the array, for cycle detection.
    pub(crate) fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    /// Check if both handles point at the same array.
    pub fn ptr_eq(&self, other: &ReactiveArray) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Converting into `Value` observes any plain object or array among the
    /// inserted items; containers that are already observed pass through.
    fn observed<I>(items: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        items.into_iter().map(Into::into).collect()
    }

    fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        self.0.observer.ensure_writable(op)?;
        let result = f(&mut self.0.items.borrow_mut());
        tracing::trace!(op, "array mutated");
        self.0.observer.dep().notify();
        Ok(result)
    }
}

impl Default for ReactiveArray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReactiveArray({:?})", Value::Array(self.clone()))
    }
}

impl<T: Into<Value>> FromIterator<T> for ReactiveArray {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::{observe, Watcher};
    use serde_json::json;

    fn array(json: serde_json::Value) -> ReactiveArray {
        observe(json).as_array().cloned().unwrap()
    }

    fn reader(list: &ReactiveArray) -> Watcher {
        let source = list.clone();
        let watcher = Watcher::lazy(move || Ok(Value::from(source.len())));
        watcher.evaluate().unwrap();
        watcher
    }

    fn numbers(list: &ReactiveArray) -> Vec<f64> {
        list.snapshot().iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn push_notifies_once_and_observes_objects() {
        let list = array(json!([]));
        let dep = list.observer().dep().clone();
        let watcher = reader(&list);
        assert!(dep.has_subscriber(watcher.id()));

        let len = list.push([json!({ "x": 1 })]).unwrap();

        assert_eq!(len, 1);
        assert_eq!(dep.notify_count(), 1);
        assert!(watcher.is_stale());
        assert!(list.get(0).unwrap().observer().is_some());
    }

    #[test]
    fn each_mutator_matches_vec_semantics() {
        let list = array(json!([3, 1, 2]));

        assert_eq!(list.pop().unwrap(), Some(Value::from(2)));
        assert_eq!(list.shift().unwrap(), Some(Value::from(3)));
        assert_eq!(list.unshift([7, 8]).unwrap(), 3);
        assert_eq!(numbers(&list), vec![7.0, 8.0, 1.0]);

        let removed = list.splice(1, 1, [5, 6]).unwrap();
        assert_eq!(removed, vec![Value::from(8)]);
        assert_eq!(numbers(&list), vec![7.0, 5.0, 6.0, 1.0]);

        list.sort().unwrap();
        assert_eq!(numbers(&list), vec![1.0, 5.0, 6.0, 7.0]);

        list.reverse().unwrap();
        assert_eq!(numbers(&list), vec![7.0, 6.0, 5.0, 1.0]);
    }

    #[test]
    fn sort_compares_text_unless_told_otherwise() {
        let list = array(json!([10, 9, 1]));

        list.sort().unwrap();
        assert_eq!(numbers(&list), vec![1.0, 10.0, 9.0]);

        list.sort_by(|a, b| a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal))
            .unwrap();
        assert_eq!(numbers(&list), vec![1.0, 9.0, 10.0]);
    }

    #[test]
    fn splice_clamps_out_of_range() {
        let list = array(json!([1, 2]));
        let removed = list.splice(10, 5, [3]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(numbers(&list), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_shift_and_pop_still_notify() {
        let list = array(json!([]));
        let watcher = reader(&list);

        assert_eq!(list.shift().unwrap(), None);
        assert!(watcher.is_stale());
    }

    #[test]
    fn assign_does_not_notify() {
        let list = array(json!([1]));
        let watcher = reader(&list);

        list.assign(3, 9).unwrap();

        assert!(!watcher.is_stale());
        assert_eq!(list.snapshot().len(), 4);
        assert_eq!(list.get(1), Some(Value::Null));
    }

    #[test]
    fn assign_past_addressable_range_fails() {
        let list = array(json!([1]));

        let err = list.assign(usize::MAX, 2).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: usize::MAX }));
        assert_eq!(numbers(&list), vec![1.0]);
    }

    #[test]
    fn frozen_array_rejects_mutation() {
        let list = array(json!([1]));
        list.freeze();

        assert!(matches!(list.push([2]), Err(Error::Frozen { .. })));
        assert!(matches!(list.assign(0, 2), Err(Error::Frozen { .. })));
        assert_eq!(numbers(&list), vec![1.0]);
    }
}
