//! Dynamic values held by reactive data.
//!
//! Data in a component is JSON-shaped. Scalars are stored inline; objects and
//! arrays are always observed containers, so holding a [`Value`] never means
//! holding unobserved structure. Cloning a container clones the handle, not
//! the contents.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;

use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::observer::{observe, Observer};
use super::{ReactiveArray, ReactiveObject};

/// A reactive value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(ReactiveArray),
    Object(ReactiveObject),
}

impl Value {
    /// Identity comparison used for change detection.
    ///
    /// Scalars compare by value, except that `NaN` is the same as `NaN`.
    /// Containers compare by identity, never by contents.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Check if this value is an object or an array.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// The observer attached to a container, `None` for scalars.
    pub fn observer(&self) -> Option<&Observer> {
        match self {
            Value::Array(array) => Some(array.observer()),
            Value::Object(object) => Some(object.observer()),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Snapshot as plain JSON. Reads are not tracked.
    ///
    /// A container that contains itself is written as `"[Circular]"` where
    /// it reappears.
    pub fn to_json(&self) -> serde_json::Value {
        ReactiveContext::untracked(|| self.json_at(&mut Path::new()))
    }

    fn json_at(&self, path: &mut Path) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if is_integral(*n) => serde_json::Value::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(array) => within(path, array.addr(), |path| {
                serde_json::Value::Array(array.snapshot().iter().map(|item| item.json_at(path)).collect())
            })
            .unwrap_or_else(circular),
            Value::Object(object) => within(path, object.addr(), |path| {
                serde_json::Value::Object(
                    object
                        .entries()
                        .into_iter()
                        .map(|(key, value)| (key, value.json_at(path)))
                        .collect(),
                )
            })
            .unwrap_or_else(circular),
        }
    }

    fn eq_at(&self, other: &Value, pairs: &mut SmallVec<[(*const (), *const ()); 8]>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let pair = (a.addr(), b.addr());
                if a.ptr_eq(b) || pairs.contains(&pair) {
                    return true;
                }
                pairs.push(pair);
                let (xs, ys) = (a.snapshot(), b.snapshot());
                let equal = xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| x.eq_at(y, pairs));
                pairs.pop();
                equal
            }
            (Value::Object(a), Value::Object(b)) => {
                let pair = (a.addr(), b.addr());
                if a.ptr_eq(b) || pairs.contains(&pair) {
                    return true;
                }
                pairs.push(pair);
                let (xs, ys) = (a.entries(), b.entries());
                let equal = xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(&ys)
                        .all(|((kx, x), (ky, y))| kx == ky && x.eq_at(y, pairs));
                pairs.pop();
                equal
            }
            _ => false,
        }
    }

    /// Ordering used by [`ReactiveArray::sort`]: every element compared by
    /// its rendered text, so `10` sorts before `9`.
    pub(crate) fn default_order(a: &Value, b: &Value) -> Ordering {
        a.to_string().cmp(&b.to_string())
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

/// Structural equality, mostly useful in tests. Use [`Value::same`] for
/// change detection. Cycles compare equal when both sides loop back at the
/// same point.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        ReactiveContext::untracked(|| self.eq_at(other, &mut SmallVec::new()))
    }
}

/// Containers on the way from the root to the value being visited.
type Path = SmallVec<[*const (); 8]>;

const CIRCULAR: &str = "[Circular]";

fn circular() -> serde_json::Value {
    serde_json::Value::String(CIRCULAR.to_owned())
}

/// Run `f` with `addr` on the path, or return `None` if `addr` is already an
/// ancestor.
fn within<R>(path: &mut Path, addr: *const (), f: impl FnOnce(&mut Path) -> R) -> Option<R> {
    if path.contains(&addr) {
        return None;
    }
    path.push(addr);
    let result = f(path);
    path.pop();
    Some(result)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// Text rendering: strings raw, integral numbers without a fraction,
/// containers as JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) if is_integral(*n) => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// Serializes the data only; the observer marker never appears. A cyclic
/// value is a serialization error.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let path = RefCell::new(Path::new());
        Walk { value: self, path: &path }.serialize(serializer)
    }
}

struct Walk<'a> {
    value: &'a Value,
    path: &'a RefCell<Path>,
}

impl Walk<'_> {
    fn enter<E: ser::Error>(&self, addr: *const ()) -> Result<(), E> {
        let mut path = self.path.borrow_mut();
        if path.contains(&addr) {
            return Err(E::custom("cannot serialize a cyclic value"));
        }
        path.push(addr);
        Ok(())
    }

    fn child<'b>(&'b self, value: &'b Value) -> Walk<'b> {
        Walk { value, path: self.path }
    }

    fn items<S: Serializer>(&self, items: &[Value], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&self.child(item))?;
        }
        seq.end()
    }

    fn entries<S: Serializer>(&self, entries: &[(String, Value)], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, &self.child(value))?;
        }
        map.end()
    }
}

impl Serialize for Walk<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let result = match self.value {
            Value::Null => return serializer.serialize_unit(),
            Value::Bool(b) => return serializer.serialize_bool(*b),
            Value::Number(n) if is_integral(*n) => return serializer.serialize_i64(*n as i64),
            Value::Number(n) => return serializer.serialize_f64(*n),
            Value::String(s) => return serializer.serialize_str(s),
            Value::Array(array) => {
                self.enter::<S::Error>(array.addr())?;
                let items = ReactiveContext::untracked(|| array.snapshot());
                self.items(&items, serializer)
            }
            Value::Object(object) => {
                self.enter::<S::Error>(object.addr())?;
                let entries = ReactiveContext::untracked(|| object.entries());
                self.entries(&entries, serializer)
            }
        };
        self.path.borrow_mut().pop();
        result
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        observe(json)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ReactiveArray> for Value {
    fn from(array: ReactiveArray) -> Self {
        Value::Array(array)
    }
}

impl From<ReactiveObject> for Value {
    fn from(object: ReactiveObject) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
