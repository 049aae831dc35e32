//! Dynamic value model - what flows through the reactive graph.
//!
//! Rust has no transparent property interception, so observed state lives in
//! a small dynamic model instead: a `Value` is a scalar, a plain object
//! ([`Obj`]), a reactive wrapper around an object, or a single-slot ref.
//! Wrappers and refs carry their own identity, so the same raw object can be
//! told apart from its observed views.
//!
//! Comparison uses `Object.is` semantics throughout ([`value_is`]): NaN is
//! equal to NaN, `+0.0` and `-0.0` are distinct, strings compare by content,
//! everything composite compares by identity.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactivity::{Reactive, RefValue};

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed value.
///
/// Cloning is cheap: strings and objects are `Rc`-shared, scalars are copied.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    /// A raw plain object. Reads and writes through it are not tracked.
    Obj(Obj),
    /// An observed view of an object (see `reactivity::reactive`).
    Reactive(Reactive),
    /// A single-slot reactive container (see `reactivity::refs`).
    Ref(RefValue),
}

impl Value {
    /// Shorthand for a string value.
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Shorthand for a numeric value.
    pub fn num(n: f64) -> Self {
        Value::Num(n)
    }

    /// Whether this value is a raw plain object.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Obj(_))
    }

    /// JS-style truthiness. `Null`, `false`, `0`, NaN and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Obj(_) | Value::Reactive(_) | Value::Ref(_) => true,
        }
    }

    /// Numeric payload, if any.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Object payload, if any.
    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<Obj> for Value {
    fn from(v: Obj) -> Self {
        Value::Obj(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Obj(o) => write!(f, "Obj#{}", o.id()),
            Value::Reactive(r) => write!(f, "Reactive#{}", r.raw().id()),
            Value::Ref(_) => write!(f, "Ref"),
        }
    }
}

// =============================================================================
// Obj - shared plain object
// =============================================================================

thread_local! {
    /// Counter for unique object IDs (used as registry keys).
    static OBJ_ID_COUNTER: Cell<u64> = const { Cell::new(0) };
}

fn next_obj_id() -> u64 {
    OBJ_ID_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        id
    })
}

/// A shared, insertion-ordered, string-keyed map of [`Value`]s.
///
/// This is the "raw object" of the value model. Cloning shares the underlying
/// storage; two clones compare equal under [`Obj::ptr_eq`]. Each object gets a
/// unique ID at creation, used by the dependency registry and the wrapper
/// identity caches.
#[derive(Clone)]
pub struct Obj {
    inner: Rc<ObjInner>,
}

struct ObjInner {
    id: u64,
    fields: RefCell<IndexMap<String, Value>>,
}

impl Obj {
    /// Create an empty object.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjInner {
                id: next_obj_id(),
                fields: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Create an object from key/value pairs, preserving order.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let obj = Self::new();
        {
            let mut fields = obj.inner.fields.borrow_mut();
            for (key, value) in entries {
                fields.insert(key.into(), value);
            }
        }
        obj
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    /// Unique ID of this object.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Read a field. Returns a clone of the stored value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.fields.borrow().get(key).cloned()
    }

    /// Write a field (insert or overwrite).
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.fields.borrow_mut().insert(key.into(), value);
    }

    /// Whether the object has a field with this key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.borrow().contains_key(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    /// Whether the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    /// Snapshot of the entries in insertion order.
    ///
    /// Returns owned clones so callers can iterate while the object is
    /// mutated underneath them.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Identity comparison: true iff both handles share storage.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.inner.fields.borrow();
        f.debug_map().entries(fields.iter()).finish()
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// `Object.is` semantics.
///
/// NaN equals NaN; `+0.0` and `-0.0` differ (bit comparison); strings compare
/// by content; objects, wrappers and refs compare by identity; values of
/// different variants never compare equal.
pub fn value_is(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Num(x), Value::Num(y)) => {
            x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Obj(x), Value::Obj(y)) => x.ptr_eq(y),
        (Value::Reactive(x), Value::Reactive(y)) => x.ptr_eq(y),
        (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// True iff the two values differ under [`value_is`].
pub fn has_changed(a: &Value, b: &Value) -> bool {
    !value_is(a, b)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_scalars() {
        assert!(value_is(&Value::Null, &Value::Null));
        assert!(value_is(&Value::Bool(true), &Value::Bool(true)));
        assert!(!value_is(&Value::Bool(true), &Value::Bool(false)));
        assert!(value_is(&Value::num(1.5), &Value::num(1.5)));
        assert!(!value_is(&Value::num(1.0), &Value::str("1")));
    }

    #[test]
    fn test_value_is_nan_and_zero() {
        // NaN == NaN, unlike IEEE comparison
        assert!(value_is(&Value::num(f64::NAN), &Value::num(f64::NAN)));
        // +0 and -0 are distinct
        assert!(!value_is(&Value::num(0.0), &Value::num(-0.0)));
        assert!(value_is(&Value::num(0.0), &Value::num(0.0)));
    }

    #[test]
    fn test_value_is_identity() {
        let a = Obj::new().with("x", Value::num(1.0));
        let b = Obj::new().with("x", Value::num(1.0));
        assert!(value_is(&Value::Obj(a.clone()), &Value::Obj(a.clone())));
        assert!(!value_is(&Value::Obj(a), &Value::Obj(b)));
    }

    #[test]
    fn test_obj_fields() {
        let obj = Obj::from_entries([("a", Value::num(1.0)), ("b", Value::str("two"))]);
        assert_eq!(obj.len(), 2);
        assert_eq!(obj.get("a").unwrap().as_num(), Some(1.0));
        assert_eq!(obj.get("b").unwrap().as_str(), Some("two"));
        assert!(obj.get("c").is_none());

        obj.set("c", Value::Bool(true));
        assert!(obj.contains_key("c"));
        let keys: Vec<String> = obj.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_obj_ids_are_unique() {
        let a = Obj::new();
        let b = Obj::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::num(0.0).is_truthy());
        assert!(!Value::num(f64::NAN).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::num(-1.0).is_truthy());
        assert!(Value::str("0").is_truthy());
        assert!(Value::Obj(Obj::new()).is_truthy());
    }
}
