//! Value boxes - single-slot reactive containers.
//!
//! A [`RefValue`] holds one [`Value`] behind a dedicated subscriber set.
//! Reading it inside an effect subscribes the effect; writing it triggers
//! the subscribers, unless the new value is identical to the old one.
//!
//! Object payloads are wrapped reactively on the way in, so `ref(obj)` gives
//! deep observation without a second wrapping step. [`proxy_refs`] builds an
//! auto-unwrapping view over an object of refs, which is what keeps render
//! closures free of explicit `.get()` calls on setup state.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::{has_changed, Obj, Value};

use super::dep::{self, Dep};
use super::reactive::reactive;

// =============================================================================
// RefValue
// =============================================================================

/// A reactive single-value container.
#[derive(Clone)]
pub struct RefValue {
    inner: Rc<RefInner>,
}

struct RefInner {
    /// Current value. Object payloads are stored in wrapped form; the raw
    /// original is kept for the change comparison on set.
    value: RefCell<Value>,
    raw: RefCell<Value>,
    dep: Dep,
}

/// Convert an incoming payload: objects become observed views, everything
/// else passes through.
fn convert(value: Value) -> Value {
    if value.is_object() {
        reactive(value)
    } else {
        value
    }
}

impl RefValue {
    /// Read the value, subscribing the active effect if one is tracking.
    pub fn get(&self) -> Value {
        if dep::is_tracking() {
            dep::track_effects(&self.inner.dep);
        }
        self.inner.value.borrow().clone()
    }

    /// Replace the value and trigger subscribers.
    ///
    /// Writes that do not change the value (same-value semantics of
    /// [`crate::value::value_is`], compared against the raw payload) are
    /// silently dropped and trigger nothing.
    pub fn set(&self, value: Value) {
        if !has_changed(&value, &self.inner.raw.borrow()) {
            return;
        }
        *self.inner.raw.borrow_mut() = value.clone();
        *self.inner.value.borrow_mut() = convert(value);
        dep::trigger_effects(&self.inner.dep);
    }

    /// Identity comparison of boxes.
    pub fn ptr_eq(&self, other: &RefValue) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Create a value box. Object payloads are deep-wrapped.
pub fn create_ref(value: Value) -> RefValue {
    RefValue {
        inner: Rc::new(RefInner {
            raw: RefCell::new(value.clone()),
            value: RefCell::new(convert(value)),
            dep: Dep::new(),
        }),
    }
}

/// Whether the value is a value box.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Unwrap one level: a box yields its current value (tracked), anything else
/// passes through.
pub fn unref(value: Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other,
    }
}

// =============================================================================
// Auto-unwrapping view
// =============================================================================

/// A view over an object whose ref-valued fields read and write as plain
/// values.
#[derive(Clone)]
pub struct RefsView {
    target: Obj,
}

impl RefsView {
    /// Read a field, unwrapping it if it holds a box.
    pub fn get(&self, key: &str) -> Value {
        unref(self.target.get(key).unwrap_or(Value::Null))
    }

    /// Write a field. When the field holds a box and the incoming value is
    /// not one, the write goes through the box's setter (subscribers fire);
    /// otherwise the field is replaced outright.
    pub fn set(&self, key: &str, value: Value) {
        match self.target.get(key) {
            Some(Value::Ref(existing)) if !is_ref(&value) => existing.set(value),
            _ => self.target.set(key, value),
        }
    }

    /// The object behind the view.
    pub fn raw(&self) -> &Obj {
        &self.target
    }
}

/// Build an auto-unwrapping view over `target`.
pub fn proxy_refs(target: Obj) -> RefsView {
    RefsView { target }
}

// =============================================================================
// Tests
// =============================================================================
