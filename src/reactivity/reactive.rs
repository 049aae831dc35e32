//! Observed-object wrappers - mutable, readonly, and shallow-readonly views.
//!
//! Wrapping an [`Obj`] yields a [`Reactive`] handle whose accessors route
//! through the dependency registry: reads track (mutable variant only),
//! writes trigger. One constructor serves all three variants; a per-variant
//! identity cache guarantees that wrapping the same raw object twice returns
//! the identical handle.
//!
//! Misuse is lenient by design: wrapping a non-object logs a warning and
//! returns the input unchanged, and writing through a readonly view logs a
//! warning and refuses the write. Neither is an error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::value::{Obj, Value};

use super::dep;

// =============================================================================
// Reactive handle
// =============================================================================

/// An observed view of an [`Obj`].
///
/// The raw object stays owned by the application; the handle only borrows
/// into it. Variant flags are fixed at wrap time.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ReactiveInner>,
}

struct ReactiveInner {
    target: Obj,
    readonly: bool,
    shallow: bool,
}

impl Reactive {
    /// The raw object behind this view. Never tracks.
    pub fn raw(&self) -> Obj {
        self.inner.target.clone()
    }

    /// Whether writes through this view track/trigger. Never tracks.
    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    /// Whether nested objects are returned unwrapped. Never tracks.
    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    /// Read a field.
    ///
    /// Missing fields read as `Null`. Nested objects come back wrapped in the
    /// same variant (readonly propagates readonly) unless this view is
    /// shallow. Only the mutable variant records a dependency.
    pub fn get(&self, key: &str) -> Value {
        let res = self.inner.target.get(key).unwrap_or(Value::Null);
        if self.inner.shallow {
            return res;
        }
        if res.is_object() {
            return if self.inner.readonly {
                readonly(res)
            } else {
                reactive(res)
            };
        }
        if !self.inner.readonly {
            dep::track(&self.inner.target, key);
        }
        res
    }

    /// Write a field, then trigger its dependents.
    ///
    /// On a readonly view the write is refused with a warning and nothing is
    /// triggered.
    pub fn set(&self, key: &str, value: Value) {
        if self.inner.readonly {
            warn!(key, "set failed: target is readonly");
            return;
        }
        self.inner.target.set(key, value);
        dep::trigger(&self.inner.target, key);
    }

    /// Identity comparison of views.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

// =============================================================================
// Wrap constructors + identity caches
// =============================================================================

thread_local! {
    static REACTIVE_MAP: RefCell<HashMap<u64, Weak<ReactiveInner>>> = RefCell::new(HashMap::new());
    static READONLY_MAP: RefCell<HashMap<u64, Weak<ReactiveInner>>> = RefCell::new(HashMap::new());
    static SHALLOW_READONLY_MAP: RefCell<HashMap<u64, Weak<ReactiveInner>>> = RefCell::new(HashMap::new());
}

fn create_reactive_object(
    value: Value,
    is_readonly: bool,
    shallow: bool,
    cache: &'static std::thread::LocalKey<RefCell<HashMap<u64, Weak<ReactiveInner>>>>,
) -> Value {
    let target = match value {
        // Wrapping an existing wrapper returns it unchanged, whatever the
        // requested variant (the raw-access marker of the original).
        Value::Reactive(_) => return value,
        Value::Obj(obj) => obj,
        other => {
            warn!(value = ?other, "value cannot be made reactive: not an object");
            return other;
        }
    };

    let cached = cache.with(|map| {
        map.borrow()
            .get(&target.id())
            .and_then(|weak| weak.upgrade())
    });
    if let Some(inner) = cached {
        return Value::Reactive(Reactive { inner });
    }

    let inner = Rc::new(ReactiveInner {
        target: target.clone(),
        readonly: is_readonly,
        shallow,
    });
    cache.with(|map| {
        map.borrow_mut().insert(target.id(), Rc::downgrade(&inner));
    });
    Value::Reactive(Reactive { inner })
}

/// Wrap an object in a tracking, deep, mutable view.
pub fn reactive(value: Value) -> Value {
    create_reactive_object(value, false, false, &REACTIVE_MAP)
}

/// Wrap an object in a deep readonly view. Reads don't track, writes warn.
pub fn readonly(value: Value) -> Value {
    create_reactive_object(value, true, false, &READONLY_MAP)
}

/// Wrap an object in a readonly view whose nested objects stay unwrapped.
pub fn shallow_readonly(value: Value) -> Value {
    create_reactive_object(value, true, true, &SHALLOW_READONLY_MAP)
}

// =============================================================================
// Predicates
// =============================================================================

/// Whether the value is a tracking (non-readonly) observed view.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(r) if !r.is_readonly())
}

/// Whether the value is a readonly observed view.
pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Reactive(r) if r.is_readonly())
}

/// Whether the value is any observed view.
pub fn is_proxy(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

// =============================================================================
// Tests
// =============================================================================
