//! Lazily cached derived values.
//!
//! A computed value wraps a getter in a lazy effect. The getter only runs
//! when someone reads the value while it is dirty; a dependency change marks
//! it dirty (via the effect's scheduler) instead of recomputing, and notifies
//! readers so they can pull the fresh value.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::value::Value;

use super::dep::{self, Dep};
use super::effect::{effect_with_options, EffectOptions, EffectRunner};

/// A cached derived value.
#[derive(Clone)]
pub struct ComputedRef {
    state: Rc<ComputedState>,
    runner: EffectRunner,
}

struct ComputedState {
    value: RefCell<Value>,
    dirty: Cell<bool>,
    dep: Dep,
}

impl ComputedRef {
    /// Read the value, recomputing it first if a dependency changed since the
    /// last read. Subscribes the active effect, like a ref read.
    pub fn get(&self) -> Value {
        if dep::is_tracking() {
            dep::track_effects(&self.state.dep);
        }
        if self.state.dirty.get() {
            self.runner.run();
        }
        self.state.value.borrow().clone()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ComputedRef) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

/// Create a computed value from a getter.
///
/// The getter does not run until the first [`get`](ComputedRef::get).
pub fn computed(mut getter: impl FnMut() -> Value + 'static) -> ComputedRef {
    let state = Rc::new(ComputedState {
        value: RefCell::new(Value::Null),
        dirty: Cell::new(true),
        dep: Dep::new(),
    });

    let run_state = state.clone();
    let sched_state = state.clone();
    let runner = effect_with_options(
        move || {
            // Dirty clears only once the getter returns; an unwinding getter
            // leaves the cache marked stale.
            let value = getter();
            *run_state.value.borrow_mut() = value;
            run_state.dirty.set(false);
        },
        EffectOptions {
            lazy: true,
            // On dependency change: flip to dirty once and wake readers. The
            // getter itself stays cold until the next read.
            scheduler: Some(Rc::new(move || {
                if !sched_state.dirty.get() {
                    sched_state.dirty.set(true);
                    dep::trigger_effects(&sched_state.dep);
                }
            })),
            ..Default::default()
        },
    );

    ComputedRef { state, runner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::effect::effect;
    use crate::reactivity::reactive::reactive;
    use crate::value::Obj;

    fn counted_getter(
        source: crate::reactivity::Reactive,
    ) -> (ComputedRef, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let derived = computed(move || {
            c.set(c.get() + 1);
            source.get("age")
        });
        (derived, calls)
    }

    fn reactive_user(age: f64) -> crate::reactivity::Reactive {
        let obj = Obj::new().with("age", Value::num(age));
        match reactive(Value::Obj(obj)) {
            Value::Reactive(r) => r,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_computed_returns_derived_value() {
        let user = reactive_user(1.0);
        let age = computed(move || user.get("age"));
        assert_eq!(age.get().as_num(), Some(1.0));
    }

    #[test]
    fn test_computed_is_lazy() {
        let user = reactive_user(1.0);
        let (derived, calls) = counted_getter(user);
        assert_eq!(calls.get(), 0);
        derived.get();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_computed_caches_until_invalidated() {
        let user = reactive_user(1.0);
        let (derived, calls) = counted_getter(user.clone());

        assert_eq!(derived.get().as_num(), Some(1.0));
        derived.get();
        derived.get();
        assert_eq!(calls.get(), 1);

        // Write invalidates but does not recompute.
        user.set("age", Value::num(2.0));
        assert_eq!(calls.get(), 1);

        // Next read recomputes once.
        assert_eq!(derived.get().as_num(), Some(2.0));
        assert_eq!(calls.get(), 2);
        derived.get();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_computed_notifies_effect_readers() {
        let user = reactive_user(1.0);
        let derived = computed({
            let u = user.clone();
            move || u.get("age")
        });

        let seen = Rc::new(Cell::new(0.0));
        let runs = Rc::new(Cell::new(0));
        let (s, r, d) = (seen.clone(), runs.clone(), derived.clone());
        effect(move || {
            r.set(r.get() + 1);
            s.set(d.get().as_num().unwrap());
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(seen.get(), 1.0);

        user.set("age", Value::num(5.0));
        assert_eq!(runs.get(), 2);
        assert_eq!(seen.get(), 5.0);
    }

    #[test]
    fn test_panicking_getter_keeps_cache_stale() {
        let fail = Rc::new(Cell::new(true));
        let calls = Rc::new(Cell::new(0));
        let (f, c) = (fail.clone(), calls.clone());
        let derived = computed(move || {
            c.set(c.get() + 1);
            if f.get() {
                panic!("getter failure");
            }
            Value::num(7.0)
        });

        let d = derived.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || d.get()));
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);

        // The failed run must not have marked the cache clean.
        fail.set(false);
        assert_eq!(derived.get().as_num(), Some(7.0));
        assert_eq!(calls.get(), 2);
    }

    use std::cell::Cell;
    use std::rc::Rc;
}
