//! Computation unit - the schedulable wrapper around a closure.
//!
//! An effect runs its closure once at registration, records every dependency
//! the closure reads, and re-runs (or hands itself to its scheduler) when any
//! of them changes.
//!
//! # State machine
//!
//! constructed -> active <-> running -> active -> ... -> stopped (terminal)
//!
//! The dependency set is cleared and rebuilt on every run, so state that was
//! only read conditionally stops re-triggering the effect once the condition
//! flips.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::dep::{self, Dep};

thread_local! {
    /// Counter for unique effect IDs.
    static EFFECT_ID_COUNTER: Cell<u64> = const { Cell::new(0) };
}

fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        id
    })
}

/// A deferred-execution hook: when present, `trigger` calls this instead of
/// re-running the effect directly.
pub type Scheduler = Rc<dyn Fn()>;

// =============================================================================
// EffectInner
// =============================================================================

pub(crate) struct EffectInner {
    id: u64,
    func: RefCell<Box<dyn FnMut()>>,
    /// Deps this effect is currently a member of (reverse links for cleanup).
    deps: RefCell<Vec<Dep>>,
    /// False once stopped. A stopped effect still runs its closure on demand,
    /// just without tracking.
    active: Cell<bool>,
    /// The effect that was running when this one started (re-entrancy chain).
    parent: RefCell<Option<Rc<EffectInner>>>,
    scheduler: Option<Scheduler>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl EffectInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler.clone()
    }

    pub(crate) fn push_dep(&self, dep: Dep) {
        self.deps.borrow_mut().push(dep);
    }

    /// Run the wrapped closure.
    ///
    /// Stopped effects run untracked. A unit that is already an ancestor of
    /// the currently running computation aborts instead of recursing
    /// unboundedly. Otherwise the previous tracking context is saved, this
    /// effect becomes active with tracking enabled, its stale dependency
    /// memberships are dropped, and the context is restored on every exit
    /// path, panics included.
    pub(crate) fn run(this: &Rc<EffectInner>) {
        if !this.active.get() {
            let mut func = this.func.borrow_mut();
            (*func)();
            return;
        }

        // Re-entrancy guard: walk the parent chain of the active effect.
        let mut cursor = dep::active_effect();
        while let Some(effect) = cursor {
            if Rc::ptr_eq(&effect, this) {
                return;
            }
            cursor = effect.parent.borrow().clone();
        }

        let prev_effect = dep::active_effect();
        let prev_tracking = dep::tracking_enabled();
        *this.parent.borrow_mut() = prev_effect.clone();
        dep::set_active_effect(Some(this.clone()));
        dep::set_tracking(true);

        let _guard = RestoreGuard {
            effect: this.clone(),
            prev_effect,
            prev_tracking,
        };

        cleanup_effect(this);
        let mut func = this.func.borrow_mut();
        (*func)();
    }

    /// Unsubscribe from every dep, fire the on-stop callback once, and mark
    /// the effect inactive. Idempotent.
    pub(crate) fn stop(this: &Rc<EffectInner>) {
        if !this.active.get() {
            return;
        }
        cleanup_effect(this);
        if let Some(on_stop) = this.on_stop.borrow_mut().take() {
            on_stop();
        }
        this.active.set(false);
    }
}

/// Restores the previous tracking context when a run exits, unwinding included.
struct RestoreGuard {
    effect: Rc<EffectInner>,
    prev_effect: Option<Rc<EffectInner>>,
    prev_tracking: bool,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        dep::set_active_effect(self.prev_effect.take());
        dep::set_tracking(self.prev_tracking);
        *self.effect.parent.borrow_mut() = None;
    }
}

/// Remove the effect from every dep it belongs to and clear the reverse links.
fn cleanup_effect(effect: &Rc<EffectInner>) {
    let deps = std::mem::take(&mut *effect.deps.borrow_mut());
    for dep in deps {
        dep.remove(effect.id());
    }
}

// =============================================================================
// EffectRunner - public handle
// =============================================================================

/// Cloneable handle to a registered effect.
///
/// Calling [`run`](EffectRunner::run) re-executes the wrapped closure; after
/// [`stop`](EffectRunner::stop) a manual run still executes the closure, but
/// untracked and without re-subscribing.
#[derive(Clone)]
pub struct EffectRunner {
    effect: Rc<EffectInner>,
}

impl EffectRunner {
    pub fn run(&self) {
        EffectInner::run(&self.effect);
    }

    pub fn stop(&self) {
        EffectInner::stop(&self.effect);
    }

    /// Unique ID, usable for job deduplication.
    pub fn id(&self) -> u64 {
        self.effect.id()
    }

    /// False once the effect has been stopped.
    pub fn is_active(&self) -> bool {
        self.effect.active.get()
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Options for [`effect_with_options`].
#[derive(Default)]
pub struct EffectOptions {
    /// Replaces immediate re-run on trigger with a deferred callback.
    pub scheduler: Option<Scheduler>,
    /// Invoked exactly once when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce()>>,
    /// Skip the immediate first run (used by computed values).
    pub lazy: bool,
}

/// Register an effect: run it once immediately and return its runner.
pub fn effect(f: impl FnMut() + 'static) -> EffectRunner {
    effect_with_options(f, EffectOptions::default())
}

/// Register an effect with a scheduler, an on-stop callback, or lazily.
pub fn effect_with_options(f: impl FnMut() + 'static, options: EffectOptions) -> EffectRunner {
    let inner = Rc::new(EffectInner {
        id: next_effect_id(),
        func: RefCell::new(Box::new(f)),
        deps: RefCell::new(Vec::new()),
        active: Cell::new(true),
        parent: RefCell::new(None),
        scheduler: options.scheduler,
        on_stop: RefCell::new(options.on_stop),
    });
    if !options.lazy {
        EffectInner::run(&inner);
    }
    EffectRunner { effect: inner }
}

/// Stop a runner's effect (mirror of the method, for call-site symmetry with
/// `effect(..)`).
pub fn stop(runner: &EffectRunner) {
    runner.stop();
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::reactive::reactive;
    use crate::value::{Obj, Value};
    use std::cell::Cell;

    fn reactive_obj(entries: &[(&str, f64)]) -> crate::reactivity::Reactive {
        let obj = Obj::from_entries(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), Value::num(*v))),
        );
        match reactive(Value::Obj(obj)) {
            Value::Reactive(r) => r,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_effect_runs_immediately() {
        let user = reactive_obj(&[("age", 10.0)]);
        let next_age = Rc::new(Cell::new(0.0));
        let seen = next_age.clone();
        let u = user.clone();
        effect(move || {
            seen.set(u.get("age").as_num().unwrap() + 1.0);
        });
        assert_eq!(next_age.get(), 11.0);

        user.set("age", Value::num(11.0));
        assert_eq!(next_age.get(), 12.0);
    }

    #[test]
    fn test_lazy_effect_does_not_run_on_creation() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let runner = effect_with_options(
            move || c.set(c.get() + 1),
            EffectOptions {
                lazy: true,
                ..Default::default()
            },
        );
        assert_eq!(count.get(), 0);
        runner.run();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_runner_reruns_on_demand() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let runner = effect(move || c.set(c.get() + 1));
        assert_eq!(count.get(), 1);
        runner.run();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_scheduler_replaces_direct_rerun() {
        let user = reactive_obj(&[("n", 1.0)]);
        let runs = Rc::new(Cell::new(0));
        let scheduled = Rc::new(Cell::new(0));

        let r = runs.clone();
        let s = scheduled.clone();
        let u = user.clone();
        let runner = effect_with_options(
            move || {
                u.get("n");
                r.set(r.get() + 1);
            },
            EffectOptions {
                scheduler: Some(Rc::new(move || s.set(s.get() + 1))),
                ..Default::default()
            },
        );

        // First run is direct, scheduler untouched.
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 0);

        user.set("n", Value::num(2.0));
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 1);

        // Manual run still works and re-tracks.
        runner.run();
        assert_eq!(runs.get(), 2);
        user.set("n", Value::num(3.0));
        assert_eq!(scheduled.get(), 2);
    }

    #[test]
    fn test_stop_unsubscribes() {
        let user = reactive_obj(&[("n", 1.0)]);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let u = user.clone();
        let runner = effect(move || {
            u.get("n");
            r.set(r.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        stop(&runner);
        user.set("n", Value::num(2.0));
        assert_eq!(runs.get(), 1);

        // Manual run after stop executes untracked and does not re-subscribe.
        runner.run();
        assert_eq!(runs.get(), 2);
        user.set("n", Value::num(3.0));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_stop_is_idempotent_and_fires_on_stop_once() {
        let stops = Rc::new(Cell::new(0));
        let s = stops.clone();
        let runner = effect_with_options(
            || {},
            EffectOptions {
                on_stop: Some(Box::new(move || s.set(s.get() + 1))),
                ..Default::default()
            },
        );
        runner.stop();
        runner.stop();
        assert_eq!(stops.get(), 1);
        assert!(!runner.is_active());
    }

    #[test]
    fn test_self_triggering_effect_terminates() {
        // Reads and writes the same key: the trigger excludes the running
        // effect, so this must settle after one run per external write.
        let user = reactive_obj(&[("n", 1.0)]);
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let u = user.clone();
        effect(move || {
            let n = u.get("n").as_num().unwrap();
            u.set("n", Value::num(n + 1.0));
            r.set(r.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(user.get("n").as_num(), Some(2.0));

        user.set("n", Value::num(10.0));
        assert_eq!(runs.get(), 2);
        assert_eq!(user.get("n").as_num(), Some(11.0));
    }

    #[test]
    fn test_conditional_dependency_pruning() {
        let state = reactive_obj(&[("a", 1.0), ("b", 10.0), ("c", 100.0)]);
        let runs = Rc::new(Cell::new(0));
        let last = Rc::new(Cell::new(0.0));
        let r = runs.clone();
        let l = last.clone();
        let s = state.clone();
        effect(move || {
            r.set(r.get() + 1);
            let picked = if s.get("a").is_truthy() {
                s.get("b")
            } else {
                s.get("c")
            };
            l.set(picked.as_num().unwrap());
        });
        assert_eq!(runs.get(), 1);
        assert_eq!(last.get(), 10.0);

        // Condition flips: effect now depends on `c`, not `b`.
        state.set("a", Value::num(0.0));
        assert_eq!(runs.get(), 2);
        assert_eq!(last.get(), 100.0);

        state.set("b", Value::num(20.0));
        assert_eq!(runs.get(), 2);

        state.set("c", Value::num(200.0));
        assert_eq!(runs.get(), 3);
        assert_eq!(last.get(), 200.0);
    }

    #[test]
    fn test_nested_effects_restore_outer_context() {
        let outer_state = reactive_obj(&[("x", 1.0)]);
        let inner_state = reactive_obj(&[("y", 1.0)]);
        let outer_runs = Rc::new(Cell::new(0));
        let inner_runs = Rc::new(Cell::new(0));

        let or = outer_runs.clone();
        let ir = inner_runs.clone();
        let os = outer_state.clone();
        let is_ = inner_state.clone();
        effect(move || {
            or.set(or.get() + 1);
            os.get("x");
            let ir2 = ir.clone();
            let is2 = is_.clone();
            effect(move || {
                ir2.set(ir2.get() + 1);
                is2.get("y");
            });
            // Reads after the nested effect must still track to the outer.
            os.get("x");
        });
        assert_eq!(outer_runs.get(), 1);
        assert_eq!(inner_runs.get(), 1);

        outer_state.set("x", Value::num(2.0));
        assert_eq!(outer_runs.get(), 2);
    }
}
