//! Dependency registry and tracking context.
//!
//! The registry maps (object, key) pairs to the set of effects that read that
//! key during their last run. The tracking context is process-wide state (one
//! thread, see crate docs) holding the effect that is currently running and
//! whether tracking is enabled at all.
//!
//! # Lifecycle
//!
//! Dependency entries are created lazily on first tracked read and are never
//! removed, except that a stopped effect purges itself from every entry it
//! belongs to. Retaining empty entries trades memory for lookup simplicity.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Obj;

use super::effect::EffectInner;

// =============================================================================
// Tracking Context
// =============================================================================

thread_local! {
    /// The effect currently being run, if any.
    static ACTIVE_EFFECT: RefCell<Option<Rc<EffectInner>>> = const { RefCell::new(None) };

    /// Whether reads should record dependencies right now.
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(false) };

    /// target id -> key -> dep. Entries persist until reset (see module docs).
    static TARGET_MAP: RefCell<HashMap<u64, HashMap<String, Dep>>> = RefCell::new(HashMap::new());
}

/// Whether a read right now would be recorded as a dependency.
pub fn is_tracking() -> bool {
    SHOULD_TRACK.with(|t| t.get()) && ACTIVE_EFFECT.with(|a| a.borrow().is_some())
}

pub(crate) fn active_effect() -> Option<Rc<EffectInner>> {
    ACTIVE_EFFECT.with(|a| a.borrow().clone())
}

pub(crate) fn set_active_effect(effect: Option<Rc<EffectInner>>) {
    ACTIVE_EFFECT.with(|a| *a.borrow_mut() = effect);
}

pub(crate) fn tracking_enabled() -> bool {
    SHOULD_TRACK.with(|t| t.get())
}

pub(crate) fn set_tracking(enabled: bool) {
    SHOULD_TRACK.with(|t| t.set(enabled));
}

// =============================================================================
// Dep - one subscriber set
// =============================================================================

/// The set of effects subscribed to a single (object, key) pair, or to a
/// ref's single slot. Iteration order is insertion order.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

struct DepInner {
    subscribers: RefCell<IndexMap<u64, Rc<EffectInner>>>,
}

impl Dep {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(DepInner {
                subscribers: RefCell::new(IndexMap::new()),
            }),
        }
    }

    pub(crate) fn contains(&self, effect_id: u64) -> bool {
        self.inner.subscribers.borrow().contains_key(&effect_id)
    }

    pub(crate) fn insert(&self, effect: Rc<EffectInner>) {
        self.inner
            .subscribers
            .borrow_mut()
            .insert(effect.id(), effect);
    }

    pub(crate) fn remove(&self, effect_id: u64) {
        self.inner.subscribers.borrow_mut().shift_remove(&effect_id);
    }

    /// Snapshot of the current subscribers in insertion order.
    ///
    /// Trigger iterates the snapshot, never the live set: a re-run rebuilds
    /// its subscriptions and would otherwise mutate the set mid-iteration.
    pub(crate) fn snapshot(&self) -> Vec<Rc<EffectInner>> {
        self.inner.subscribers.borrow().values().cloned().collect()
    }

    /// Number of subscribed effects.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

// =============================================================================
// track / trigger
// =============================================================================

/// Record the active effect as a subscriber of `(target, key)`.
///
/// No-op when no effect is running or tracking is disabled. Re-reading the
/// same key within one run does not duplicate the subscription.
pub fn track(target: &Obj, key: &str) {
    if !is_tracking() {
        return;
    }
    let dep = TARGET_MAP.with(|map| {
        let mut map = map.borrow_mut();
        let deps_map = map.entry(target.id()).or_default();
        deps_map.entry(key.to_string()).or_insert_with(Dep::new).clone()
    });
    track_effects(&dep);
}

/// Subscribe the active effect to `dep` and record the reverse link.
pub(crate) fn track_effects(dep: &Dep) {
    let Some(effect) = active_effect() else { return };
    if dep.contains(effect.id()) {
        return;
    }
    dep.insert(effect.clone());
    effect.push_dep(dep.clone());
}

/// Re-run (or schedule) every effect subscribed to `(target, key)`.
///
/// Writing a key nobody tracked is legal and does nothing.
pub fn trigger(target: &Obj, key: &str) {
    let dep = TARGET_MAP.with(|map| {
        map.borrow()
            .get(&target.id())
            .and_then(|deps_map| deps_map.get(key))
            .cloned()
    });
    if let Some(dep) = dep {
        trigger_effects(&dep);
    }
}

/// Invoke every subscriber of `dep`, except the effect that is itself
/// currently running (an effect that reads and writes the same key must not
/// re-enter itself within a single pass).
pub(crate) fn trigger_effects(dep: &Dep) {
    let active = active_effect();
    for effect in dep.snapshot() {
        if let Some(active) = &active {
            if Rc::ptr_eq(active, &effect) {
                continue;
            }
        }
        match effect.scheduler() {
            Some(scheduler) => scheduler(),
            None => EffectInner::run(&effect),
        }
    }
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Drop every dependency entry (for testing).
pub fn reset_dependency_state() {
    TARGET_MAP.with(|map| map.borrow_mut().clear());
    ACTIVE_EFFECT.with(|a| *a.borrow_mut() = None);
    SHOULD_TRACK.with(|t| t.set(false));
}
