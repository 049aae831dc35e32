//! flint-ui - a reactive UI runtime core.
//!
//! Two halves, one contract: the reactivity subsystem tracks which
//! computations read which state and re-runs them when it changes; the
//! reconciler turns "re-run produced a new tree" into a minimal set of host
//! mutations.
//!
//! # Architecture
//!
//! - [`value`]: the dynamic value model observed state is made of.
//! - [`reactivity`]: dependency registry, observed objects, refs, effects
//!   and computed values.
//! - [`scheduler`]: the deduplicating job queue that batches re-renders.
//! - [`renderer`]: vnodes, the host abstraction, and the keyed-diff patch
//!   engine.
//!
//! The whole runtime is single-threaded: all registries live in
//! thread-local storage and handles are `Rc`-based. One thread owns the UI.
//!
//! # Example
//!
//! ```
//! use flint_ui::{create_ref, effect, Value};
//!
//! let count = create_ref(Value::num(0.0));
//! let seen = std::rc::Rc::new(std::cell::Cell::new(0.0));
//! let s = seen.clone();
//! let c = count.clone();
//! effect(move || {
//!     s.set(c.get().as_num().unwrap_or(0.0));
//! });
//! count.set(Value::num(3.0));
//! assert_eq!(seen.get(), 3.0);
//! ```

pub mod reactivity;
pub mod renderer;
pub mod scheduler;
pub mod value;

pub use reactivity::{
    computed, create_ref, effect, effect_with_options, is_proxy, is_reactive, is_readonly, is_ref,
    proxy_refs, reactive, readonly, shallow_readonly, stop, unref, ComputedRef, EffectOptions,
    EffectRunner, Reactive, RefValue, RefsView,
};
pub use renderer::{
    create_component_vnode, create_fragment, create_text_vnode, create_vnode, h,
    should_update_component, Children, ComponentDef, Host, HostId, HostOp, Key, MemoryHost,
    Renderer, ShapeFlags, VNode, VNodeType,
};
pub use scheduler::{flush_jobs, has_pending_jobs, next_tick, queue_job, Job};
pub use value::{has_changed, value_is, Obj, Value};
