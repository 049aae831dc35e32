//! Fine-grained reactivity - dependency tracking, observed objects, value
//! boxes, computation units and derived values.
//!
//! # Architecture
//!
//! - [`dep`]: the (object, key) -> subscriber-set registry and the tracking
//!   context shared by everything else.
//! - [`reactive`]: observed-object wrappers (mutable, readonly, shallow).
//! - [`refs`]: single-slot value boxes and the auto-unwrapping view.
//! - [`effect`]: the schedulable computation unit.
//! - [`computed`]: lazily cached derived values.
//!
//! All state is thread-local; the runtime is single-threaded by design.

pub mod computed;
pub mod dep;
pub mod effect;
pub mod reactive;
pub mod refs;

pub use computed::{computed, ComputedRef};
pub use dep::{is_tracking, reset_dependency_state, track, trigger, Dep};
pub use effect::{effect, effect_with_options, stop, EffectOptions, EffectRunner, Scheduler};
pub use reactive::{
    is_proxy, is_reactive, is_readonly, reactive, readonly, shallow_readonly, Reactive,
};
pub use refs::{create_ref, is_ref, proxy_refs, unref, RefValue, RefsView};
