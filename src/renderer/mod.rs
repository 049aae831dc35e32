//! Tree reconciliation - vnodes, the host abstraction, and the renderer.
//!
//! # Architecture
//!
//! - [`vnode`]: immutable tree descriptions with keys and shape flags.
//! - [`host`]: the mutation trait the reconciler drives.
//! - [`memory_host`]: the arena-backed host used by tests.
//! - [`component`]: stateful component definitions and instances.
//! - [`renderer`]: the patch engine, including the keyed-list diff.

pub mod component;
pub mod host;
pub mod memory_host;
pub mod renderer;
pub mod vnode;

pub use component::{should_update_component, ComponentDef, ComponentInstance};
pub use host::{Host, HostId};
pub use memory_host::{HostOp, MemNode, MemNodeKind, MemoryHost};
pub use renderer::{longest_increasing_subsequence, Renderer};
pub use vnode::{
    create_component_vnode, create_fragment, create_text_vnode, create_vnode, h,
    is_same_vnode_type, Children, Key, ShapeFlags, VNode, VNodeType,
};
