//! Host abstraction - the mutation surface the reconciler drives.
//!
//! The reconciler never touches a concrete output tree directly; it issues
//! primitive mutations through this trait. Any backing store that can create
//! nodes, move them under parents and update their text/props can host the
//! runtime. [`crate::renderer::MemoryHost`] is the in-process implementation
//! used by the tests.

use crate::value::Value;

/// Opaque handle to a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(pub usize);

/// The set of primitive tree mutations the reconciler needs.
pub trait Host {
    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> HostId;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> HostId;

    /// Apply a prop change to an element. `next == None` removes the prop.
    fn patch_prop(&mut self, el: HostId, key: &str, prev: Option<&Value>, next: Option<&Value>);

    /// Attach `child` under `parent`, before `anchor` when given, else at the
    /// end. Re-inserting an attached node moves it.
    fn insert(&mut self, child: HostId, parent: HostId, anchor: Option<HostId>);

    /// Detach `child` from its parent.
    fn remove(&mut self, child: HostId);

    /// Replace a node's text content, clearing any element children.
    fn set_text(&mut self, node: HostId, text: &str);
}
