//! Stateful components - definitions, instances, and the update gate.
//!
//! A [`ComponentDef`] is just a render function; an instance is the mounted
//! state behind one component vnode: its current props view, its rendered
//! subtree, and the update effect that re-renders it when tracked state
//! changes. Props are exposed to the render function as a shallow-readonly
//! view, so components can read them reactively but not write them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::reactivity::EffectRunner;
use crate::value::{has_changed, Value};

use super::host::HostId;
use super::vnode::VNode;

// =============================================================================
// ComponentDef
// =============================================================================

/// A component definition. Identity (not structure) decides whether two
/// component vnodes are the same type.
#[derive(Clone)]
pub struct ComponentDef {
    inner: Rc<ComponentDefInner>,
}

struct ComponentDefInner {
    render: Box<dyn Fn(&Value) -> VNode>,
}

impl ComponentDef {
    /// Define a component from its render function. The argument is the
    /// instance's props as a shallow-readonly view.
    pub fn new(render: impl Fn(&Value) -> VNode + 'static) -> Self {
        Self {
            inner: Rc::new(ComponentDefInner {
                render: Box::new(render),
            }),
        }
    }

    pub(crate) fn render(&self, props: &Value) -> VNode {
        (self.inner.render)(props)
    }

    pub fn ptr_eq(&self, other: &ComponentDef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

// =============================================================================
// ComponentInstance
// =============================================================================

thread_local! {
    static INSTANCE_UID_COUNTER: Cell<u64> = const { Cell::new(0) };
}

fn next_instance_uid() -> u64 {
    INSTANCE_UID_COUNTER.with(|counter| {
        let uid = counter.get();
        counter.set(uid + 1);
        uid
    })
}

/// Mounted state behind one component vnode.
pub struct ComponentInstance {
    /// Unique ID, also the dedup key for the instance's update job.
    pub(crate) uid: u64,
    pub(crate) def: ComponentDef,
    /// Shallow-readonly view of the current props object.
    pub(crate) props: RefCell<Value>,
    /// The component vnode currently representing this instance.
    pub(crate) vnode: RefCell<VNode>,
    /// Pending replacement vnode set by a parent-driven update.
    pub(crate) next: RefCell<Option<VNode>>,
    /// The subtree rendered by the last finished update.
    pub(crate) sub_tree: RefCell<Option<VNode>>,
    /// Subtree produced by the tracked render, waiting to be patched in.
    pub(crate) next_tree: RefCell<Option<VNode>>,
    pub(crate) mounted: Cell<bool>,
    pub(crate) container: Cell<HostId>,
    pub(crate) anchor: Cell<Option<HostId>>,
    /// The update effect, installed right after the instance is built.
    pub(crate) update: RefCell<Option<EffectRunner>>,
}

impl ComponentInstance {
    pub(crate) fn new(
        def: ComponentDef,
        props: Value,
        vnode: VNode,
        container: HostId,
        anchor: Option<HostId>,
    ) -> Self {
        Self {
            uid: next_instance_uid(),
            def,
            props: RefCell::new(props),
            vnode: RefCell::new(vnode),
            next: RefCell::new(None),
            sub_tree: RefCell::new(None),
            next_tree: RefCell::new(None),
            mounted: Cell::new(false),
            container: Cell::new(container),
            anchor: Cell::new(anchor),
            update: RefCell::new(None),
        }
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }
}

// =============================================================================
// Update gate
// =============================================================================

/// Whether a parent-driven update actually needs a re-render: true iff some
/// prop of the next vnode is missing from or differs from the previous one.
pub fn should_update_component(prev: &VNode, next: &VNode) -> bool {
    for (key, next_value) in next.props().entries() {
        match prev.props().get(&key) {
            Some(prev_value) => {
                if has_changed(&next_value, &prev_value) {
                    return true;
                }
            }
            None => return true,
        }
    }
    false
}
