//! Virtual nodes - the immutable tree descriptions the reconciler compares.
//!
//! A [`VNode`] is a cheap-to-clone handle describing one node: an element
//! with a tag, a text literal, a fragment, or a component. Mounted state
//! (the host node, the component instance) lives in interior-mutable slots
//! so the previous tree can be compared against the next one and carry its
//! host handles over.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bitflags::bitflags;

use crate::value::{value_is, Obj, Value};

use super::component::{ComponentDef, ComponentInstance};
use super::host::HostId;

bitflags! {
    /// Node classification, checked with bit tests on the hot path.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShapeFlags: u8 {
        const ELEMENT = 1;
        const STATEFUL_COMPONENT = 1 << 1;
        const TEXT_CHILDREN = 1 << 2;
        const ARRAY_CHILDREN = 1 << 3;
    }
}

/// What kind of node this is.
#[derive(Clone)]
pub enum VNodeType {
    /// A host element with this tag.
    Element(Rc<str>),
    /// A text literal (the text itself lives in [`Children::Text`]).
    Text,
    /// A keyless grouping node; its children mount into the parent container.
    Fragment,
    /// A stateful component.
    Component(ComponentDef),
}

/// The children slot of a node.
#[derive(Clone)]
pub enum Children {
    None,
    Text(Rc<str>),
    Array(Vec<VNode>),
}

struct VNodeInner {
    vtype: VNodeType,
    props: Obj,
    children: Children,
    /// Diff key, taken from the `key` prop. Falsy keys count as keyless.
    key: Option<Value>,
    shape_flag: ShapeFlags,
    /// Host node backing this vnode once mounted.
    el: Cell<Option<HostId>>,
    /// Instance backing a component vnode once mounted.
    component: RefCell<Option<Rc<ComponentInstance>>>,
}

/// Handle to one virtual node. Clones share the mounted-state slots.
#[derive(Clone)]
pub struct VNode {
    inner: Rc<VNodeInner>,
}

impl VNode {
    fn build(vtype: VNodeType, props: Obj, children: Children) -> Self {
        let mut shape_flag = match &vtype {
            VNodeType::Element(_) => ShapeFlags::ELEMENT,
            VNodeType::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
            VNodeType::Text | VNodeType::Fragment => ShapeFlags::empty(),
        };
        match &children {
            Children::Text(_) => shape_flag |= ShapeFlags::TEXT_CHILDREN,
            Children::Array(_) => shape_flag |= ShapeFlags::ARRAY_CHILDREN,
            Children::None => {}
        }
        let key = props.get("key").filter(Value::is_truthy);
        Self {
            inner: Rc::new(VNodeInner {
                vtype,
                props,
                children,
                key,
                shape_flag,
                el: Cell::new(None),
                component: RefCell::new(None),
            }),
        }
    }

    pub fn vtype(&self) -> &VNodeType {
        &self.inner.vtype
    }

    pub fn props(&self) -> &Obj {
        &self.inner.props
    }

    pub fn children(&self) -> &Children {
        &self.inner.children
    }

    pub fn key(&self) -> Option<&Value> {
        self.inner.key.as_ref()
    }

    pub fn shape_flag(&self) -> ShapeFlags {
        self.inner.shape_flag
    }

    pub fn el(&self) -> Option<HostId> {
        self.inner.el.get()
    }

    pub fn set_el(&self, el: Option<HostId>) {
        self.inner.el.set(el);
    }

    pub(crate) fn component(&self) -> Option<Rc<ComponentInstance>> {
        self.inner.component.borrow().clone()
    }

    pub(crate) fn set_component(&self, instance: Rc<ComponentInstance>) {
        *self.inner.component.borrow_mut() = Some(instance);
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Create an element vnode.
pub fn create_vnode(tag: impl Into<Rc<str>>, props: Obj, children: Children) -> VNode {
    VNode::build(VNodeType::Element(tag.into()), props, children)
}

/// Shorthand element constructor.
pub fn h(tag: impl Into<Rc<str>>, props: Obj, children: Children) -> VNode {
    create_vnode(tag, props, children)
}

/// Create a text vnode.
pub fn create_text_vnode(text: impl Into<Rc<str>>) -> VNode {
    VNode::build(VNodeType::Text, Obj::new(), Children::Text(text.into()))
}

/// Create a fragment vnode around a child list.
pub fn create_fragment(children: Vec<VNode>) -> VNode {
    VNode::build(VNodeType::Fragment, Obj::new(), Children::Array(children))
}

/// Create a component vnode.
pub fn create_component_vnode(def: ComponentDef, props: Obj) -> VNode {
    VNode::build(VNodeType::Component(def), props, Children::None)
}

// =============================================================================
// Keys + same-type test
// =============================================================================

/// Hashable form of a diff key, for the key-to-index map in the keyed diff.
///
/// Only scalar keys are representable; composite and falsy keys map to
/// `None` and fall back to the linear scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Bool(bool),
    /// Bit pattern of the f64 (keys are compared with same-value semantics,
    /// which is bit comparison for non-NaN numbers).
    Num(u64),
    Str(Rc<str>),
}

impl Key {
    pub fn from_value(value: &Value) -> Option<Key> {
        if !value.is_truthy() {
            return None;
        }
        match value {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Num(n) => Some(Key::Num(n.to_bits())),
            Value::Str(s) => Some(Key::Str(s.clone())),
            _ => None,
        }
    }
}

/// Whether two vnodes describe the same logical node: same type (element
/// tags equal, component defs identical) and same key.
pub fn is_same_vnode_type(a: &VNode, b: &VNode) -> bool {
    let type_matches = match (a.vtype(), b.vtype()) {
        (VNodeType::Element(t1), VNodeType::Element(t2)) => t1 == t2,
        (VNodeType::Text, VNodeType::Text) => true,
        (VNodeType::Fragment, VNodeType::Fragment) => true,
        (VNodeType::Component(d1), VNodeType::Component(d2)) => d1.ptr_eq(d2),
        _ => false,
    };
    if !type_matches {
        return false;
    }
    match (a.key(), b.key()) {
        (None, None) => true,
        (Some(k1), Some(k2)) => value_is(k1, k2),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(tag: &str, key: Value) -> VNode {
        create_vnode(tag, Obj::new().with("key", key), Children::None)
    }

    #[test]
    fn test_shape_flags() {
        let el = create_vnode("div", Obj::new(), Children::Text("hi".into()));
        assert!(el.shape_flag().contains(ShapeFlags::ELEMENT));
        assert!(el.shape_flag().contains(ShapeFlags::TEXT_CHILDREN));
        assert!(!el.shape_flag().contains(ShapeFlags::ARRAY_CHILDREN));

        let list = create_vnode("ul", Obj::new(), Children::Array(vec![]));
        assert!(list.shape_flag().contains(ShapeFlags::ARRAY_CHILDREN));
    }

    #[test]
    fn test_falsy_keys_are_keyless() {
        let keyless = create_vnode("div", Obj::new(), Children::None);
        assert!(keyless.key().is_none());
        assert!(keyed("div", Value::str("")).key().is_none());
        assert!(keyed("div", Value::num(0.0)).key().is_none());
        assert!(keyed("div", Value::Bool(false)).key().is_none());
        assert!(keyed("div", Value::str("a")).key().is_some());
    }

    #[test]
    fn test_same_vnode_type() {
        let a1 = keyed("div", Value::str("a"));
        let a2 = keyed("div", Value::str("a"));
        let b = keyed("div", Value::str("b"));
        let span = keyed("span", Value::str("a"));
        assert!(is_same_vnode_type(&a1, &a2));
        assert!(!is_same_vnode_type(&a1, &b));
        assert!(!is_same_vnode_type(&a1, &span));

        let plain1 = create_vnode("div", Obj::new(), Children::None);
        let plain2 = create_vnode("div", Obj::new(), Children::None);
        assert!(is_same_vnode_type(&plain1, &plain2));
        assert!(!is_same_vnode_type(&plain1, &a1));
    }

    #[test]
    fn test_key_from_value() {
        assert_eq!(Key::from_value(&Value::str("a")), Some(Key::Str("a".into())));
        assert_eq!(
            Key::from_value(&Value::num(1.0)),
            Some(Key::Num(1.0f64.to_bits()))
        );
        assert_eq!(Key::from_value(&Value::num(0.0)), None);
        assert_eq!(Key::from_value(&Value::Null), None);
        assert_eq!(Key::from_value(&Value::Obj(Obj::new())), None);
    }

    #[test]
    fn test_text_vnode() {
        let t = create_text_vnode("hello");
        assert!(matches!(t.vtype(), VNodeType::Text));
        match t.children() {
            Children::Text(s) => assert_eq!(&**s, "hello"),
            _ => panic!("expected text children"),
        }
    }
}
