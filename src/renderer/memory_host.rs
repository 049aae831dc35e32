//! In-memory host - an arena-backed node tree with an operation log.
//!
//! Every [`Host`] call is recorded, so tests can assert not just on the final
//! tree shape but on how much work the reconciler did to get there (creates,
//! moves, removals).

use indexmap::IndexMap;

use crate::value::Value;

use super::host::{Host, HostId};

/// Kind tag for an arena node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemNodeKind {
    Element(String),
    Text,
}

/// One node in the arena. Nodes are never freed; removal just detaches.
pub struct MemNode {
    pub kind: MemNodeKind,
    pub text: String,
    pub props: IndexMap<String, Value>,
    pub children: Vec<HostId>,
    pub parent: Option<HostId>,
}

/// A recorded host mutation, for asserting on reconciler work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement,
    CreateText,
    Insert,
    Remove,
    SetText,
    PatchProp,
}

/// Arena-backed [`Host`] with an op log.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<MemNode>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to render into. Not logged.
    pub fn create_root(&mut self) -> HostId {
        self.push_node(MemNode {
            kind: MemNodeKind::Element("root".to_string()),
            text: String::new(),
            props: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        })
    }

    fn push_node(&mut self, node: MemNode) -> HostId {
        let id = HostId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: HostId) -> &MemNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: HostId) -> &[HostId] {
        &self.nodes[id.0].children
    }

    pub fn text(&self, id: HostId) -> &str {
        &self.nodes[id.0].text
    }

    /// Drain the op log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// How many ops of this kind have been logged since the last drain.
    pub fn op_count(&self, op: &HostOp) -> usize {
        self.ops.iter().filter(|o| *o == op).count()
    }

    fn detach(&mut self, child: HostId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != child);
        }
    }

    /// Render the subtree under `id` as a compact string, for test asserts.
    ///
    /// Elements print as `tag(child child ...)`, text nodes as their content
    /// in quotes.
    pub fn dump(&self, id: HostId) -> String {
        let node = &self.nodes[id.0];
        match &node.kind {
            MemNodeKind::Text => format!("{:?}", node.text),
            MemNodeKind::Element(tag) => {
                if !node.text.is_empty() {
                    return format!("{tag}({:?})", node.text);
                }
                let children: Vec<String> =
                    node.children.iter().map(|c| self.dump(*c)).collect();
                format!("{tag}({})", children.join(" "))
            }
        }
    }
}

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str) -> HostId {
        self.ops.push(HostOp::CreateElement);
        self.push_node(MemNode {
            kind: MemNodeKind::Element(tag.to_string()),
            text: String::new(),
            props: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        })
    }

    fn create_text(&mut self, text: &str) -> HostId {
        self.ops.push(HostOp::CreateText);
        self.push_node(MemNode {
            kind: MemNodeKind::Text,
            text: text.to_string(),
            props: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        })
    }

    fn patch_prop(&mut self, el: HostId, key: &str, _prev: Option<&Value>, next: Option<&Value>) {
        self.ops.push(HostOp::PatchProp);
        match next {
            Some(value) => {
                self.nodes[el.0].props.insert(key.to_string(), value.clone());
            }
            None => {
                self.nodes[el.0].props.shift_remove(key);
            }
        }
    }

    fn insert(&mut self, child: HostId, parent: HostId, anchor: Option<HostId>) {
        self.ops.push(HostOp::Insert);
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = match anchor {
            Some(anchor) => children.iter().position(|c| *c == anchor),
            None => None,
        };
        match index {
            Some(index) => children.insert(index, child),
            None => children.push(child),
        }
        self.nodes[child.0].parent = Some(parent);
    }

    fn remove(&mut self, child: HostId) {
        self.ops.push(HostOp::Remove);
        self.detach(child);
    }

    fn set_text(&mut self, node: HostId, text: &str) {
        self.ops.push(HostOp::SetText);
        let node = &mut self.nodes[node.0];
        node.children.clear();
        node.text = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_before_anchor() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a");
        let b = host.create_element("b");
        let c = host.create_element("c");
        host.insert(a, root, None);
        host.insert(c, root, None);
        host.insert(b, root, Some(c));
        assert_eq!(host.children(root), &[a, b, c]);
    }

    #[test]
    fn test_reinsert_moves() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a");
        let b = host.create_element("b");
        host.insert(a, root, None);
        host.insert(b, root, None);
        // Move a behind b.
        host.insert(a, root, None);
        assert_eq!(host.children(root), &[b, a]);
        assert_eq!(host.node(a).parent, Some(root));
    }

    #[test]
    fn test_remove_detaches() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a");
        host.insert(a, root, None);
        host.remove(a);
        assert!(host.children(root).is_empty());
        assert_eq!(host.node(a).parent, None);
    }

    #[test]
    fn test_set_text_clears_children() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a");
        host.insert(a, root, None);
        host.set_text(root, "hello");
        assert!(host.children(root).is_empty());
        assert_eq!(host.text(root), "hello");
        assert_eq!(host.dump(root), "root(\"hello\")");
    }

    #[test]
    fn test_op_log() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let a = host.create_element("a");
        host.insert(a, root, None);
        host.patch_prop(a, "id", None, Some(&Value::str("x")));
        assert_eq!(host.op_count(&HostOp::CreateElement), 1);
        assert_eq!(host.op_count(&HostOp::Insert), 1);
        assert_eq!(host.op_count(&HostOp::PatchProp), 1);
        let ops = host.take_ops();
        assert_eq!(
            ops,
            vec![HostOp::CreateElement, HostOp::Insert, HostOp::PatchProp]
        );
        assert_eq!(host.op_count(&HostOp::Insert), 0);
    }
}
