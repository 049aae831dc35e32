//! Tree reconciler - mounts and patches vnode trees against a [`Host`].
//!
//! # Update paths
//!
//! Two paths lead into a component re-render. A parent-driven update arrives
//! through [`RendererInner::patch`] on the call stack; a reactive update
//! arrives through the job queue, where the component's scheduler enqueued a
//! job holding a weak handle back to the renderer. The render effect itself
//! only produces the next subtree (tracked); patching happens outside the
//! tracked section, so host mutations never register as dependencies.
//!
//! # Keyed diff
//!
//! `patch_keyed_children` narrows the changed window with prefix and suffix
//! scans, handles pure insertions and removals directly, and reconciles the
//! remaining middle window with a key-to-index map plus a longest increasing
//! subsequence over old positions, so only nodes outside a stable backbone
//! get moved.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::reactivity::{effect_with_options, shallow_readonly, EffectOptions};
use crate::scheduler::{queue_job, Job};
use crate::value::{has_changed, Obj, Value};

use super::component::{should_update_component, ComponentInstance};
use super::host::{Host, HostId};
use super::vnode::{is_same_vnode_type, Children, Key, VNode, VNodeType};

// =============================================================================
// Renderer
// =============================================================================

/// Shared handle to a renderer over host `H`.
pub struct Renderer<H: Host + 'static> {
    inner: Rc<RefCell<RendererInner<H>>>,
}

struct RendererInner<H: Host + 'static> {
    host: H,
    /// Weak self-handle, captured by component update jobs so they can
    /// re-enter the renderer from the job queue.
    self_ref: Weak<RefCell<RendererInner<H>>>,
}

impl<H: Host + 'static> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: Host + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            RefCell::new(RendererInner {
                host,
                self_ref: weak.clone(),
            })
        });
        Self { inner }
    }

    /// Mount `vnode` into `container`.
    pub fn render(&self, vnode: &VNode, container: HostId) {
        self.inner.borrow_mut().patch(None, vnode, container, None);
    }

    /// Patch `container` from the previously rendered `n1` to `n2`.
    pub fn patch(&self, n1: Option<&VNode>, n2: &VNode, container: HostId) {
        self.inner.borrow_mut().patch(n1, n2, container, None);
    }

    /// Unmount a previously rendered tree.
    pub fn unmount(&self, vnode: &VNode) {
        self.inner.borrow_mut().unmount(vnode);
    }

    /// Inspect the host.
    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.inner.borrow().host)
    }

    /// Mutate the host directly (mostly for test setup).
    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.borrow_mut().host)
    }
}

// =============================================================================
// Patch dispatch
// =============================================================================

impl<H: Host + 'static> RendererInner<H> {
    /// Reconcile one node position. `n1` is the previously rendered node (or
    /// `None` on mount); a type/key mismatch unmounts the old node and
    /// mounts the new one fresh.
    fn patch(&mut self, n1: Option<&VNode>, n2: &VNode, container: HostId, anchor: Option<HostId>) {
        let n1 = match n1 {
            Some(prev) if !is_same_vnode_type(prev, n2) => {
                self.unmount(prev);
                None
            }
            other => other,
        };
        match n2.vtype() {
            VNodeType::Text => self.process_text(n1, n2, container, anchor),
            VNodeType::Fragment => self.process_fragment(n1, n2, container, anchor),
            VNodeType::Element(_) => self.process_element(n1, n2, container, anchor),
            VNodeType::Component(_) => self.process_component(n1, n2, container, anchor),
        }
    }

    fn unmount(&mut self, vnode: &VNode) {
        match vnode.vtype() {
            VNodeType::Element(_) | VNodeType::Text => {
                if let Some(el) = vnode.el() {
                    self.host.remove(el);
                }
            }
            VNodeType::Fragment => {
                if let Children::Array(children) = vnode.children() {
                    for child in children {
                        self.unmount(child);
                    }
                }
            }
            VNodeType::Component(_) => {
                if let Some(instance) = vnode.component() {
                    if let Some(runner) = instance.update.borrow().as_ref() {
                        runner.stop();
                    }
                    let sub_tree = instance.sub_tree.borrow_mut().take();
                    if let Some(sub_tree) = sub_tree {
                        self.unmount(&sub_tree);
                    }
                }
            }
        }
    }

    // =========================================================================
    // Text + fragment
    // =========================================================================

    fn process_text(
        &mut self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostId,
        anchor: Option<HostId>,
    ) {
        let text = match n2.children() {
            Children::Text(text) => text.clone(),
            _ => Rc::from(""),
        };
        match n1 {
            None => {
                let el = self.host.create_text(&text);
                n2.set_el(Some(el));
                self.host.insert(el, container, anchor);
            }
            Some(prev) => {
                // Carry the host node over; rewrite only when the literal
                // actually changed.
                n2.set_el(prev.el());
                let prev_text = match prev.children() {
                    Children::Text(text) => text.clone(),
                    _ => Rc::from(""),
                };
                if prev_text != text {
                    if let Some(el) = n2.el() {
                        self.host.set_text(el, &text);
                    }
                }
            }
        }
    }

    fn process_fragment(
        &mut self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostId,
        anchor: Option<HostId>,
    ) {
        match n1 {
            None => {
                if let Children::Array(children) = n2.children() {
                    for child in children {
                        self.patch(None, child, container, anchor);
                    }
                }
            }
            Some(prev) => self.patch_children(prev, n2, container, anchor),
        }
    }

    // =========================================================================
    // Elements
    // =========================================================================

    fn process_element(
        &mut self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostId,
        anchor: Option<HostId>,
    ) {
        match n1 {
            None => self.mount_element(n2, container, anchor),
            Some(prev) => self.patch_element(prev, n2),
        }
    }

    fn mount_element(&mut self, vnode: &VNode, container: HostId, anchor: Option<HostId>) {
        let tag = match vnode.vtype() {
            VNodeType::Element(tag) => tag.clone(),
            _ => return,
        };
        let el = self.host.create_element(&tag);
        vnode.set_el(Some(el));

        // The diff key is metadata, not a host prop.
        for (key, value) in vnode.props().entries() {
            if key == "key" {
                continue;
            }
            self.host.patch_prop(el, &key, None, Some(&value));
        }

        match vnode.children() {
            Children::None => {}
            Children::Text(text) => self.host.set_text(el, text),
            Children::Array(children) => {
                for child in children {
                    self.patch(None, child, el, None);
                }
            }
        }

        self.host.insert(el, container, anchor);
    }

    fn patch_element(&mut self, n1: &VNode, n2: &VNode) {
        n2.set_el(n1.el());
        let Some(el) = n2.el() else { return };
        self.patch_children(n1, n2, el, None);
        self.patch_props(el, n1.props(), n2.props());
    }

    fn patch_props(&mut self, el: HostId, old_props: &Obj, new_props: &Obj) {
        if old_props.ptr_eq(new_props) {
            return;
        }
        for (key, next) in new_props.entries() {
            if key == "key" {
                continue;
            }
            let prev = old_props.get(&key);
            let changed = match &prev {
                Some(prev) => has_changed(&next, prev),
                None => true,
            };
            if changed {
                self.host.patch_prop(el, &key, prev.as_ref(), Some(&next));
            }
        }
        for (key, prev) in old_props.entries() {
            if key == "key" {
                continue;
            }
            if !new_props.contains_key(&key) {
                self.host.patch_prop(el, &key, Some(&prev), None);
            }
        }
    }

    // =========================================================================
    // Children
    // =========================================================================

    fn patch_children(&mut self, n1: &VNode, n2: &VNode, container: HostId, anchor: Option<HostId>) {
        match (n1.children(), n2.children()) {
            // Going to a text child: tear down element children, then write
            // the literal once (skip the write when it already matches).
            (prev, Children::Text(next_text)) => {
                let mut changed = true;
                match prev {
                    Children::Array(prev_children) => {
                        for child in prev_children {
                            self.unmount(child);
                        }
                    }
                    Children::Text(prev_text) => changed = prev_text != next_text,
                    Children::None => {}
                }
                if changed {
                    self.host.set_text(container, next_text);
                }
            }
            (Children::Text(_), Children::Array(next_children)) => {
                self.host.set_text(container, "");
                let next_children = next_children.clone();
                for child in &next_children {
                    self.patch(None, child, container, anchor);
                }
            }
            (Children::None, Children::Array(next_children)) => {
                let next_children = next_children.clone();
                for child in &next_children {
                    self.patch(None, child, container, anchor);
                }
            }
            (Children::Array(prev_children), Children::Array(next_children)) => {
                let prev_children = prev_children.clone();
                let next_children = next_children.clone();
                self.patch_keyed_children(&prev_children, &next_children, container, anchor);
            }
            (Children::Array(prev_children), Children::None) => {
                let prev_children = prev_children.clone();
                for child in &prev_children {
                    self.unmount(child);
                }
            }
            (Children::Text(_), Children::None) => self.host.set_text(container, ""),
            (Children::None, Children::None) => {}
        }
    }

    /// Keyed list diff. See the module docs for the phase breakdown.
    fn patch_keyed_children(
        &mut self,
        c1: &[VNode],
        c2: &[VNode],
        container: HostId,
        parent_anchor: Option<HostId>,
    ) {
        let mut i: usize = 0;
        let mut e1: isize = c1.len() as isize - 1;
        let mut e2: isize = c2.len() as isize - 1;

        // Phase 1: common prefix.
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let n1 = &c1[i];
            let n2 = &c2[i];
            if !is_same_vnode_type(n1, n2) {
                break;
            }
            self.patch(Some(n1), n2, container, parent_anchor);
            i += 1;
        }

        // Phase 2: common suffix.
        while (i as isize) <= e1 && (i as isize) <= e2 {
            let n1 = &c1[e1 as usize];
            let n2 = &c2[e2 as usize];
            if !is_same_vnode_type(n1, n2) {
                break;
            }
            self.patch(Some(n1), n2, container, parent_anchor);
            e1 -= 1;
            e2 -= 1;
        }

        if (i as isize) > e1 {
            // Phase 3a: only insertions remain. New nodes go before the first
            // suffix node, or at the parent anchor when there is no suffix.
            if (i as isize) <= e2 {
                let next_pos = (e2 + 1) as usize;
                let anchor = if next_pos < c2.len() {
                    c2[next_pos].el()
                } else {
                    parent_anchor
                };
                for idx in i..=(e2 as usize) {
                    self.patch(None, &c2[idx], container, anchor);
                }
            }
        } else if (i as isize) > e2 {
            // Phase 3b: only removals remain.
            for idx in i..=(e1 as usize) {
                self.unmount(&c1[idx]);
            }
        } else {
            // Phase 4: mixed middle window.
            let s1 = i;
            let s2 = i;
            let to_be_patched = (e2 as usize) - s2 + 1;
            let mut patched = 0usize;

            let mut key_to_new_index: HashMap<Key, usize> = HashMap::new();
            for idx in s2..=(e2 as usize) {
                if let Some(key) = c2[idx].key().and_then(Key::from_value) {
                    key_to_new_index.insert(key, idx);
                }
            }

            // For each new-window slot: the old index + 1, or 0 for a node
            // that must be freshly mounted.
            let mut new_index_to_old_index = vec![0usize; to_be_patched];
            let mut moved = false;
            let mut max_new_index_so_far = 0usize;

            for idx in s1..=(e1 as usize) {
                let prev_child = &c1[idx];
                if patched >= to_be_patched {
                    // Every new slot is filled; the rest of the old window
                    // is garbage.
                    self.unmount(prev_child);
                    continue;
                }
                let new_index = match prev_child.key().and_then(Key::from_value) {
                    // A reused key on a different kind is a replacement, not
                    // a match: drop the old node here and leave the slot at 0
                    // so the reverse walk mounts the new one at its anchor.
                    Some(key) => key_to_new_index
                        .get(&key)
                        .copied()
                        .filter(|&j| is_same_vnode_type(prev_child, &c2[j])),
                    None => {
                        // Keyless: first unclaimed same-type slot.
                        let mut found = None;
                        for j in s2..=(e2 as usize) {
                            if new_index_to_old_index[j - s2] == 0
                                && is_same_vnode_type(prev_child, &c2[j])
                            {
                                found = Some(j);
                                break;
                            }
                        }
                        found
                    }
                };
                match new_index {
                    None => self.unmount(prev_child),
                    Some(new_index) => {
                        if new_index >= max_new_index_so_far {
                            max_new_index_so_far = new_index;
                        } else {
                            moved = true;
                        }
                        new_index_to_old_index[new_index - s2] = idx + 1;
                        self.patch(Some(prev_child), &c2[new_index], container, None);
                        patched += 1;
                    }
                }
            }

            // Stable backbone: old positions already in increasing order
            // need no move.
            let stable = if moved {
                longest_increasing_subsequence(&new_index_to_old_index)
            } else {
                Vec::new()
            };
            let mut sp: isize = stable.len() as isize - 1;

            // Walk right to left so the node to the right is always placed
            // and usable as an anchor.
            for offset in (0..to_be_patched).rev() {
                let next_index = s2 + offset;
                let next_child = &c2[next_index];
                let anchor = if next_index + 1 < c2.len() {
                    c2[next_index + 1].el()
                } else {
                    parent_anchor
                };
                if new_index_to_old_index[offset] == 0 {
                    self.patch(None, next_child, container, anchor);
                } else if moved {
                    if sp < 0 || stable[sp as usize] != offset {
                        if let Some(el) = next_child.el() {
                            self.host.insert(el, container, anchor);
                        }
                    } else {
                        sp -= 1;
                    }
                }
            }
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    fn process_component(
        &mut self,
        n1: Option<&VNode>,
        n2: &VNode,
        container: HostId,
        anchor: Option<HostId>,
    ) {
        match n1 {
            None => self.mount_component(n2, container, anchor),
            Some(prev) => self.update_component(prev, n2),
        }
    }

    fn mount_component(&mut self, vnode: &VNode, container: HostId, anchor: Option<HostId>) {
        let def = match vnode.vtype() {
            VNodeType::Component(def) => def.clone(),
            _ => return,
        };
        let props_view = shallow_readonly(Value::Obj(vnode.props().clone()));
        let instance = Rc::new(ComponentInstance::new(
            def.clone(),
            props_view,
            vnode.clone(),
            container,
            anchor,
        ));
        vnode.set_component(instance.clone());

        // The tracked section only renders; the patch below runs untracked,
        // so host mutations never become dependencies.
        let render_instance = instance.clone();
        let sched_instance = instance.clone();
        let renderer = self.self_ref.clone();
        let runner = effect_with_options(
            move || {
                let props = render_instance.props.borrow().clone();
                let tree = render_instance.def.render(&props);
                *render_instance.next_tree.borrow_mut() = Some(tree);
            },
            EffectOptions {
                scheduler: Some(Rc::new(move || {
                    let renderer = renderer.clone();
                    let instance = sched_instance.clone();
                    queue_job(Job::new(instance.uid, move || {
                        if let Some(renderer) = renderer.upgrade() {
                            renderer.borrow_mut().run_component_update(&instance);
                        }
                    }));
                })),
                ..Default::default()
            },
        );
        *instance.update.borrow_mut() = Some(runner);

        self.finish_component_render(&instance);
    }

    fn update_component(&mut self, n1: &VNode, n2: &VNode) {
        let Some(instance) = n1.component() else { return };
        n2.set_component(instance.clone());
        if should_update_component(n1, n2) {
            *instance.next.borrow_mut() = Some(n2.clone());
            self.run_component_update(&instance);
        } else {
            // Nothing the component reads changed; adopt the new vnode as-is.
            n2.set_el(n1.el());
            *instance.vnode.borrow_mut() = n2.clone();
        }
    }

    /// Re-render an instance: swap in a pending parent-provided vnode if one
    /// is waiting, re-run the render effect, then patch the subtree.
    fn run_component_update(&mut self, instance: &Rc<ComponentInstance>) {
        let pending = instance.next.borrow_mut().take();
        if let Some(next_vnode) = pending {
            let prev_el = instance.vnode.borrow().el();
            next_vnode.set_el(prev_el);
            *instance.props.borrow_mut() =
                shallow_readonly(Value::Obj(next_vnode.props().clone()));
            *instance.vnode.borrow_mut() = next_vnode;
        }
        let runner = instance.update.borrow().clone();
        if let Some(runner) = runner {
            runner.run();
        }
        self.finish_component_render(instance);
    }

    /// Take the subtree the render effect produced and patch it into the
    /// host. First render mounts, later renders diff against the previous
    /// subtree.
    fn finish_component_render(&mut self, instance: &Rc<ComponentInstance>) {
        let tree = instance.next_tree.borrow_mut().take();
        let Some(tree) = tree else { return };
        if !instance.mounted.get() {
            self.patch(None, &tree, instance.container.get(), instance.anchor.get());
            instance.mounted.set(true);
        } else {
            let prev = instance.sub_tree.borrow_mut().take();
            self.patch(
                prev.as_ref(),
                &tree,
                instance.container.get(),
                instance.anchor.get(),
            );
        }
        instance.vnode.borrow().set_el(tree.el());
        *instance.sub_tree.borrow_mut() = Some(tree);
    }
}

// =============================================================================
// Longest increasing subsequence
// =============================================================================

/// Positions (indices into `arr`) of a longest strictly increasing
/// subsequence over the nonzero entries of `arr`.
///
/// Zero marks "no old position" in the diff and is skipped entirely.
/// Patience-style tails with predecessor links, O(n log n).
pub fn longest_increasing_subsequence(arr: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; arr.len()];

    for (i, &v) in arr.iter().enumerate() {
        if v == 0 {
            continue;
        }
        if let Some(&last) = tails.last() {
            if arr[last] < v {
                prev[i] = Some(last);
                tails.push(i);
                continue;
            }
        }
        // First tail whose value is >= v.
        let (mut lo, mut hi) = (0usize, tails.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if arr[tails[mid]] < v {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo > 0 {
            prev[i] = Some(tails[lo - 1]);
        }
        if lo == tails.len() {
            tails.push(i);
        } else if arr[tails[lo]] != v {
            tails[lo] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        result.push(idx);
        cursor = prev[idx];
    }
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::memory_host::{HostOp, MemoryHost};
    use crate::renderer::vnode::{create_text_vnode, create_vnode};

    fn lis_values(arr: &[usize]) -> Vec<usize> {
        longest_increasing_subsequence(arr)
            .into_iter()
            .map(|i| arr[i])
            .collect()
    }

    #[test]
    fn test_lis_basic() {
        assert_eq!(lis_values(&[2, 1, 5, 3, 6, 4, 8, 9, 7]), vec![1, 3, 4, 8, 9]);
        assert_eq!(lis_values(&[1, 2, 3]), vec![1, 2, 3]);
        assert_eq!(lis_values(&[3, 2, 1]), vec![1]);
        assert_eq!(lis_values(&[]), Vec::<usize>::new());
    }

    #[test]
    fn test_lis_skips_zero_sentinels() {
        // Zeros mark fresh mounts and must never join the backbone.
        assert_eq!(lis_values(&[0, 0, 0]), Vec::<usize>::new());
        assert_eq!(lis_values(&[4, 0, 5, 0, 6]), vec![4, 5, 6]);

        // Two maximal answers exist ([2,3] and [1,3]); the tails scheme
        // settles on the one ending in the smallest tail values.
        let values = lis_values(&[0, 2, 0, 1, 3]);
        assert_eq!(values, vec![1, 3]);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_lis_returns_positions() {
        let arr = [5, 0, 3, 4];
        assert_eq!(longest_increasing_subsequence(&arr), vec![2, 3]);
    }

    #[test]
    fn test_mount_element_with_props_and_text() {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.with_host_mut(|h| h.create_root());
        let vnode = create_vnode(
            "div",
            Obj::new().with("id", Value::str("app")),
            Children::Text("hello".into()),
        );
        renderer.render(&vnode, root);

        renderer.with_host(|h| {
            assert_eq!(h.children(root).len(), 1);
            let el = h.children(root)[0];
            assert_eq!(h.text(el), "hello");
            assert_eq!(
                h.node(el).props.get("id").and_then(|v| v.as_str()),
                Some("app")
            );
        });
        assert_eq!(vnode.el(), Some(renderer.with_host(|h| h.children(root)[0])));
    }

    #[test]
    fn test_patch_text_rewrites_in_place() {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.with_host_mut(|h| h.create_root());
        let t1 = create_text_vnode("one");
        renderer.render(&t1, root);
        renderer.with_host_mut(|h| {
            h.take_ops();
        });

        let t2 = create_text_vnode("two");
        renderer.patch(Some(&t1), &t2, root);
        renderer.with_host(|h| {
            assert_eq!(h.op_count(&HostOp::CreateText), 0);
            assert_eq!(h.op_count(&HostOp::SetText), 1);
        });
        assert_eq!(t2.el(), t1.el());

        // Same literal: no host write at all.
        renderer.with_host_mut(|h| {
            h.take_ops();
        });
        let t3 = create_text_vnode("two");
        renderer.patch(Some(&t2), &t3, root);
        renderer.with_host(|h| assert_eq!(h.op_count(&HostOp::SetText), 0));
    }

    #[test]
    fn test_patch_props_add_change_remove() {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.with_host_mut(|h| h.create_root());
        let v1 = create_vnode(
            "div",
            Obj::new()
                .with("a", Value::str("1"))
                .with("b", Value::str("2")),
            Children::None,
        );
        renderer.render(&v1, root);
        let el = v1.el().unwrap();

        let v2 = create_vnode(
            "div",
            Obj::new()
                .with("a", Value::str("1"))
                .with("c", Value::str("3")),
            Children::None,
        );
        renderer.patch(Some(&v1), &v2, root);
        renderer.with_host(|h| {
            let props = &h.node(el).props;
            assert_eq!(props.get("a").and_then(|v| v.as_str()), Some("1"));
            assert!(!props.contains_key("b"));
            assert_eq!(props.get("c").and_then(|v| v.as_str()), Some("3"));
        });
    }

    #[test]
    fn test_type_mismatch_replaces_node() {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.with_host_mut(|h| h.create_root());
        let v1 = create_vnode("div", Obj::new(), Children::None);
        renderer.render(&v1, root);

        let v2 = create_vnode("span", Obj::new(), Children::None);
        renderer.patch(Some(&v1), &v2, root);
        renderer.with_host(|h| {
            assert_eq!(h.children(root).len(), 1);
            let el = h.children(root)[0];
            assert_eq!(
                h.node(el).kind,
                crate::renderer::memory_host::MemNodeKind::Element("span".to_string())
            );
        });
    }
}
