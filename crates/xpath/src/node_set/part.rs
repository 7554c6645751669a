//! One document's slice of a [`NodeSet`](super::NodeSet).

use xstep_core::{ChildRange, DocumentRef, NodeId, NodeKind};

use super::{NodeSet, Relation, SiblingDirection};
use crate::node_proxy::NodeProxy;

/// Growable array of node references belonging to exactly one document.
///
/// Entries are unsorted until [`Part::sort_by_id`] or
/// [`Part::sort_in_document_order`] runs; lookups assume identifier order.
#[derive(Clone, Debug)]
pub struct Part {
    doc: DocumentRef,
    nodes: Vec<NodeProxy>,
}

impl Part {
    pub fn new(doc: DocumentRef, capacity: usize) -> Self {
        Self { doc, nodes: Vec::with_capacity(capacity) }
    }

    pub fn doc(&self) -> &DocumentRef {
        &self.doc
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeProxy] {
        &self.nodes
    }

    /// Appends `node` unless it repeats the last inserted identifier, in
    /// which case the contexts are merged. Returns `true` if appended.
    pub fn add(&mut self, node: NodeProxy) -> bool {
        if let Some(last) = self.nodes.last_mut()
            && last.id() == node.id()
        {
            last.merge_context(&node);
            return false;
        }
        self.nodes.push(node);
        true
    }

    pub fn sort_by_id(&mut self) {
        self.nodes.sort_by_key(NodeProxy::id);
    }

    pub fn sort_in_document_order(&mut self) {
        let doc = &self.doc;
        self.nodes.sort_by(|a, b| doc.compare_document_order(a.id(), b.id()));
    }

    /// Collapses runs of equal identifiers left by a preceding sort and
    /// returns the new length. Collapsed entries donate their context.
    pub fn remove_duplicates(&mut self) -> usize {
        self.nodes.dedup_by(|next, kept| {
            if next.id() == kept.id() {
                kept.merge_context(next);
                true
            } else {
                false
            }
        });
        self.nodes.len()
    }

    fn position(&self, id: NodeId) -> Result<usize, usize> {
        self.nodes.binary_search_by_key(&id, NodeProxy::id)
    }

    pub fn find(&self, id: NodeId) -> Option<&NodeProxy> {
        self.position(id).ok().map(|idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.position(id).is_ok()
    }

    /// Removes the entry for `id`; no-op if absent.
    pub fn remove(&mut self, id: NodeId) -> bool {
        match self.position(id) {
            Ok(idx) => {
                self.nodes.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Entries with identifiers in `[lower, upper]`.
    pub fn range(&self, lower: NodeId, upper: NodeId) -> &[NodeProxy] {
        if lower > upper {
            return &[];
        }
        let from = self.nodes.partition_point(|n| n.id() < lower);
        let to = self.nodes.partition_point(|n| n.id() <= upper);
        &self.nodes[from..to]
    }

    fn child_window(&self, range: ChildRange) -> &[NodeProxy] {
        self.range(range.start, range.end)
    }

    /// Entries that are children of `parent` (attributes included).
    pub fn children_of(&self, parent: NodeId) -> &[NodeProxy] {
        match self.doc.child_range(parent) {
            Some(range) => self.child_window(range),
            None => &[],
        }
    }

    /// Adds to `out` the entries that are children of `parent`.
    ///
    /// With [`Relation::Descendant`] the children are added and `parent`
    /// becomes their context. With [`Relation::Ancestor`] `parent` itself is
    /// added once per child found, with that child as context.
    pub fn children_in_set(&self, parent: &NodeProxy, relation: Relation, remember: bool, out: &mut NodeSet) {
        let Some(range) = self.doc.child_range(parent.id()) else {
            return;
        };
        for child in self.child_window(range) {
            match relation {
                Relation::Descendant => {
                    let mut node = child.clone();
                    attach_context(&mut node, parent, remember);
                    out.add_with_hint(node, range.distance);
                }
                Relation::Ancestor => {
                    let mut node = parent.clone();
                    attach_context(&mut node, child, remember);
                    out.add_with_hint(node, 1);
                }
            }
        }
    }

    /// Walks from `id` towards the root and returns the first entry found.
    ///
    /// `level` is the tree level of `id`, computed when `None`. With
    /// `direct_only` only the parent is inspected.
    pub fn parent_with_child(
        &self,
        id: NodeId,
        direct_only: bool,
        include_self: bool,
        level: Option<u32>,
    ) -> Option<&NodeProxy> {
        if include_self && let Some(found) = self.find(id) {
            return Some(found);
        }
        let mut level = level.unwrap_or_else(|| self.doc.level_of(id));
        let mut current = id;
        while level > 0 {
            current = self.doc.parent_id(current, level);
            level -= 1;
            if current.is_none() {
                break;
            }
            if let Some(found) = self.find(current) {
                return Some(found);
            }
            if direct_only {
                break;
            }
        }
        None
    }

    /// Every entry on the ancestor chain of `id`, nearest first.
    pub fn ancestors_of(&self, id: NodeId, include_self: bool) -> Vec<&NodeProxy> {
        let mut found = Vec::new();
        if include_self && let Some(node) = self.find(id) {
            found.push(node);
        }
        let mut level = self.doc.level_of(id);
        let mut current = id;
        while level > 0 {
            current = self.doc.parent_id(current, level);
            level -= 1;
            if let Some(node) = self.find(current) {
                found.push(node);
            }
        }
        found
    }

    /// Entries below `ancestor`, gathered level by level.
    ///
    /// Descendants of one node occupy a contiguous identifier block on every
    /// level, so each level costs one range lookup.
    pub fn descendants_of(&self, ancestor: NodeId, include_self: bool) -> Vec<&NodeProxy> {
        let mut found = Vec::new();
        if include_self && let Some(node) = self.find(ancestor) {
            found.push(node);
        }
        let Some(max) = self.nodes.last().map(NodeProxy::id) else {
            return found;
        };
        let (mut lower, mut upper) = (ancestor, ancestor);
        loop {
            let (Some(first), Some(last)) = (self.doc.child_range(lower), self.doc.child_range(upper)) else {
                break;
            };
            if first.start > max {
                break;
            }
            found.extend(self.range(first.start, last.end));
            lower = first.start;
            upper = last.end;
        }
        found
    }

    pub fn has_descendant(&self, ancestor: NodeId) -> bool {
        let Some(max) = self.nodes.last().map(NodeProxy::id) else {
            return false;
        };
        let (mut lower, mut upper) = (ancestor, ancestor);
        while let (Some(first), Some(last)) = (self.doc.child_range(lower), self.doc.child_range(upper)) {
            if first.start > max {
                return false;
            }
            if !self.range(first.start, last.end).is_empty() {
                return true;
            }
            lower = first.start;
            upper = last.end;
        }
        false
    }

    /// Non-attribute entries sharing a parent with `node` on the given side.
    pub fn siblings_of(&self, node: &NodeProxy, direction: SiblingDirection) -> impl Iterator<Item = &NodeProxy> {
        let parent = node.parent_id();
        let window = if parent.is_none() || node.kind() == NodeKind::Attribute { &[][..] } else { self.children_of(parent) };
        let pivot = node.id();
        window.iter().filter(move |candidate| {
            candidate.kind() != NodeKind::Attribute
                && match direction {
                    SiblingDirection::Following => candidate.id() > pivot,
                    SiblingDirection::Preceding => candidate.id() < pivot,
                }
        })
    }

    pub fn set_self_as_context(&mut self) {
        for node in &mut self.nodes {
            let me = node.as_context();
            node.add_context_node(me);
        }
    }
}

/// Records `anchor` on `node`: as an additional context node when
/// remembering, otherwise by inheriting the anchor's own context.
pub(crate) fn attach_context(node: &mut NodeProxy, anchor: &NodeProxy, remember: bool) {
    if remember {
        node.add_context_node(anchor.as_context());
    } else {
        node.copy_context(anchor);
    }
}
