//! Lightweight reference to one stored node.

use core::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;
use xstep_core::{DocumentId, DocumentRef, NodeId, NodeKind};

/// Opaque physical location of a node in storage. Only a fast-path hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StorageAddress(pub u64);

impl StorageAddress {
    pub const UNKNOWN: StorageAddress = StorageAddress(u64::MAX);
}

/// Upstream node that produced a result node. Needed by positional predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextNode {
    pub document: DocumentId,
    pub id: NodeId,
}

impl ContextNode {
    pub fn new(document: DocumentId, id: NodeId) -> Self {
        Self { document, id }
    }
}

pub type ContextList = SmallVec<[ContextNode; 2]>;

/// Names one node: document, identifier, cached kind, optional storage
/// address and the list of context nodes it was reached from.
///
/// Two proxies are equal when they name the same node; kind, address and
/// context are annotations.
#[derive(Clone)]
pub struct NodeProxy {
    doc: DocumentRef,
    id: NodeId,
    kind: NodeKind,
    address: StorageAddress,
    context: ContextList,
}

impl NodeProxy {
    pub fn new(doc: DocumentRef, id: NodeId, kind: NodeKind) -> Self {
        Self { doc, id, kind, address: StorageAddress::UNKNOWN, context: ContextList::new() }
    }

    pub fn element(doc: DocumentRef, id: NodeId) -> Self {
        Self::new(doc, id, NodeKind::Element)
    }

    pub fn with_address(mut self, address: StorageAddress) -> Self {
        self.address = address;
        self
    }

    pub fn doc(&self) -> &DocumentRef {
        &self.doc
    }

    pub fn document_id(&self) -> DocumentId {
        self.doc.id()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn address(&self) -> StorageAddress {
        self.address
    }

    pub fn level(&self) -> u32 {
        self.doc.level_of(self.id)
    }

    /// Identifier of the parent node, [`NodeId::NONE`] for the root element.
    pub fn parent_id(&self) -> NodeId {
        self.doc.parent_of(self.id)
    }

    pub fn as_context(&self) -> ContextNode {
        ContextNode::new(self.doc.id(), self.id)
    }

    pub fn context(&self) -> &[ContextNode] {
        &self.context
    }

    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }

    /// Appends a context node unless it repeats the last one.
    pub fn add_context_node(&mut self, node: ContextNode) {
        if self.context.last() != Some(&node) {
            self.context.push(node);
        }
    }

    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    /// Replaces this node's context list with a copy of `other`'s.
    pub fn copy_context(&mut self, other: &NodeProxy) {
        self.context.clone_from(&other.context);
    }

    /// Adds every context node of `other` not already present.
    pub fn merge_context(&mut self, other: &NodeProxy) {
        for node in &other.context {
            if !self.context.contains(node) {
                self.context.push(*node);
            }
        }
    }

    /// Document order among nodes of possibly different documents; documents
    /// are ordered by identifier.
    pub fn compare_document_order(&self, other: &NodeProxy) -> Ordering {
        match self.doc.id().cmp(&other.doc.id()) {
            Ordering::Equal => self.doc.compare_document_order(self.id, other.id),
            unequal => unequal,
        }
    }

    /// Iterates this node as a one-item sequence.
    pub fn iterate(&self) -> SingleNodeIter {
        SingleNodeIter { node: Some(self.clone()) }
    }
}

impl PartialEq for NodeProxy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.doc.id() == other.doc.id()
    }
}

impl Eq for NodeProxy {}

impl fmt::Debug for NodeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeProxy")
            .field("doc", &self.doc.id())
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("context", &self.context.as_slice())
            .finish()
    }
}

impl fmt::Display for NodeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.doc.id(), self.id)
    }
}

/// Iterator over exactly one node, with cheap skipping.
#[derive(Debug, Clone)]
pub struct SingleNodeIter {
    node: Option<NodeProxy>,
}

impl SingleNodeIter {
    /// Number of items that can still be skipped.
    pub fn skippable(&self) -> usize {
        usize::from(self.node.is_some())
    }

    /// Skips up to `n` items and returns how many were actually skipped.
    pub fn skip_items(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        usize::from(self.node.take().is_some())
    }
}

impl Iterator for SingleNodeIter {
    type Item = NodeProxy;

    fn next(&mut self) -> Option<NodeProxy> {
        self.node.take()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.skippable();
        (n, Some(n))
    }
}

impl ExactSizeIterator for SingleNodeIter {}

impl From<&NodeProxy> for ContextNode {
    fn from(node: &NodeProxy) -> Self {
        node.as_context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use xstep_core::{Document, LevelOrderAddressing};

    #[fixture]
    fn doc() -> DocumentRef {
        Document::new(DocumentId(1), "/db/a.xml", Arc::new(LevelOrderAddressing::new(&[2, 2]).unwrap()))
    }

    #[rstest]
    fn single_item_iteration(doc: DocumentRef) {
        let node = NodeProxy::element(doc, NodeId(2));
        let mut it = node.iterate();
        assert_eq!(it.skippable(), 1);
        assert_eq!(it.next(), Some(node));
        assert_eq!(it.skippable(), 0);
        assert_eq!(it.skip_items(10), 0);
        assert!(it.next().is_none());
    }

    #[rstest]
    fn skip_past_end_skips_only_what_remains(doc: DocumentRef) {
        let mut it = NodeProxy::element(doc, NodeId(2)).iterate();
        assert_eq!(it.skip_items(10), 1);
        assert_eq!(it.skippable(), 0);
        assert_eq!(it.count(), 0);
    }

    #[rstest]
    fn skip_zero_keeps_item(doc: DocumentRef) {
        let mut it = NodeProxy::element(doc, NodeId(2)).iterate();
        assert_eq!(it.skip_items(0), 0);
        assert_eq!(it.count(), 1);
    }

    #[rstest]
    fn context_bookkeeping(doc: DocumentRef) {
        let mut a = NodeProxy::element(doc.clone(), NodeId(4));
        let c1 = ContextNode::new(DocumentId(1), NodeId(2));
        let c2 = ContextNode::new(DocumentId(1), NodeId(1));
        a.add_context_node(c1);
        a.add_context_node(c1);
        assert_eq!(a.context(), &[c1]);

        let mut b = NodeProxy::element(doc, NodeId(4));
        b.add_context_node(c2);
        b.add_context_node(c1);
        a.merge_context(&b);
        assert_eq!(a.context(), &[c1, c2]);

        b.clear_context();
        b.copy_context(&a);
        assert_eq!(b.context(), a.context());
        assert_eq!(a, b);
    }

    #[rstest]
    fn document_order_across_documents(doc: DocumentRef) {
        let other = Document::new(DocumentId(2), "/db/b.xml", Arc::clone(doc.addressing()));
        let a = NodeProxy::element(doc.clone(), NodeId(7));
        let b = NodeProxy::element(other, NodeId(1));
        assert_eq!(a.compare_document_order(&b), Ordering::Less);
        let deep = NodeProxy::element(doc.clone(), NodeId(5));
        assert_eq!(deep.compare_document_order(&NodeProxy::element(doc, NodeId(3))), Ordering::Less);
    }
}
