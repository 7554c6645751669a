//! Lazily enumerated wildcard step results.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use xstep_core::{DocumentSet, NodeId, NodeKind};

use crate::axis::Axis;
use crate::node_proxy::NodeProxy;
use crate::node_set::{NodeSet, attach_context};
use crate::node_test::NodeTest;
use crate::storage::NodeSource;

/// Result of a wildcard step that has not been materialised.
///
/// Holds the context set and walks storage on demand. Supported axes are
/// child, attribute, descendant, descendant-or-self, descendant-attribute
/// and self. Iteration is restartable and yields each node once, in
/// document order per context root.
#[derive(Clone)]
pub struct VirtualNodeSet {
    axis: Axis,
    test: NodeTest,
    context: NodeSet,
    roots: Vec<NodeProxy>,
    remember_context: bool,
    source: Arc<dyn NodeSource>,
}

fn spans_subtree(axis: Axis) -> bool {
    matches!(axis, Axis::Descendant | Axis::DescendantOrSelf | Axis::DescendantAttribute)
}

impl VirtualNodeSet {
    pub(crate) fn new(
        axis: Axis,
        test: NodeTest,
        context: &NodeSet,
        remember_context: bool,
        source: Arc<dyn NodeSource>,
    ) -> Self {
        let mut context = context.clone();
        context.sort();
        let mut roots: Vec<NodeProxy> = context.clone().into_document_order();
        if spans_subtree(axis) {
            // A root nested in another root's subtree would be walked twice.
            roots.retain(|root| {
                context
                    .sorted_part(root.document_id())
                    .is_none_or(|part| part.parent_with_child(root.id(), false, false, None).is_none())
            });
        }
        Self { axis, test, context, roots, remember_context, source }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn test(&self) -> &NodeTest {
        &self.test
    }

    pub fn context(&self) -> &NodeSet {
        &self.context
    }

    /// Documents the result can contain nodes of.
    pub fn document_set(&self) -> DocumentSet {
        self.context.document_set()
    }

    /// Membership test without walking storage.
    pub fn accepts(&self, node: &NodeProxy) -> bool {
        if !self.test.matches_kind(node.kind()) {
            return false;
        }
        let Some(part) = self.context.sorted_part(node.document_id()) else {
            return false;
        };
        let is_attribute = node.kind() == NodeKind::Attribute;
        let id = node.id();
        match self.axis {
            Axis::Child => !is_attribute && part.parent_with_child(id, true, false, None).is_some(),
            Axis::Attribute => is_attribute && part.parent_with_child(id, true, false, None).is_some(),
            Axis::Descendant => !is_attribute && part.parent_with_child(id, false, false, None).is_some(),
            Axis::DescendantOrSelf => !is_attribute && part.parent_with_child(id, false, true, None).is_some(),
            Axis::DescendantAttribute => is_attribute && part.parent_with_child(id, false, false, None).is_some(),
            Axis::SelfAxis => part.contains(id),
            _ => false,
        }
    }

    pub fn iter(&self) -> VirtualIter<'_> {
        VirtualIter { set: self, roots: self.roots.iter(), root: None, stack: Vec::new(), pending: VecDeque::new() }
    }

    /// Materialises the result.
    pub fn realize(&self) -> NodeSet {
        let mut set: NodeSet = self.iter().collect();
        set.sort();
        set
    }

    fn make_node(&self, root: &NodeProxy, id: NodeId, kind: NodeKind) -> NodeProxy {
        let mut node = NodeProxy::new(root.doc().clone(), id, kind);
        if !self.remember_context {
            attach_context(&mut node, root, false);
        } else if spans_subtree(self.axis) {
            // Every context node above the result is a valid origin.
            let include_self = self.axis == Axis::DescendantOrSelf;
            if let Some(part) = self.context.sorted_part(root.document_id()) {
                for anchor in part.ancestors_of(id, include_self) {
                    node.add_context_node(anchor.as_context());
                }
            }
        } else {
            node.add_context_node(root.as_context());
        }
        node
    }
}

impl fmt::Debug for VirtualNodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualNodeSet")
            .field("axis", &self.axis)
            .field("test", &self.test)
            .field("roots", &self.roots.len())
            .field("remember_context", &self.remember_context)
            .finish_non_exhaustive()
    }
}

/// Depth-first walk over the subtrees of a [`VirtualNodeSet`]'s roots.
pub struct VirtualIter<'a> {
    set: &'a VirtualNodeSet,
    roots: std::slice::Iter<'a, NodeProxy>,
    root: Option<&'a NodeProxy>,
    stack: Vec<(NodeId, NodeKind)>,
    pending: VecDeque<(NodeId, NodeKind)>,
}

impl VirtualIter<'_> {
    fn children(&self, root: &NodeProxy, id: NodeId, kind: NodeKind) -> Vec<(NodeId, NodeKind)> {
        if kind == NodeKind::Element { self.set.source.children(root.doc(), id) } else { Vec::new() }
    }

    fn start(&mut self, root: &NodeProxy) {
        let children = self.children(root, root.id(), root.kind());
        let (attributes, others): (Vec<_>, Vec<_>) =
            children.into_iter().partition(|(_, kind)| *kind == NodeKind::Attribute);
        match self.set.axis {
            Axis::SelfAxis => self.pending.push_back((root.id(), root.kind())),
            Axis::Child => self.pending.extend(others),
            Axis::Attribute => self.pending.extend(attributes),
            Axis::Descendant => self.stack.extend(others.into_iter().rev()),
            Axis::DescendantOrSelf => {
                self.pending.push_back((root.id(), root.kind()));
                self.stack.extend(others.into_iter().rev());
            }
            Axis::DescendantAttribute => self.stack.push((root.id(), root.kind())),
            _ => {}
        }
    }

    fn expand(&mut self, root: &NodeProxy, id: NodeId, kind: NodeKind) {
        let children = self.children(root, id, kind);
        if self.set.axis == Axis::DescendantAttribute {
            self.pending.extend(children.iter().copied().filter(|(_, k)| *k == NodeKind::Attribute));
            self.stack.extend(children.into_iter().rev().filter(|(_, k)| *k == NodeKind::Element));
        } else {
            self.pending.push_back((id, kind));
            self.stack.extend(children.into_iter().rev().filter(|(_, k)| *k != NodeKind::Attribute));
        }
    }
}

impl Iterator for VirtualIter<'_> {
    type Item = NodeProxy;

    fn next(&mut self) -> Option<NodeProxy> {
        loop {
            if let Some(root) = self.root {
                if let Some((id, kind)) = self.pending.pop_front() {
                    if self.set.test.matches_kind(kind) {
                        return Some(self.set.make_node(root, id, kind));
                    }
                    continue;
                }
                if let Some((id, kind)) = self.stack.pop() {
                    self.expand(root, id, kind);
                    continue;
                }
            }
            let root = self.roots.next()?;
            self.root = Some(root);
            self.start(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::collections::HashMap;
    use xstep_core::{Document, DocumentId, DocumentRef, LevelOrderAddressing};

    /// root(1) [@id=2] -> a(3) [@x=9], b(4) -> c(12), d(13); text(5) under root.
    /// Fan-out: root has 4 slots (2..=5), every level-1 node has 3.
    struct Tree {
        doc: DocumentRef,
        kinds: HashMap<u64, NodeKind>,
    }

    impl NodeSource for Tree {
        fn node_kind(&self, _doc: &xstep_core::Document, id: NodeId) -> Option<NodeKind> {
            self.kinds.get(&id.raw()).copied()
        }
    }

    #[fixture]
    fn tree() -> Arc<Tree> {
        let doc = Document::new(DocumentId(1), "/db/v.xml", Arc::new(LevelOrderAddressing::new(&[4, 3]).unwrap()));
        let kinds = HashMap::from([
            (1, NodeKind::Element),
            (2, NodeKind::Attribute),
            (3, NodeKind::Element),
            (4, NodeKind::Element),
            (5, NodeKind::Text),
            (9, NodeKind::Attribute),
            (12, NodeKind::Element),
            (13, NodeKind::Element),
        ]);
        Arc::new(Tree { doc, kinds })
    }

    fn context(tree: &Tree, ids: &[u64]) -> NodeSet {
        ids.iter().map(|&id| NodeProxy::new(tree.doc.clone(), NodeId(id), tree.kinds[&id])).collect()
    }

    fn walk(tree: &Arc<Tree>, axis: Axis, test: NodeTest, ctx: &[u64]) -> Vec<u64> {
        let set = VirtualNodeSet::new(axis, test, &context(tree, ctx), false, tree.clone());
        set.iter().map(|n| n.id().raw()).collect()
    }

    #[rstest]
    #[case(Axis::Child, NodeTest::any_element(), &[1], vec![3, 4])]
    #[case(Axis::Child, NodeTest::node(), &[1], vec![3, 4, 5])]
    #[case(Axis::Child, NodeTest::text(), &[1], vec![5])]
    #[case(Axis::Attribute, NodeTest::any_attribute(), &[1, 3], vec![2, 9])]
    #[case(Axis::Descendant, NodeTest::any_element(), &[1], vec![3, 4, 12, 13])]
    #[case(Axis::DescendantOrSelf, NodeTest::any_element(), &[4], vec![4, 12, 13])]
    #[case(Axis::DescendantAttribute, NodeTest::any_attribute(), &[1], vec![2, 9])]
    #[case(Axis::SelfAxis, NodeTest::any_element(), &[5, 4], vec![4])]
    fn walks(tree: Arc<Tree>, #[case] axis: Axis, #[case] test: NodeTest, #[case] ctx: &[u64], #[case] expected: Vec<u64>) {
        assert_eq!(walk(&tree, axis, test, ctx), expected);
    }

    #[rstest]
    fn nested_roots_are_walked_once(tree: Arc<Tree>) {
        assert_eq!(walk(&tree, Axis::Descendant, NodeTest::any_element(), &[4, 1]), vec![3, 4, 12, 13]);
    }

    #[rstest]
    fn restartable_and_realizable(tree: Arc<Tree>) {
        let set = VirtualNodeSet::new(Axis::Child, NodeTest::any_element(), &context(&tree, &[4]), false, tree.clone());
        assert_eq!(set.iter().count(), 2);
        assert_eq!(set.iter().count(), 2);
        let mut realized = set.realize();
        assert_eq!(realized.len(), 2);
        assert_eq!(set.document_set().ids().collect::<Vec<_>>(), vec![DocumentId(1)]);
    }

    #[rstest]
    fn accepts_without_walking(tree: Arc<Tree>) {
        let set = VirtualNodeSet::new(Axis::Descendant, NodeTest::any_element(), &context(&tree, &[1]), false, tree.clone());
        assert!(set.accepts(&NodeProxy::element(tree.doc.clone(), NodeId(12))));
        assert!(!set.accepts(&NodeProxy::element(tree.doc.clone(), NodeId(1))));
        assert!(!set.accepts(&NodeProxy::new(tree.doc.clone(), NodeId(2), NodeKind::Attribute)));
    }

    #[rstest]
    fn remembered_context_lists_every_origin(tree: Arc<Tree>) {
        let set = VirtualNodeSet::new(Axis::Descendant, NodeTest::any_element(), &context(&tree, &[1, 4]), true, tree.clone());
        let c = set.iter().find(|n| n.id() == NodeId(12)).unwrap();
        let origins: Vec<u64> = c.context().iter().map(|c| c.id.raw()).collect();
        assert_eq!(origins, vec![4, 1]);
    }
}
