//! Document-partitioned node collection.
//!
//! A [`NodeSet`] keeps one [`Part`] per document, ordered by document id.
//! Sorting is lazy: mutations leave the set unsorted and the next query
//! sorts it by identifier (for lookups) or in document order (for
//! positional access). Only one of the two orders holds at a time.
//!
//! The `select_*` methods are the relationship algebra every structural
//! axis reduces to. They treat `self` as the candidate set and the argument
//! as the context set, and return a fresh set.

mod part;

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use xstep_core::{DocumentId, DocumentRef, DocumentSet, NodeId, NodeKind};

use crate::node_proxy::NodeProxy;
pub use part::Part;
pub(crate) use part::attach_context;

pub const DEFAULT_PART_CAPACITY: usize = 128;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Identity of one `NodeSet` instance. Clones get a fresh identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SetIdentity(u64);

impl SetIdentity {
    fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Which side of a structural relation the result is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Keep candidates that are below a context node.
    Descendant,
    /// Keep candidates that are above a context node.
    Ancestor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SiblingDirection {
    Following,
    Preceding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SortOrder {
    Unsorted,
    ById,
    DocumentOrder,
}

#[derive(Debug)]
pub struct NodeSet {
    instance: SetIdentity,
    parts: Vec<Part>,
    last_part: Option<usize>,
    part_capacity: usize,
    order: SortOrder,
    revision: u32,
}

impl Default for NodeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for NodeSet {
    fn clone(&self) -> Self {
        Self {
            instance: SetIdentity::next(),
            parts: self.parts.clone(),
            last_part: self.last_part,
            part_capacity: self.part_capacity,
            order: self.order,
            revision: self.revision,
        }
    }
}

impl NodeSet {
    pub fn new() -> Self {
        Self::with_capacity(0, DEFAULT_PART_CAPACITY)
    }

    /// `expected_docs` partitions are preallocated; new partitions reserve
    /// `part_capacity` entries unless a size hint says otherwise.
    pub fn with_capacity(expected_docs: usize, part_capacity: usize) -> Self {
        Self {
            instance: SetIdentity::next(),
            parts: Vec::with_capacity(expected_docs),
            last_part: None,
            part_capacity: part_capacity.max(1),
            order: SortOrder::Unsorted,
            revision: 0,
        }
    }

    pub fn identity(&self) -> SetIdentity {
        self.instance
    }

    /// Mutation counter; changes on every add or remove and wraps on overflow.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        self.order = SortOrder::Unsorted;
    }

    fn part_index(&self, doc: DocumentId) -> Result<usize, usize> {
        if let Some(idx) = self.last_part
            && self.parts.get(idx).is_some_and(|p| p.doc().id() == doc)
        {
            return Ok(idx);
        }
        self.parts.binary_search_by_key(&doc, |p| p.doc().id())
    }

    fn part(&self, doc: DocumentId) -> Option<&Part> {
        self.part_index(doc).ok().map(|idx| &self.parts[idx])
    }

    fn part_for(&mut self, doc: &DocumentRef, size_hint: Option<usize>) -> &mut Part {
        let idx = match self.part_index(doc.id()) {
            Ok(idx) => idx,
            Err(idx) => {
                let capacity = size_hint.unwrap_or(self.part_capacity);
                self.parts.insert(idx, Part::new(doc.clone(), capacity));
                idx
            }
        };
        self.last_part = Some(idx);
        &mut self.parts[idx]
    }

    pub fn add(&mut self, node: NodeProxy) {
        let doc = node.doc().clone();
        self.part_for(&doc, None).add(node);
        self.touch();
    }

    /// Adds `node`; `size_hint` sizes the partition if it has to be created.
    pub fn add_with_hint(&mut self, node: NodeProxy, size_hint: usize) {
        let doc = node.doc().clone();
        self.part_for(&doc, Some(size_hint)).add(node);
        self.touch();
    }

    pub fn add_all(&mut self, other: &NodeSet) {
        for node in other.nodes() {
            self.add(node.clone());
        }
    }

    pub fn is_sorted_by_id(&self) -> bool {
        self.order == SortOrder::ById
    }

    pub fn is_in_document_order(&self) -> bool {
        self.order == SortOrder::DocumentOrder
    }

    /// Sorts every partition by identifier and drops duplicates.
    pub fn sort(&mut self) {
        if self.order == SortOrder::ById {
            return;
        }
        for part in &mut self.parts {
            part.sort_by_id();
            part.remove_duplicates();
        }
        self.order = SortOrder::ById;
    }

    pub fn sort_in_document_order(&mut self) {
        if self.order == SortOrder::DocumentOrder {
            return;
        }
        for part in &mut self.parts {
            if self.order == SortOrder::Unsorted {
                part.sort_by_id();
                part.remove_duplicates();
            }
            part.sort_in_document_order();
        }
        self.order = SortOrder::DocumentOrder;
    }

    /// Same as [`NodeSet::sort`]; named after the step that needs it.
    pub fn remove_duplicates(&mut self) {
        self.sort();
    }

    /// Number of distinct nodes.
    pub fn len(&mut self) -> usize {
        if self.order == SortOrder::Unsorted {
            self.sort();
        }
        self.raw_len()
    }

    /// Stored entries, duplicates included while unsorted.
    pub fn raw_len(&self) -> usize {
        self.parts.iter().map(Part::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn contains_document(&self, doc: DocumentId) -> bool {
        self.part(doc).is_some()
    }

    /// Current entry count of the partition for `doc`.
    pub fn size_hint(&self, doc: DocumentId) -> Option<usize> {
        self.part(doc).map(Part::len)
    }

    pub fn contains(&mut self, doc: DocumentId, id: NodeId) -> bool {
        self.get(doc, id).is_some()
    }

    pub fn get(&mut self, doc: DocumentId, id: NodeId) -> Option<&NodeProxy> {
        self.sort();
        self.lookup(doc, id)
    }

    /// Lookup on a set already sorted by identifier.
    pub(crate) fn lookup(&self, doc: DocumentId, id: NodeId) -> Option<&NodeProxy> {
        debug_assert!(self.order == SortOrder::ById, "lookup on a set not sorted by id");
        self.part(doc)?.find(id)
    }

    pub(crate) fn sorted_part(&self, doc: DocumentId) -> Option<&Part> {
        debug_assert!(self.order == SortOrder::ById, "partition access on a set not sorted by id");
        self.part(doc)
    }

    /// The node at `position` in document order.
    pub fn get_at(&mut self, position: usize) -> Option<&NodeProxy> {
        self.sort_in_document_order();
        let mut remaining = position;
        for part in &self.parts {
            if remaining < part.len() {
                return part.nodes().get(remaining);
            }
            remaining -= part.len();
        }
        None
    }

    pub fn remove(&mut self, node: &NodeProxy) -> bool {
        self.sort();
        let Ok(idx) = self.part_index(node.document_id()) else {
            return false;
        };
        if !self.parts[idx].remove(node.id()) {
            return false;
        }
        if self.parts[idx].is_empty() {
            self.parts.remove(idx);
            self.last_part = None;
        }
        self.revision = self.revision.wrapping_add(1);
        true
    }

    /// Nodes of `doc` with identifiers in `[lower, upper]`.
    pub fn range(&mut self, doc: DocumentId, lower: NodeId, upper: NodeId) -> NodeSet {
        self.sort();
        let mut result = NodeSet::new();
        if let Some(part) = self.part(doc) {
            for node in part.range(lower, upper) {
                result.add(node.clone());
            }
        }
        result
    }

    pub fn children_in_set(&mut self, parent: &NodeProxy, relation: Relation, remember: bool) -> NodeSet {
        self.sort();
        let mut result = NodeSet::new();
        if let Some(part) = self.part(parent.document_id()) {
            part.children_in_set(parent, relation, remember, &mut result);
        }
        result
    }

    /// Nearest node of this set on the ancestor chain of `id`.
    pub fn parent_with_child(
        &mut self,
        doc: DocumentId,
        id: NodeId,
        direct_only: bool,
        include_self: bool,
        level: Option<u32>,
    ) -> Option<&NodeProxy> {
        self.sort();
        self.part(doc)?.parent_with_child(id, direct_only, include_self, level)
    }

    /// Parent/child join with the context set.
    ///
    /// [`Relation::Descendant`] keeps candidates whose parent is a context
    /// node (child axis). [`Relation::Ancestor`] keeps candidates that are the
    /// parent of a context node (parent axis).
    pub fn select_parent_child(&mut self, context: &NodeSet, relation: Relation, remember: bool) -> NodeSet {
        self.sort();
        let mut result = NodeSet::new();
        for ctx in context.nodes() {
            let Some(part) = self.part(ctx.document_id()) else {
                continue;
            };
            match relation {
                Relation::Descendant => part.children_in_set(ctx, Relation::Descendant, remember, &mut result),
                Relation::Ancestor => {
                    if let Some(parent) = part.parent_with_child(ctx.id(), true, false, None) {
                        let mut node = parent.clone();
                        attach_context(&mut node, ctx, remember);
                        result.add(node);
                    }
                }
            }
        }
        result
    }

    /// Ancestor/descendant join with the context set.
    pub fn select_ancestor_descendant(
        &mut self,
        context: &NodeSet,
        relation: Relation,
        include_self: bool,
        remember: bool,
    ) -> NodeSet {
        if relation == Relation::Ancestor {
            return self.select_ancestors(context, include_self, remember);
        }
        self.sort();
        let mut result = NodeSet::new();
        for ctx in context.nodes() {
            let Some(part) = self.part(ctx.document_id()) else {
                continue;
            };
            for found in part.descendants_of(ctx.id(), include_self) {
                let mut node = found.clone();
                attach_context(&mut node, ctx, remember);
                result.add(node);
            }
        }
        result
    }

    /// Candidates that are ancestors (or, with `include_self`, the node
    /// itself) of some node in `descendants`.
    pub fn select_ancestors(&mut self, descendants: &NodeSet, include_self: bool, remember: bool) -> NodeSet {
        self.sort();
        let mut result = NodeSet::new();
        for ctx in descendants.nodes() {
            let Some(part) = self.part(ctx.document_id()) else {
                continue;
            };
            for found in part.ancestors_of(ctx.id(), include_self) {
                let mut node = found.clone();
                attach_context(&mut node, ctx, remember);
                result.add(node);
            }
        }
        result
    }

    pub fn select_siblings(&mut self, context: &NodeSet, direction: SiblingDirection, remember: bool) -> NodeSet {
        self.sort();
        let mut result = NodeSet::new();
        for ctx in context.nodes() {
            let Some(part) = self.part(ctx.document_id()) else {
                continue;
            };
            for sibling in part.siblings_of(ctx, direction) {
                let mut node = sibling.clone();
                attach_context(&mut node, ctx, remember);
                result.add(node);
            }
        }
        result
    }

    /// Candidates after a context node in document order, excluding its descendants.
    pub fn select_following(&mut self, context: &NodeSet, remember: bool) -> NodeSet {
        self.select_beyond(context, SiblingDirection::Following, remember)
    }

    /// Candidates before a context node in document order, excluding its ancestors.
    pub fn select_preceding(&mut self, context: &NodeSet, remember: bool) -> NodeSet {
        self.select_beyond(context, SiblingDirection::Preceding, remember)
    }

    fn select_beyond(&mut self, context: &NodeSet, direction: SiblingDirection, remember: bool) -> NodeSet {
        self.sort();
        let mut result = NodeSet::new();
        for ctx in context.nodes() {
            let Some(part) = self.part(ctx.document_id()) else {
                continue;
            };
            let doc = part.doc();
            for candidate in part.nodes() {
                if candidate.kind() == NodeKind::Attribute {
                    continue;
                }
                let (a, b) = (ctx.id(), candidate.id());
                let hit = match direction {
                    SiblingDirection::Following => {
                        doc.compare_document_order(a, b).is_lt() && !doc.is_ancestor(a, b)
                    }
                    SiblingDirection::Preceding => {
                        doc.compare_document_order(b, a).is_lt() && !doc.is_ancestor(b, a)
                    }
                };
                if hit {
                    let mut node = candidate.clone();
                    attach_context(&mut node, ctx, remember);
                    result.add(node);
                }
            }
        }
        result
    }

    /// Parents of all nodes in this set. The root element has none.
    pub fn parents(&self, remember: bool) -> NodeSet {
        let mut result = NodeSet::new();
        for node in self.nodes() {
            let parent = node.parent_id();
            if parent.is_none() {
                continue;
            }
            let mut proxy = NodeProxy::element(node.doc().clone(), parent);
            attach_context(&mut proxy, node, remember);
            result.add(proxy);
        }
        result
    }

    /// Makes every node its own context node.
    pub fn set_self_as_context(&mut self) {
        for part in &mut self.parts {
            part.set_self_as_context();
        }
    }

    /// Documents referenced by this set in ascending identifier order.
    pub fn document_set(&self) -> DocumentSet {
        self.parts.iter().map(|p| p.doc().clone()).collect()
    }

    /// Entries in storage order, without sorting.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeProxy> + '_ {
        self.parts.iter().flat_map(|p| p.nodes().iter())
    }

    /// Distinct nodes ordered by document, then identifier.
    pub fn iter(&mut self) -> NodeSetIter<'_> {
        self.sort();
        NodeSetIter::new(&self.parts)
    }

    pub fn iter_document_order(&mut self) -> NodeSetIter<'_> {
        self.sort_in_document_order();
        NodeSetIter::new(&self.parts)
    }

    /// Consumes the set, returning its nodes in document order.
    pub fn into_document_order(mut self) -> Vec<NodeProxy> {
        self.sort_in_document_order();
        self.parts.into_iter().flat_map(|p| p.nodes().to_vec()).collect()
    }
}

impl FromIterator<NodeProxy> for NodeSet {
    fn from_iter<T: IntoIterator<Item = NodeProxy>>(iter: T) -> Self {
        let mut set = NodeSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<NodeProxy> for NodeSet {
    fn extend<T: IntoIterator<Item = NodeProxy>>(&mut self, iter: T) {
        for node in iter {
            self.add(node);
        }
    }
}

/// Iterator over a sorted [`NodeSet`] with cheap skipping.
#[derive(Clone, Debug)]
pub struct NodeSetIter<'a> {
    parts: &'a [Part],
    part: usize,
    pos: usize,
    remaining: usize,
}

impl<'a> NodeSetIter<'a> {
    fn new(parts: &'a [Part]) -> Self {
        let remaining = parts.iter().map(Part::len).sum();
        Self { parts, part: 0, pos: 0, remaining }
    }

    pub fn skippable(&self) -> usize {
        self.remaining
    }

    /// Skips up to `n` nodes and returns how many were skipped.
    pub fn skip_items(&mut self, n: usize) -> usize {
        let mut left = n.min(self.remaining);
        let skipped = left;
        while left > 0 {
            let available = self.parts[self.part].len() - self.pos;
            if left < available {
                self.pos += left;
                break;
            }
            left -= available;
            self.part += 1;
            self.pos = 0;
        }
        self.remaining -= skipped;
        skipped
    }
}

impl<'a> Iterator for NodeSetIter<'a> {
    type Item = &'a NodeProxy;

    fn next(&mut self) -> Option<&'a NodeProxy> {
        while let Some(part) = self.parts.get(self.part) {
            if let Some(node) = part.nodes().get(self.pos) {
                self.pos += 1;
                self.remaining -= 1;
                return Some(node);
            }
            self.part += 1;
            self.pos = 0;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for NodeSetIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use xstep_core::{Document, LevelOrderAddressing};

    struct Docs {
        a: DocumentRef,
        b: DocumentRef,
    }

    /// Two documents shaped root(1) -> 2,3 -> 4,5 | 6,7
    #[fixture]
    fn docs() -> Docs {
        let scheme = Arc::new(LevelOrderAddressing::new(&[2, 2]).unwrap());
        Docs {
            a: Document::new(DocumentId(1), "/db/a.xml", scheme.clone()),
            b: Document::new(DocumentId(2), "/db/b.xml", scheme),
        }
    }

    fn set_of(doc: &DocumentRef, ids: &[u64]) -> NodeSet {
        ids.iter().map(|&id| NodeProxy::element(doc.clone(), NodeId(id))).collect()
    }

    fn ids(set: &mut NodeSet) -> Vec<(u32, u64)> {
        set.iter().map(|n| (n.document_id().raw(), n.id().raw())).collect()
    }

    #[rstest]
    fn partitions_are_ordered_by_document(docs: Docs) {
        let mut set = NodeSet::new();
        set.add(NodeProxy::element(docs.b.clone(), NodeId(2)));
        set.add(NodeProxy::element(docs.a.clone(), NodeId(3)));
        set.add(NodeProxy::element(docs.a.clone(), NodeId(1)));
        assert_eq!(ids(&mut set), vec![(1, 1), (1, 3), (2, 2)]);
        assert_eq!(set.document_set().ids().collect::<Vec<_>>(), vec![DocumentId(1), DocumentId(2)]);
        assert_eq!(set.size_hint(DocumentId(1)), Some(2));
        assert_eq!(set.size_hint(DocumentId(9)), None);
    }

    #[rstest]
    fn sort_states_are_exclusive(docs: Docs) {
        let mut set = set_of(&docs.a, &[3, 4, 2]);
        assert!(!set.is_sorted_by_id() && !set.is_in_document_order());
        set.sort();
        assert!(set.is_sorted_by_id() && !set.is_in_document_order());
        set.sort_in_document_order();
        assert!(!set.is_sorted_by_id() && set.is_in_document_order());
        let order: Vec<u64> = set.iter_document_order().map(|n| n.id().raw()).collect();
        assert_eq!(order, vec![2, 4, 3]);
        assert!(set.contains(DocumentId(1), NodeId(4)));
        assert!(set.is_sorted_by_id());
    }

    #[rstest]
    fn revision_tracks_mutation_only(docs: Docs) {
        let mut set = set_of(&docs.a, &[2, 3]);
        let before = set.revision();
        set.sort();
        set.sort_in_document_order();
        assert_eq!(set.revision(), before);
        set.add(NodeProxy::element(docs.a.clone(), NodeId(4)));
        assert_ne!(set.revision(), before);
        let identity = set.identity();
        assert_ne!(set.clone().identity(), identity);
    }

    #[rstest]
    fn revision_wraps() {
        let mut set = NodeSet::new();
        set.revision = u32::MAX;
        set.touch();
        assert_eq!(set.revision(), 0);
    }

    #[rstest]
    fn positional_access_uses_document_order(docs: Docs) {
        let mut set = set_of(&docs.a, &[3, 4, 2]);
        assert_eq!(set.get_at(1).map(NodeProxy::id), Some(NodeId(4)));
        assert_eq!(set.get_at(3), None);
    }

    #[rstest]
    fn remove_drops_empty_partition(docs: Docs) {
        let mut set = set_of(&docs.a, &[2]);
        let node = NodeProxy::element(docs.a.clone(), NodeId(2));
        assert!(set.remove(&node));
        assert!(!set.remove(&node));
        assert!(set.is_empty());
        assert!(!set.contains_document(DocumentId(1)));
    }

    #[rstest]
    fn parent_child_both_directions(docs: Docs) {
        let mut candidates = set_of(&docs.a, &[2, 4, 5, 6]);
        let context = set_of(&docs.a, &[2]);
        let mut children = candidates.select_parent_child(&context, Relation::Descendant, false);
        assert_eq!(ids(&mut children), vec![(1, 4), (1, 5)]);

        let mut parents = candidates.select_parent_child(&set_of(&docs.a, &[5, 7]), Relation::Ancestor, true);
        assert_eq!(ids(&mut parents), vec![(1, 2)]);
    }

    #[rstest]
    fn ancestor_descendant(docs: Docs) {
        let mut candidates = set_of(&docs.a, &[1, 3, 6, 7]);
        let mut below = candidates.select_ancestor_descendant(&set_of(&docs.a, &[1]), Relation::Descendant, false, false);
        assert_eq!(ids(&mut below), vec![(1, 3), (1, 6), (1, 7)]);
        let mut above = candidates.select_ancestors(&set_of(&docs.a, &[6]), true, false);
        assert_eq!(ids(&mut above), vec![(1, 1), (1, 3), (1, 6)]);
    }

    #[rstest]
    fn following_and_preceding(docs: Docs) {
        let mut candidates = set_of(&docs.a, &[1, 2, 3, 4, 5, 6, 7]);
        let context = set_of(&docs.a, &[5]);
        let mut following = candidates.select_following(&context, false);
        assert_eq!(ids(&mut following), vec![(1, 3), (1, 6), (1, 7)]);
        let mut preceding = candidates.select_preceding(&context, false);
        assert_eq!(ids(&mut preceding), vec![(1, 4)]);
    }

    #[rstest]
    fn parents_skip_root(docs: Docs) {
        let set = set_of(&docs.a, &[1, 4, 5]);
        let mut parents = set.parents(false);
        assert_eq!(ids(&mut parents), vec![(1, 2)]);
    }

    #[rstest]
    fn cross_document_isolation(docs: Docs) {
        let mut candidates = set_of(&docs.b, &[4, 5]);
        let context = set_of(&docs.a, &[2]);
        assert!(candidates.select_parent_child(&context, Relation::Descendant, false).is_empty());
    }

    #[rstest]
    fn skipping_iteration(docs: Docs) {
        let mut set = set_of(&docs.a, &[1, 2]);
        set.add_all(&set_of(&docs.b, &[1, 2, 3]));
        let mut it = set.iter();
        assert_eq!(it.skippable(), 5);
        assert_eq!(it.skip_items(3), 3);
        assert_eq!(it.next().map(|n| (n.document_id().raw(), n.id().raw())), Some((2, 2)));
        assert_eq!(it.skip_items(10), 1);
        assert_eq!(it.skippable(), 0);
        assert!(it.next().is_none());
    }

    #[rstest]
    fn empty_set_answers_everything(docs: Docs) {
        let mut empty = NodeSet::new();
        assert_eq!(empty.len(), 0);
        assert!(empty.get(DocumentId(1), NodeId(1)).is_none());
        assert!(empty.get_at(0).is_none());
        assert!(empty.range(DocumentId(1), NodeId(1), NodeId(9)).is_empty());
        assert!(empty.select_siblings(&set_of(&docs.a, &[2]), SiblingDirection::Following, false).is_empty());
        assert!(empty.document_set().is_empty());
    }
}
