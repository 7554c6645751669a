use core::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::sync::Arc;

use crate::addressing::{ChildRange, NodeIdAddressing};
use crate::node::{DocumentId, NodeId};

pub type DocumentRef = Arc<Document>;

/// A stored document as seen by the query core: its identifier, its URI and
/// the identifier arithmetic that applies to its nodes.
pub struct Document {
    id: DocumentId,
    uri: Arc<str>,
    addressing: Arc<dyn NodeIdAddressing>,
}

impl Document {
    pub fn new(id: DocumentId, uri: impl Into<Arc<str>>, addressing: Arc<dyn NodeIdAddressing>) -> DocumentRef {
        Arc::new(Self { id, uri: uri.into(), addressing })
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn addressing(&self) -> &Arc<dyn NodeIdAddressing> {
        &self.addressing
    }

    pub fn level_of(&self, id: NodeId) -> u32 {
        self.addressing.level_of(id)
    }

    pub fn parent_id(&self, id: NodeId, level: u32) -> NodeId {
        self.addressing.parent_id(id, level)
    }

    /// Parent identifier computed from the node's own level.
    pub fn parent_of(&self, id: NodeId) -> NodeId {
        self.addressing.parent_id(id, self.addressing.level_of(id))
    }

    pub fn child_range(&self, parent: NodeId) -> Option<ChildRange> {
        self.addressing.child_range(parent)
    }

    pub fn compare_document_order(&self, a: NodeId, b: NodeId) -> Ordering {
        self.addressing.compare_document_order(a, b)
    }

    pub fn is_ancestor(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        self.addressing.is_ancestor(ancestor, descendant)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document").field("id", &self.id).field("uri", &self.uri).finish()
    }
}

/// Distinct documents, iterated in ascending identifier order.
#[derive(Clone, Default)]
pub struct DocumentSet {
    docs: BTreeMap<DocumentId, DocumentRef>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `doc`; returns `false` if a document with the same id was already present.
    pub fn add(&mut self, doc: DocumentRef) -> bool {
        match self.docs.entry(doc.id()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(doc);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.docs.contains_key(&id)
    }

    pub fn get(&self, id: DocumentId) -> Option<&DocumentRef> {
        self.docs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentRef> + '_ {
        self.docs.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.docs.keys().copied()
    }

    /// True if both sets share at least one document.
    pub fn intersects(&self, other: &DocumentSet) -> bool {
        let (small, large) = if self.len() <= other.len() { (self, other) } else { (other, self) };
        small.ids().any(|id| large.contains(id))
    }
}

impl PartialEq for DocumentSet {
    fn eq(&self, other: &Self) -> bool {
        self.docs.len() == other.docs.len() && self.docs.keys().eq(other.docs.keys())
    }
}

impl Eq for DocumentSet {}

impl fmt::Debug for DocumentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.docs.keys()).finish()
    }
}

impl FromIterator<DocumentRef> for DocumentSet {
    fn from_iter<T: IntoIterator<Item = DocumentRef>>(iter: T) -> Self {
        let mut set = DocumentSet::new();
        for doc in iter {
            set.add(doc);
        }
        set
    }
}

impl Extend<DocumentRef> for DocumentSet {
    fn extend<T: IntoIterator<Item = DocumentRef>>(&mut self, iter: T) {
        for doc in iter {
            self.add(doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::LevelOrderAddressing;
    use rstest::rstest;

    fn doc(id: u32) -> DocumentRef {
        let scheme = LevelOrderAddressing::new(&[2]).unwrap();
        Document::new(DocumentId(id), format!("/db/{id}.xml"), Arc::new(scheme))
    }

    #[rstest]
    fn iterates_in_ascending_id_order() {
        let set: DocumentSet = [doc(7), doc(2), doc(5), doc(2)].into_iter().collect();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![DocumentId(2), DocumentId(5), DocumentId(7)]);
        assert_eq!(set.len(), 3);
    }

    #[rstest]
    fn equality_by_ids() {
        let a: DocumentSet = [doc(1), doc(3)].into_iter().collect();
        let b: DocumentSet = [doc(3), doc(1)].into_iter().collect();
        let c: DocumentSet = [doc(1)].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.intersects(&c));
        assert!(!c.intersects(&DocumentSet::new()));
    }

    #[rstest]
    fn delegates_arithmetic() {
        let d = doc(1);
        assert_eq!(d.parent_of(NodeId(3)), NodeId::ROOT);
        assert_eq!(d.level_of(NodeId(2)), 1);
        assert!(d.is_ancestor(NodeId::ROOT, NodeId(2)));
    }
}
