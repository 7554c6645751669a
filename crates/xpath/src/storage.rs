//! Storage collaborators consumed by step evaluation.

use xstep_core::{Document, DocumentSet, NodeId, NodeKind, QName};

use crate::error::IndexError;
use crate::node_proxy::NodeProxy;
use crate::node_set::NodeSet;
use crate::selector::NodeSelector;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexedKind {
    Element,
    Attribute,
}

/// Name index over stored documents.
///
/// Implementations scan `docs` for nodes of `kind` named `name`. When a
/// selector is given, only candidates it selects are returned, carrying the
/// context it attached. Documents unknown to the index contribute nothing.
pub trait ElementIndex: Send + Sync {
    fn find_elements_by_tag_name(
        &self,
        kind: IndexedKind,
        docs: &DocumentSet,
        name: &QName,
        selector: Option<&NodeSelector<'_>>,
    ) -> Result<NodeSet, IndexError>;

    fn attributes_by_name(
        &self,
        docs: &DocumentSet,
        name: &QName,
        selector: Option<&NodeSelector<'_>>,
    ) -> Result<NodeSet, IndexError> {
        self.find_elements_by_tag_name(IndexedKind::Attribute, docs, name, selector)
    }
}

/// Direct node lookup by identifier.
pub trait NodeSource: Send + Sync {
    /// Kind of the node stored under `id`, `None` for an unused identifier.
    fn node_kind(&self, doc: &Document, id: NodeId) -> Option<NodeKind>;

    /// Existing children of `parent` in document order, attributes first.
    fn children(&self, doc: &Document, parent: NodeId) -> Vec<(NodeId, NodeKind)> {
        let Some(range) = doc.child_range(parent) else {
            return Vec::new();
        };
        (range.start.raw()..=range.end.raw())
            .map(NodeId)
            .filter_map(|id| self.node_kind(doc, id).map(|kind| (id, kind)))
            .collect()
    }
}

/// Applies an optional selector to one index hit.
pub fn select_candidate(candidate: NodeProxy, selector: Option<&NodeSelector<'_>>) -> Option<NodeProxy> {
    match selector {
        Some(selector) => selector.select(candidate),
        None => Some(candidate),
    }
}
