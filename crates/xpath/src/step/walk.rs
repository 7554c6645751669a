//! Tree walks over storage, used where no index can answer a wildcard step.

use xstep_core::{Document, NodeId, NodeKind};

use crate::node_proxy::NodeProxy;
use crate::node_set::SiblingDirection;
use crate::storage::NodeSource;

/// `id` and every non-attribute node below it, in document order.
pub(crate) fn subtree(source: &dyn NodeSource, doc: &Document, id: NodeId, kind: NodeKind, out: &mut Vec<(NodeId, NodeKind)>) {
    let mut stack = vec![(id, kind)];
    while let Some((id, kind)) = stack.pop() {
        out.push((id, kind));
        if kind == NodeKind::Element {
            let children = source.children(doc, id);
            stack.extend(children.into_iter().rev().filter(|(_, k)| *k != NodeKind::Attribute));
        }
    }
}

/// Non-attribute siblings of `id` on one side, nearest first.
pub(crate) fn siblings(
    source: &dyn NodeSource,
    doc: &Document,
    id: NodeId,
    direction: SiblingDirection,
) -> Vec<(NodeId, NodeKind)> {
    let parent = doc.parent_of(id);
    if parent.is_none() {
        return Vec::new();
    }
    let children = source.children(doc, parent).into_iter().filter(|(_, kind)| *kind != NodeKind::Attribute);
    match direction {
        SiblingDirection::Following => children.filter(|(sib, _)| *sib > id).collect(),
        SiblingDirection::Preceding => {
            let mut before: Vec<_> = children.filter(|(sib, _)| *sib < id).collect();
            before.reverse();
            before
        }
    }
}

/// Nodes on the following or preceding axis of `node`.
///
/// An attribute is treated like its owner element, except that the owner's
/// children follow the attribute.
pub(crate) fn beyond(source: &dyn NodeSource, node: &NodeProxy, direction: SiblingDirection) -> Vec<(NodeId, NodeKind)> {
    let doc = node.doc();
    let mut out = Vec::new();
    let mut current = node.id();
    if node.kind() == NodeKind::Attribute {
        current = node.parent_id();
        if direction == SiblingDirection::Following {
            for (child, kind) in source.children(doc, current) {
                if kind != NodeKind::Attribute {
                    subtree(source, doc, child, kind, &mut out);
                }
            }
        }
    }
    while !current.is_none() {
        for (sibling, kind) in siblings(source, doc, current, direction) {
            subtree(source, doc, sibling, kind, &mut out);
        }
        current = doc.parent_of(current);
    }
    out
}
