//! Structural filters pushed down into an index scan.
//!
//! A [`NodeSelector`] closes over the context set of a step and decides,
//! for each candidate the index produces, whether it stands in the
//! selector's relation to some context node. Accepted candidates are
//! returned with their context attached.

use crate::node_proxy::NodeProxy;
use crate::node_set::{NodeSet, attach_context};

/// Context set shared by all selector variants.
#[derive(Clone, Copy, Debug)]
pub struct Selection<'a> {
    context: &'a NodeSet,
    remember_context: bool,
}

impl<'a> Selection<'a> {
    /// Sorts `context` by identifier so candidates can be checked by binary search.
    pub fn new(context: &'a mut NodeSet, remember_context: bool) -> Self {
        context.sort();
        Self { context, remember_context }
    }

    pub fn context(&self) -> &'a NodeSet {
        self.context
    }

    pub fn remembers_context(&self) -> bool {
        self.remember_context
    }
}

#[derive(Clone, Copy, Debug)]
pub enum NodeSelector<'a> {
    /// Candidate is a child of a context node.
    Child(Selection<'a>),
    /// Candidate is a proper descendant of a context node.
    Descendant(Selection<'a>),
    DescendantOrSelf(Selection<'a>),
    /// Candidate is an ancestor of a context node.
    Ancestor { selection: Selection<'a>, include_self: bool },
    /// Candidate is the parent of a context node.
    Parent(Selection<'a>),
    /// Candidate is itself a context node.
    SelfNode(Selection<'a>),
}

impl<'a> NodeSelector<'a> {
    pub fn child(context: &'a mut NodeSet, remember: bool) -> Self {
        Self::Child(Selection::new(context, remember))
    }

    pub fn descendant(context: &'a mut NodeSet, remember: bool) -> Self {
        Self::Descendant(Selection::new(context, remember))
    }

    pub fn descendant_or_self(context: &'a mut NodeSet, remember: bool) -> Self {
        Self::DescendantOrSelf(Selection::new(context, remember))
    }

    pub fn ancestor(context: &'a mut NodeSet, remember: bool, include_self: bool) -> Self {
        Self::Ancestor { selection: Selection::new(context, remember), include_self }
    }

    pub fn parent(context: &'a mut NodeSet, remember: bool) -> Self {
        Self::Parent(Selection::new(context, remember))
    }

    pub fn self_node(context: &'a mut NodeSet, remember: bool) -> Self {
        Self::SelfNode(Selection::new(context, remember))
    }

    pub fn selection(&self) -> &Selection<'a> {
        match self {
            Self::Child(s) | Self::Descendant(s) | Self::DescendantOrSelf(s) | Self::Parent(s) | Self::SelfNode(s) => s,
            Self::Ancestor { selection, .. } => selection,
        }
    }

    /// Context nodes that justify `candidate`, nearest first.
    fn anchors(&self, candidate: &NodeProxy) -> Vec<&'a NodeProxy> {
        let context = self.selection().context;
        let Some(part) = context.sorted_part(candidate.document_id()) else {
            return Vec::new();
        };
        let id = candidate.id();
        match self {
            Self::Child(_) => part.parent_with_child(id, true, false, None).into_iter().collect(),
            Self::Descendant(_) => part.ancestors_of(id, false),
            Self::DescendantOrSelf(_) => part.ancestors_of(id, true),
            Self::SelfNode(_) => part.find(id).into_iter().collect(),
            Self::Parent(_) => part.children_of(id).iter().collect(),
            Self::Ancestor { include_self, .. } => part.descendants_of(id, *include_self),
        }
    }

    pub fn accept(&self, candidate: &NodeProxy) -> bool {
        let context = self.selection().context;
        let Some(part) = context.sorted_part(candidate.document_id()) else {
            return false;
        };
        let id = candidate.id();
        match self {
            Self::Child(_) => part.parent_with_child(id, true, false, None).is_some(),
            Self::Descendant(_) => part.parent_with_child(id, false, false, None).is_some(),
            Self::DescendantOrSelf(_) => part.parent_with_child(id, false, true, None).is_some(),
            Self::SelfNode(_) => part.contains(id),
            Self::Parent(_) => !part.children_of(id).is_empty(),
            Self::Ancestor { include_self, .. } => (*include_self && part.contains(id)) || part.has_descendant(id),
        }
    }

    /// Returns the candidate with context attached if it is accepted.
    pub fn select(&self, mut candidate: NodeProxy) -> Option<NodeProxy> {
        let anchors = self.anchors(&candidate);
        let first = anchors.first()?;
        let remember = self.selection().remember_context;
        if remember {
            for anchor in &anchors {
                candidate.add_context_node(anchor.as_context());
            }
        } else {
            attach_context(&mut candidate, first, false);
        }
        Some(candidate)
    }
}
