//! Filters applied to a step's result after the axis has been evaluated.

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use smallvec::{SmallVec, smallvec};

use crate::axis::Axis;
use crate::error::StepError;
use crate::node_proxy::{ContextNode, NodeProxy};
use crate::node_set::NodeSet;

pub trait Predicate: Send + Sync + fmt::Debug {
    /// Narrows `candidates`. `outer` is the input of the step, when known.
    fn filter(&self, outer: Option<&NodeSet>, candidates: NodeSet, axis: Axis) -> Result<NodeSet, StepError>;

    /// Whether the predicate needs each result to know its context node.
    fn requires_context(&self) -> bool {
        false
    }
}

/// Keeps the node at 1-based position `n` among the results of each context
/// node. Reverse axes count from the context node outwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position(pub usize);

impl Predicate for Position {
    fn filter(&self, _outer: Option<&NodeSet>, candidates: NodeSet, axis: Axis) -> Result<NodeSet, StepError> {
        let Position(n) = *self;
        if n == 0 {
            return Ok(NodeSet::new());
        }
        let nodes = candidates.into_document_order();
        let groups = nodes
            .iter()
            .enumerate()
            .flat_map(|(idx, node)| {
                let anchors: SmallVec<[Option<ContextNode>; 2]> = if node.has_context() {
                    node.context().iter().copied().map(Some).collect()
                } else {
                    smallvec![None]
                };
                anchors.into_iter().map(move |anchor| (anchor, idx))
            })
            .into_group_map();

        let mut keep = vec![false; nodes.len()];
        for members in groups.values() {
            let pick = if axis.is_reverse() { members.len().checked_sub(n) } else { Some(n - 1) };
            if let Some(&idx) = pick.and_then(|i| members.get(i)) {
                keep[idx] = true;
            }
        }
        Ok(nodes.into_iter().zip(keep).filter_map(|(node, kept)| kept.then_some(node)).collect())
    }

    fn requires_context(&self) -> bool {
        true
    }
}

type FilterFn = dyn Fn(&NodeProxy) -> Result<bool, StepError> + Send + Sync;

/// Keeps nodes for which a closure returns `true`.
#[derive(Clone)]
pub struct NodeFilter {
    label: &'static str,
    test: Arc<FilterFn>,
}

impl NodeFilter {
    pub fn new(label: &'static str, test: impl Fn(&NodeProxy) -> bool + Send + Sync + 'static) -> Self {
        Self { label, test: Arc::new(move |node| Ok(test(node))) }
    }

    /// Like [`NodeFilter::new`], but the closure may fail.
    pub fn fallible(
        label: &'static str,
        test: impl Fn(&NodeProxy) -> Result<bool, StepError> + Send + Sync + 'static,
    ) -> Self {
        Self { label, test: Arc::new(test) }
    }
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeFilter").field(&self.label).finish()
    }
}

impl Predicate for NodeFilter {
    fn filter(&self, _outer: Option<&NodeSet>, mut candidates: NodeSet, _axis: Axis) -> Result<NodeSet, StepError> {
        let mut result = NodeSet::new();
        for node in candidates.iter() {
            if (self.test)(node)? {
                result.add(node.clone());
            }
        }
        Ok(result)
    }
}
