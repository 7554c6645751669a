//! Node identifier arithmetic.
//!
//! The node-set algebra never walks a physical tree. Every structural
//! question (who is my parent, which identifiers can my children have, does
//! `a` precede `b`) is answered from identifiers alone through the
//! [`NodeIdAddressing`] contract.

use core::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::node::NodeId;

/// Inclusive identifier window reserved for the children of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildRange {
    pub start: NodeId,
    pub end: NodeId,
    /// Number of identifier slots in the window; used as a size hint.
    pub distance: usize,
}

impl ChildRange {
    pub fn contains(&self, id: NodeId) -> bool {
        id >= self.start && id <= self.end
    }
}

/// Pure identifier arithmetic for one document.
///
/// Implementations must be deterministic and free of I/O. The provided
/// methods derive document order and ancestry from `level_of` and
/// `parent_id`.
pub trait NodeIdAddressing: Send + Sync + fmt::Debug {
    /// Tree level of `id`; the root element sits on level 0.
    fn level_of(&self, id: NodeId) -> u32;

    /// Parent identifier of `id` located on `level`. [`NodeId::NONE`] for the root.
    fn parent_id(&self, id: NodeId, level: u32) -> NodeId;

    /// Identifier window for the children of `parent`, `None` if the tree has
    /// no level below it.
    fn child_range(&self, parent: NodeId) -> Option<ChildRange>;

    /// Preorder comparison of two identifiers of the same document.
    fn compare_document_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (mut a, mut b) = (a, b);
        let (mut la, mut lb) = (self.level_of(a), self.level_of(b));
        while la > lb {
            a = self.parent_id(a, la);
            la -= 1;
            if a == b {
                return Ordering::Greater;
            }
        }
        while lb > la {
            b = self.parent_id(b, lb);
            lb -= 1;
            if a == b {
                return Ordering::Less;
            }
        }
        // Same level, different nodes: climb until the parents coincide,
        // then siblings are numbered in document order.
        let mut level = la;
        while level > 0 {
            let pa = self.parent_id(a, level);
            let pb = self.parent_id(b, level);
            if pa == pb {
                break;
            }
            a = pa;
            b = pb;
            level -= 1;
        }
        a.cmp(&b)
    }

    /// True if `ancestor` is a proper ancestor of `descendant`.
    fn is_ancestor(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        let target = self.level_of(ancestor);
        let mut level = self.level_of(descendant);
        if level <= target {
            return false;
        }
        let mut id = descendant;
        while level > target {
            id = self.parent_id(id, level);
            level -= 1;
        }
        id == ancestor
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressingError {
    #[error("fan-out of level {level} must be at least 1")]
    ZeroFanOut { level: usize },
    #[error("identifier space overflows at level {level}")]
    Overflow { level: usize },
}

/// Level-order k-ary numbering.
///
/// Level `i` reserves `order[i]` identifier slots below every node of level
/// `i - 1`, so all nodes of one level form a contiguous identifier block and
/// siblings are numbered consecutively. Attributes take the first slots of
/// their element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelOrderAddressing {
    order: Vec<u64>,
    start: Vec<u64>,
}

impl LevelOrderAddressing {
    /// Builds the scheme from the fan-out of every level below the root.
    ///
    /// `fan_out[0]` is the slot count below the root element, `fan_out[1]`
    /// below each node of level 1, and so on.
    pub fn new(fan_out: &[u64]) -> Result<Self, AddressingError> {
        let mut order = Vec::with_capacity(fan_out.len() + 1);
        let mut start = Vec::with_capacity(fan_out.len() + 1);
        order.push(1);
        start.push(NodeId::ROOT.raw());
        let mut count: u64 = 1;
        for (idx, &slots) in fan_out.iter().enumerate() {
            let level = idx + 1;
            if slots == 0 {
                return Err(AddressingError::ZeroFanOut { level });
            }
            let prev_start = start[level - 1];
            let next_start = prev_start.checked_add(count).ok_or(AddressingError::Overflow { level })?;
            count = count.checked_mul(slots).ok_or(AddressingError::Overflow { level })?;
            next_start.checked_add(count).ok_or(AddressingError::Overflow { level })?;
            order.push(slots);
            start.push(next_start);
        }
        Ok(Self { order, start })
    }

    /// Number of levels including the root level.
    pub fn depth(&self) -> usize {
        self.order.len()
    }

    /// Largest identifier the scheme can address.
    pub fn max_id(&self) -> NodeId {
        let last = self.depth() - 1;
        let count: u64 = self.order.iter().product();
        NodeId(self.start[last] + count - 1)
    }
}

impl NodeIdAddressing for LevelOrderAddressing {
    fn level_of(&self, id: NodeId) -> u32 {
        let idx = self.start.partition_point(|&s| s <= id.raw());
        u32::try_from(idx.saturating_sub(1)).unwrap_or(u32::MAX)
    }

    fn parent_id(&self, id: NodeId, level: u32) -> NodeId {
        let level = level as usize;
        if level == 0 || level >= self.depth() {
            return NodeId::NONE;
        }
        NodeId((id.raw() - self.start[level]) / self.order[level] + self.start[level - 1])
    }

    fn child_range(&self, parent: NodeId) -> Option<ChildRange> {
        if parent.is_none() {
            return None;
        }
        let level = self.level_of(parent) as usize;
        let child_level = level + 1;
        if child_level >= self.depth() {
            return None;
        }
        let slots = self.order[child_level];
        let first = (parent.raw() - self.start[level]) * slots + self.start[child_level];
        Some(ChildRange {
            start: NodeId(first),
            end: NodeId(first + slots - 1),
            distance: usize::try_from(slots).unwrap_or(usize::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    /// root(1) -> 2,3 -> 4,5 | 6,7
    #[fixture]
    fn binary() -> LevelOrderAddressing {
        LevelOrderAddressing::new(&[2, 2]).unwrap()
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(3, 1)]
    #[case(4, 2)]
    #[case(7, 2)]
    fn levels(binary: LevelOrderAddressing, #[case] id: u64, #[case] level: u32) {
        assert_eq!(binary.level_of(NodeId(id)), level);
    }

    #[rstest]
    #[case(2, 1)]
    #[case(3, 1)]
    #[case(4, 2)]
    #[case(5, 2)]
    #[case(6, 3)]
    #[case(7, 3)]
    fn parents(binary: LevelOrderAddressing, #[case] id: u64, #[case] parent: u64) {
        let level = binary.level_of(NodeId(id));
        assert_eq!(binary.parent_id(NodeId(id), level), NodeId(parent));
    }

    #[rstest]
    fn root_has_no_parent(binary: LevelOrderAddressing) {
        assert_eq!(binary.parent_id(NodeId::ROOT, 0), NodeId::NONE);
    }

    #[rstest]
    fn child_ranges(binary: LevelOrderAddressing) {
        let root = binary.child_range(NodeId::ROOT).unwrap();
        assert_eq!((root.start, root.end, root.distance), (NodeId(2), NodeId(3), 2));
        let second = binary.child_range(NodeId(3)).unwrap();
        assert_eq!((second.start, second.end), (NodeId(6), NodeId(7)));
        assert!(binary.child_range(NodeId(6)).is_none());
        assert_eq!(binary.max_id(), NodeId(7));
    }

    #[rstest]
    fn document_order_differs_from_numeric_order() {
        // root(a(x), b): ids root=1, a=2, b=3, x=4
        let scheme = LevelOrderAddressing::new(&[2, 1]).unwrap();
        let mut ids = vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)];
        ids.sort_by(|a, b| scheme.compare_document_order(*a, *b));
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(4), NodeId(3)]);
    }

    #[rstest]
    fn ancestry(binary: LevelOrderAddressing) {
        assert!(binary.is_ancestor(NodeId(1), NodeId(6)));
        assert!(binary.is_ancestor(NodeId(3), NodeId(7)));
        assert!(!binary.is_ancestor(NodeId(2), NodeId(7)));
        assert!(!binary.is_ancestor(NodeId(6), NodeId(6)));
        assert_eq!(binary.compare_document_order(NodeId(3), NodeId(7)), Ordering::Less);
        assert_eq!(binary.compare_document_order(NodeId(5), NodeId(3)), Ordering::Less);
    }

    #[rstest]
    fn rejects_zero_fan_out() {
        assert_eq!(LevelOrderAddressing::new(&[2, 0]), Err(AddressingError::ZeroFanOut { level: 2 }));
    }
}
