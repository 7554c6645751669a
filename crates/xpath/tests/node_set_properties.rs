use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use xstep_core::LevelOrderAddressing;
use xstep_xpath::{Document, DocumentId, DocumentRef, NodeId, NodeProxy, NodeSet, Relation};

/// Three documents sharing a ternary scheme of depth four (ids 1..=40).
fn docs() -> Vec<DocumentRef> {
    let scheme = Arc::new(LevelOrderAddressing::new(&[3, 3, 3]).unwrap());
    (1..=3).map(|d| Document::new(DocumentId(d), format!("/db/p{d}.xml"), scheme.clone())).collect()
}

fn build(docs: &[DocumentRef], entries: &[(usize, u64)]) -> NodeSet {
    entries.iter().map(|&(d, id)| NodeProxy::element(docs[d].clone(), NodeId(id))).collect()
}

fn keys(set: &mut NodeSet) -> Vec<(u32, u64)> {
    set.iter().map(|n| (n.document_id().raw(), n.id().raw())).collect()
}

fn entries() -> impl Strategy<Value = Vec<(usize, u64)>> {
    prop::collection::vec((0usize..3, 1u64..=40), 0..60)
}

// Property: sorting yields each distinct node once, ordered by document then identifier.
proptest! {
    #[test]
    fn prop_sort_is_strict_and_complete(entries in entries()) {
        let docs = docs();
        let mut set = build(&docs, &entries);
        let expected: BTreeSet<(u32, u64)> = entries.iter().map(|&(d, id)| (d as u32 + 1, id)).collect();
        let sorted = keys(&mut set);
        prop_assert!(sorted.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(sorted, expected.into_iter().collect::<Vec<_>>());
        prop_assert!(set.is_sorted_by_id());
        prop_assert!(!set.is_in_document_order());
    }
}

// Property: sorting twice changes neither content nor revision.
proptest! {
    #[test]
    fn prop_sort_is_idempotent(entries in entries()) {
        let docs = docs();
        let mut set = build(&docs, &entries);
        let first = keys(&mut set);
        let revision = set.revision();
        set.sort();
        prop_assert_eq!(keys(&mut set), first);
        prop_assert_eq!(set.revision(), revision);
    }
}

// Property: document order is a strict order consistent with the addressing scheme.
proptest! {
    #[test]
    fn prop_document_order_is_strict(entries in entries()) {
        let docs = docs();
        let mut set = build(&docs, &entries);
        let distinct = set.len();
        let ordered: Vec<NodeProxy> = set.iter_document_order().cloned().collect();
        prop_assert!(set.is_in_document_order());
        prop_assert!(!set.is_sorted_by_id());
        prop_assert_eq!(ordered.len(), distinct);
        for pair in ordered.windows(2) {
            prop_assert!(pair[0].compare_document_order(&pair[1]).is_lt());
        }
    }
}

// Property: a range holds exactly the members within its bounds.
proptest! {
    #[test]
    fn prop_range_is_bounded_subset(entries in entries(), lower in 1u64..=40, width in 0u64..20) {
        let docs = docs();
        let mut set = build(&docs, &entries);
        let upper = lower + width;
        let mut range = set.range(DocumentId(1), NodeId(lower), NodeId(upper));
        let got = keys(&mut range);
        let expected: Vec<(u32, u64)> =
            keys(&mut set).into_iter().filter(|&(d, id)| d == 1 && (lower..=upper).contains(&id)).collect();
        prop_assert_eq!(got, expected);
    }
}

// Property: the child join keeps exactly the candidates whose parent is in the context.
proptest! {
    #[test]
    fn prop_child_join_matches_parent_lookup(candidates in entries(), context in entries()) {
        let docs = docs();
        let mut candidate_set = build(&docs, &candidates);
        let context_set = build(&docs, &context);
        let mut joined = candidate_set.select_parent_child(&context_set, Relation::Descendant, false);
        let expected: Vec<(u32, u64)> = candidate_set
            .iter()
            .filter(|n| {
                let parent = n.parent_id();
                !parent.is_none() && context_set.nodes().any(|c| c.document_id() == n.document_id() && c.id() == parent)
            })
            .map(|n| (n.document_id().raw(), n.id().raw()))
            .collect();
        prop_assert_eq!(keys(&mut joined), expected);
    }
}

// Property: every node added can be found and removed again.
proptest! {
    #[test]
    fn prop_membership_follows_mutation(entries in entries()) {
        let docs = docs();
        let mut set = build(&docs, &entries);
        for &(d, id) in &entries {
            prop_assert!(set.contains(DocumentId(d as u32 + 1), NodeId(id)));
        }
        if let Some(&(d, id)) = entries.first() {
            let node = NodeProxy::element(docs[d].clone(), NodeId(id));
            prop_assert!(set.remove(&node));
            prop_assert!(!set.contains(DocumentId(d as u32 + 1), NodeId(id)));
            prop_assert!(!set.remove(&node));
        }
    }
}
