//! Failure paths of step construction and evaluation.

use std::sync::Arc;

use rstest::rstest;
use xstep_store_mock::{DocumentSpec, MemoryStore, NodeSpec};
use xstep_xpath::{Axis, IndexError, LocationStep, NodeFilter, NodeId, NodeSet, NodeTest, QName, StepError};

fn store_with_document() -> (Arc<MemoryStore>, NodeSet) {
    let store = Arc::new(MemoryStore::new());
    let root = NodeSpec::elem("root").with_child(NodeSpec::elem("a")).with_child(NodeSpec::elem("a"));
    let doc = store.add_document(DocumentSpec::new("/db/err.xml", root)).unwrap();
    let input = store.node(doc.id(), NodeId::ROOT).into_iter().collect();
    (store, input)
}

#[rstest]
fn namespace_axis_is_rejected_at_build_time() {
    let (store, _) = store_with_document();
    let err = LocationStep::builder(Axis::Namespace, NodeTest::node()).build(store.services()).unwrap_err();
    assert_eq!(err, StepError::UnsupportedAxis(Axis::Namespace));
    assert_eq!(err.to_string(), "unsupported axis: namespace");
}

#[rstest]
#[case::pushdown(false)]
#[case::preload(true)]
fn index_failures_propagate(#[case] preload: bool) {
    let (store, mut input) = store_with_document();
    let mut step = LocationStep::builder(Axis::Child, NodeTest::element(QName::local("a")))
        .preload(preload)
        .build(store.services())
        .unwrap();
    store.fail_next_lookup();

    let err = step.eval(&mut input).unwrap_err();
    assert!(matches!(err, StepError::Index(IndexError::Io { .. })), "unexpected error: {err:?}");
    assert!(err.to_string().contains("injected failure"));
    assert!(!step.has_cached_result());

    let found = step.eval(&mut input).unwrap().into_node_set().raw_len();
    assert_eq!(found, 2);
}

#[rstest]
fn predicate_errors_propagate() {
    let (store, mut input) = store_with_document();
    let failing = NodeFilter::fallible("always-fails", |_| Err(StepError::predicate("no value")));
    let mut step = LocationStep::builder(Axis::Child, NodeTest::any_element())
        .with_predicate(failing)
        .build(store.services())
        .unwrap();
    assert_eq!(step.eval(&mut input).unwrap_err(), StepError::predicate("no value"));
}

#[rstest]
fn unknown_documents_contribute_nothing() {
    let (store, mut input) = store_with_document();
    let doc = input.document_set().ids().next().unwrap();
    let mut step = LocationStep::builder(Axis::Descendant, NodeTest::element(QName::local("a")))
        .build(store.services())
        .unwrap();
    assert!(store.remove_document(doc));
    assert!(step.eval(&mut input).unwrap().into_node_set().is_empty());
}
