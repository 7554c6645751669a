use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use xstep_store_mock::{DocumentSpec, MemoryStore, NodeSpec};
use xstep_xpath::{Axis, LocationStep, NodeId, NodeSet, NodeTest, QName, Relation};

fn create_catalog(sections: usize, items: usize) -> DocumentSpec {
    let mut root = NodeSpec::elem("catalog");
    for i in 0..sections {
        let mut section = NodeSpec::elem("section").with_attr("id", format!("s{i}"));
        for j in 0..items {
            let item = NodeSpec::elem("item")
                .with_attr("n", j.to_string())
                .with_child(NodeSpec::elem("title").with_text(format!("Item {j} of section {i}")))
                .with_child(NodeSpec::elem("price").with_text("9.99"));
            section = section.with_child(item);
        }
        root = root.with_child(section);
    }
    DocumentSpec::new(format!("/db/catalog-{sections}x{items}.xml"), root)
}

fn benchmark_sorting(c: &mut Criterion) {
    let store = MemoryStore::new();
    let doc = store.add_document(create_catalog(50, 40)).unwrap();
    let mut group = c.benchmark_group("node_set_sort");

    for count in [100usize, 1_000, 10_000] {
        let nodes: Vec<_> = store
            .nodes_named(doc.id(), "title")
            .into_iter()
            .chain(store.nodes_named(doc.id(), "item"))
            .cycle()
            .take(count)
            .collect();
        group.bench_with_input(BenchmarkId::new("by_id", count), &nodes, |b, nodes| {
            b.iter(|| {
                let mut set: NodeSet = nodes.iter().rev().cloned().collect();
                set.sort();
                black_box(set.raw_len())
            })
        });
        group.bench_with_input(BenchmarkId::new("document_order", count), &nodes, |b, nodes| {
            b.iter(|| {
                let mut set: NodeSet = nodes.iter().cloned().collect();
                black_box(set.iter_document_order().count())
            })
        });
    }
    group.finish();
}

fn benchmark_joins(c: &mut Criterion) {
    let store = MemoryStore::new();
    let doc = store.add_document(create_catalog(50, 40)).unwrap();
    let mut titles: NodeSet = store.nodes_named(doc.id(), "title").into_iter().collect();
    let sections: NodeSet = store.nodes_named(doc.id(), "section").into_iter().collect();
    let items: NodeSet = store.nodes_named(doc.id(), "item").into_iter().collect();

    let mut group = c.benchmark_group("node_set_joins");
    group.bench_function("parent_child", |b| {
        b.iter(|| black_box(titles.select_parent_child(&items, Relation::Descendant, false).raw_len()))
    });
    group.bench_function("ancestor_descendant", |b| {
        b.iter(|| black_box(titles.select_ancestor_descendant(&sections, Relation::Descendant, false, true).raw_len()))
    });
    group.bench_function("ancestors", |b| {
        b.iter(|| black_box(titles.select_ancestors(&sections, false, false).raw_len()))
    });
    group.finish();
}

fn benchmark_steps(c: &mut Criterion) {
    let store = Arc::new(MemoryStore::new());
    let doc = store.add_document(create_catalog(50, 40)).unwrap();
    let root: NodeSet = store.node(doc.id(), NodeId::ROOT).into_iter().collect();
    let title = || NodeTest::element(QName::local("title"));

    let mut group = c.benchmark_group("location_step");
    let cases = [
        ("pushdown", LocationStep::builder(Axis::Descendant, title())),
        ("preload", LocationStep::builder(Axis::Descendant, title()).preload(true)),
        ("streaming", LocationStep::builder(Axis::Descendant, NodeTest::any_element())),
    ];
    for (label, builder) in cases {
        let mut step = builder.build(store.services()).unwrap();
        group.bench_function(BenchmarkId::new("descendant_uncached", label), |b| {
            b.iter(|| {
                step.reset_state();
                let mut input = root.clone();
                black_box(step.eval(&mut input).unwrap().into_node_set().raw_len())
            })
        });
    }

    let mut cached = LocationStep::builder(Axis::Descendant, title()).build(store.services()).unwrap();
    let mut input = root.clone();
    group.bench_function("descendant_cached", |b| {
        b.iter(|| black_box(cached.eval(&mut input).unwrap().into_node_set().raw_len()))
    });
    group.finish();
}

criterion_group!(benches, benchmark_sorting, benchmark_joins, benchmark_steps);
criterion_main!(benches);
