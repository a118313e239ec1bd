//! # Store Benchmarks
//!
//! Node/edge creation and filtered reads on both engines.
//!
//! Run with: `cargo bench -p orbgraph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use orbgraph_core::{Backend, Edge, EdgeFilter, Graph, Node, NodeFilter, Services};
use std::hint::black_box;
use std::sync::Arc;

const ENGINES: [(&str, &str); 2] = [("memory", ":memory:"), ("sqlite", "sqlite://:memory:")];

/// Open `dsn` and fill one graph with a chain of `size` nodes.
fn chain(dsn: &str, size: usize) -> (Services<Backend>, String) {
    let services = Services::new(Arc::new(Backend::open(dsn).expect("open")));
    let mut graph = Graph::new();
    services.graphs.create_graph(&mut graph).expect("graph");

    for i in 0..size {
        let mut node = Node::new()
            .with_uid(format!("n{i}"))
            .with_label(if i % 2 == 0 { "Even" } else { "Odd" });
        services
            .nodes
            .create_node(&graph.uid, &mut node)
            .expect("node");
        if i > 0 {
            let mut edge = Edge::new(format!("n{}", i - 1), format!("n{i}"));
            services
                .edges
                .create_edge(&graph.uid, &mut edge)
                .expect("edge");
        }
    }

    (services, graph.uid)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_node_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_creation");

    for (engine, dsn) in ENGINES {
        for size in [100, 1000] {
            group.bench_with_input(BenchmarkId::new(engine, size), &size, |b, &size| {
                b.iter(|| black_box(chain(dsn, size)));
            });
        }
    }

    group.finish();
}

fn bench_node_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_lookup");

    for (engine, dsn) in ENGINES {
        let (services, graph) = chain(dsn, 1000);
        group.bench_function(BenchmarkId::new(engine, "by_uid"), |b| {
            b.iter(|| black_box(services.nodes.find_node_by_uid(&graph, "n500")));
        });
        group.bench_function(BenchmarkId::new(engine, "by_label_page"), |b| {
            let filter = NodeFilter {
                label: Some("Even".to_string()),
                offset: 100,
                limit: 20,
                ..NodeFilter::default()
            };
            b.iter(|| black_box(services.nodes.find_nodes(&graph, &filter)));
        });
    }

    group.finish();
}

fn bench_edge_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_scan");

    for (engine, dsn) in ENGINES {
        let (services, graph) = chain(dsn, 1000);
        let filter = EdgeFilter {
            source: Some("n500".to_string()),
            ..EdgeFilter::default()
        };
        group.bench_function(BenchmarkId::new(engine, "out_of"), |b| {
            b.iter(|| black_box(services.edges.find_edges(&graph, &filter)));
        });
        group.bench_function(BenchmarkId::new(engine, "all"), |b| {
            b.iter(|| black_box(services.edges.find_edges(&graph, &EdgeFilter::default())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_node_creation, bench_node_lookup, bench_edge_scan);
criterion_main!(benches);
