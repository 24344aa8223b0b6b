//! Criterion benchmarks for graph_core path analysis.
//!
//! Measures critical-path and sensitivity-path analysis on layered DAGs of
//! increasing size to characterise scaling behaviour.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use graph_core::{critical_path, layered_graph, search_nodes, sensitivity_paths};

/// Benchmark critical path (topological sort + longest distance).
fn bench_critical_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("critical_path");

    for size in [1_000, 10_000, 50_000] {
        let graph = layered_graph(size, 12, 7).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| critical_path(black_box(graph)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark sensitivity paths (one BFS per target).
fn bench_sensitivity_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("sensitivity_paths");

    for size in [500, 2_000] {
        let graph = layered_graph(size, 6, 11).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| sensitivity_paths(black_box(graph)));
        });
    }

    group.finish();
}

/// Benchmark fuzzy search over node ids and labels.
fn bench_search(c: &mut Criterion) {
    let graph = layered_graph(10_000, 8, 3).unwrap();
    c.bench_function("search_nodes_10000", |b| {
        b.iter(|| search_nodes(black_box(&graph), black_box("L3_12"), 20));
    });
}

criterion_group!(
    benches,
    bench_critical_path,
    bench_sensitivity_paths,
    bench_search
);
criterion_main!(benches);
