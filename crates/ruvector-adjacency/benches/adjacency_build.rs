//! Benchmarks for weighted adjacency construction and `.npz` persistence.
//!
//! Graphs are random directed edge lists with a fixed seed, so results are
//! comparable across runs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ruvector_adjacency::sparse::{
    build_weighted_adjacency, coords_to_matrix, load_row_compressed, save_row_compressed,
};
use ruvector_adjacency::types::{Coord, SparseFormat};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `edges` random directed edges over `n` nodes. Repeats are allowed.
fn random_edges(n: usize, edges: usize, seed: u64) -> Vec<Coord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..edges)
        .map(|_| Coord::new(rng.gen_range(0..n), rng.gen_range(0..n), 1.0))
        .collect()
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

fn weighted_adjacency(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_adjacency");
    group.warm_up_time(Duration::from_secs(3));
    group.sample_size(50);

    for (n, avg_degree) in [(1_000, 8), (10_000, 8), (100_000, 4)] {
        let edges = random_edges(n, n * avg_degree, 42);
        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::new("build", n), &n, |b, &n| {
            b.iter(|| build_weighted_adjacency(criterion::black_box(&edges), n));
        });
    }
    group.finish();
}

fn csr_vs_csc(c: &mut Criterion) {
    let mut group = c.benchmark_group("coords_to_matrix");
    group.sample_size(50);

    let n = 10_000;
    let edges = random_edges(n, n * 8, 43);
    group.throughput(Throughput::Elements(edges.len() as u64));
    for format in [SparseFormat::Csr, SparseFormat::Csc] {
        group.bench_with_input(BenchmarkId::new(format.to_string(), n), &format, |b, &f| {
            b.iter(|| coords_to_matrix(criterion::black_box(&edges), Some((n, n)), f));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn npz_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("npz");
    group.sample_size(20);

    let dir = tempfile::Builder::new()
        .prefix("adjacency-bench")
        .tempdir()
        .expect("tempdir");
    let path = dir.path().join("adj.npz");

    let n = 10_000;
    let adj = build_weighted_adjacency(&random_edges(n, n * 8, 44), n).expect("build");
    group.throughput(Throughput::Elements(adj.nnz() as u64));

    group.bench_function("save", |b| {
        b.iter(|| save_row_compressed(&path, criterion::black_box(&adj)).expect("save"));
    });
    save_row_compressed(&path, &adj).expect("save");
    group.bench_function("load", |b| {
        b.iter(|| load_row_compressed(criterion::black_box(&path)).expect("load"));
    });
    group.finish();
}

criterion_group!(adjacency, weighted_adjacency, csr_vs_csc, npz_round_trip);
criterion_main!(adjacency);
