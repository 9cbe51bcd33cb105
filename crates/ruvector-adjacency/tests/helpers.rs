//! Shared test helpers for the ruvector-adjacency integration test suite.
//!
//! Provides a deterministic random generator, random graph builders and a
//! dense reference implementation of the weighting rule.

#![allow(dead_code)]

use ruvector_adjacency::types::{Coord, CsrMatrix};

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Create a new LCG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next u64 value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.state
    }

    /// Generate a uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform usize in [0, n).
    pub fn next_below(&mut self, n: usize) -> usize {
        (self.next_u64() >> 33) as usize % n
    }
}

// ---------------------------------------------------------------------------
// Graph generators
// ---------------------------------------------------------------------------

/// Random directed edges over `n` nodes. Each ordered pair is kept with
/// probability `density`; no duplicates, weights in (0, 1].
pub fn random_edges(n: usize, density: f64, seed: u64) -> Vec<Coord> {
    let mut rng = Lcg::new(seed);
    let mut edges = Vec::new();
    for u in 0..n {
        for v in 0..n {
            if rng.next_f64() < density {
                edges.push(Coord::new(u, v, 1.0 - rng.next_f64()));
            }
        }
    }
    edges
}

/// Random edges with repeats: `count` draws of (u, v) over `n` nodes.
pub fn random_multi_edges(n: usize, count: usize, seed: u64) -> Vec<Coord> {
    let mut rng = Lcg::new(seed);
    (0..count)
        .map(|_| Coord::new(rng.next_below(n), rng.next_below(n), 1.0))
        .collect()
}

// ---------------------------------------------------------------------------
// Dense references
// ---------------------------------------------------------------------------

/// Densify a CSR matrix into row-major nested vectors.
pub fn to_dense(m: &CsrMatrix<f64>) -> Vec<Vec<f64>> {
    let mut dense = vec![vec![0.0; m.cols]; m.rows];
    for (i, row) in dense.iter_mut().enumerate() {
        for (j, &v) in m.row_entries(i) {
            row[j] += v;
        }
    }
    dense
}

/// Dense reference for the destination-weighted adjacency of `edges`.
pub fn reference_weighted(n: usize, edges: &[Coord]) -> Vec<Vec<f64>> {
    let mut indeg = vec![0.0f64; n];
    for e in edges {
        indeg[e.col] += 1.0;
    }
    let mut dense = vec![vec![0.0; n]; n];
    for e in edges {
        dense[e.row][e.col] += 1.0 / (indeg[e.col] + 1.0);
    }
    dense
}
