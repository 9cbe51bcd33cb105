//! Integration tests for the sparse pipeline: coordinate conversion,
//! in-degree, similarity, weighted adjacency and `.npz` persistence.

mod helpers;

use approx::assert_relative_eq;
use proptest::prelude::*;
use tempfile::Builder;

use ruvector_adjacency::coords::{write_coordinate_file, CoordinateFile};
use ruvector_adjacency::npy::NpyArray;
use ruvector_adjacency::npz::{ArrayBundle, MemoryBundle, NpzArchive};
use ruvector_adjacency::sparse::{
    build_weighted_adjacency, coords_to_matrix, distance_to_similarity, distances_to_similarity,
    in_degree, load_row_compressed, load_row_compressed_from, save_row_compressed,
};
use ruvector_adjacency::types::{Coord, CsrMatrix, SparseFormat};
use ruvector_adjacency::AdjacencyError;

use helpers::{random_edges, random_multi_edges, reference_weighted, to_dense};

fn chain() -> Vec<Coord> {
    // 0 -> 1, 1 -> 2, 2 -> 1
    vec![
        Coord::new(0, 1, 1.0),
        Coord::new(1, 2, 1.0),
        Coord::new(2, 1, 1.0),
    ]
}

// ---------------------------------------------------------------------------
// Conversion and in-degree
// ---------------------------------------------------------------------------

#[test]
fn test_in_degree_of_chain() {
    let adj = coords_to_matrix(&chain(), Some((3, 3)), SparseFormat::Csc).unwrap();
    assert_eq!(adj.format(), SparseFormat::Csc);
    assert_eq!(in_degree(&adj), vec![0.0, 2.0, 1.0]);

    let sim = distances_to_similarity(&in_degree(&adj)).unwrap();
    assert_relative_eq!(sim[0], 1.0);
    assert_relative_eq!(sim[1], 1.0 / 3.0);
    assert_relative_eq!(sim[2], 0.5);
}

#[test]
fn test_in_degree_without_edges() {
    let adj = coords_to_matrix(&[], Some((4, 4)), SparseFormat::Csr).unwrap();
    assert_eq!(adj.nnz(), 0);
    assert_eq!(in_degree(&adj), vec![0.0; 4]);
}

#[test]
fn test_shape_inferred_from_coordinates() {
    let adj = coords_to_matrix(&[Coord::new(4, 1, 2.0)], None, SparseFormat::Csr).unwrap();
    assert_eq!(adj.shape(), (5, 2));

    let err = coords_to_matrix(&[], None, SparseFormat::Csr).unwrap_err();
    assert!(matches!(err, AdjacencyError::InvalidShape(_)));
}

#[test]
fn test_out_of_range_coordinate() {
    let err = coords_to_matrix(&[Coord::new(0, 3, 1.0)], Some((3, 3)), SparseFormat::Csr)
        .unwrap_err();
    assert!(matches!(err, AdjacencyError::ShapeMismatch { .. }));
}

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

#[test]
fn test_similarity_values() {
    assert_eq!(distance_to_similarity(0.0).unwrap(), 1.0);
    assert_eq!(distance_to_similarity(1.0).unwrap(), 0.5);
    assert_relative_eq!(distance_to_similarity(3.0).unwrap(), 0.25);
    assert!(distance_to_similarity(f64::INFINITY).unwrap() == 0.0);
}

#[test]
fn test_similarity_rejects_negative_and_nan() {
    assert!(matches!(
        distance_to_similarity(-0.5),
        Err(AdjacencyError::NegativeInput(x)) if x == -0.5
    ));
    assert!(matches!(
        distance_to_similarity(f64::NAN),
        Err(AdjacencyError::NegativeInput(_))
    ));
    assert!(distances_to_similarity(&[0.0, 1.0, -1.0]).is_err());
}

proptest! {
    #[test]
    fn prop_similarity_in_unit_interval(x in 0.0f64..1e12) {
        let s = distance_to_similarity(x).unwrap();
        prop_assert!(s > 0.0 && s <= 1.0);
    }

    #[test]
    fn prop_similarity_monotone(a in 0.0f64..1e6, b in 0.0f64..1e6) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(distance_to_similarity(lo).unwrap() >= distance_to_similarity(hi).unwrap());
    }
}

// ---------------------------------------------------------------------------
// Weighted adjacency
// ---------------------------------------------------------------------------

#[test]
fn test_weighted_chain() {
    let adj = build_weighted_adjacency(&chain(), 3).unwrap();
    assert_eq!(adj.nnz(), 3);
    assert_relative_eq!(*adj.get(0, 1).unwrap(), 1.0 / 3.0);
    assert_relative_eq!(*adj.get(1, 2).unwrap(), 0.5);
    assert_relative_eq!(*adj.get(2, 1).unwrap(), 1.0 / 3.0);
    assert_eq!(adj.get(1, 1), None);
}

#[test]
fn test_weight_follows_destination() {
    // Node 2 is the only target; node 0 has no incoming edges.
    let edges = vec![Coord::new(0, 2, 1.0), Coord::new(1, 2, 1.0)];
    let adj = build_weighted_adjacency(&edges, 3).unwrap();
    assert_relative_eq!(*adj.get(0, 2).unwrap(), 1.0 / 3.0);
    assert_relative_eq!(*adj.get(1, 2).unwrap(), 1.0 / 3.0);
}

#[test]
fn test_input_weights_are_ignored() {
    let heavy: Vec<Coord> = chain()
        .into_iter()
        .map(|c| Coord::new(c.row, c.col, 42.0))
        .collect();
    assert_eq!(
        build_weighted_adjacency(&heavy, 3).unwrap(),
        build_weighted_adjacency(&chain(), 3).unwrap()
    );
}

#[test]
fn test_weighted_rejects_bad_sizes() {
    assert!(matches!(
        build_weighted_adjacency(&chain(), 0),
        Err(AdjacencyError::InvalidShape(_))
    ));
    assert!(matches!(
        build_weighted_adjacency(&chain(), 2),
        Err(AdjacencyError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_weighted_without_edges() {
    let adj = build_weighted_adjacency(&Vec::<Coord>::new(), 5).unwrap();
    assert_eq!((adj.rows, adj.cols), (5, 5));
    assert_eq!(adj.nnz(), 0);
}

#[test]
fn test_weighted_matches_dense_reference_with_duplicates() {
    for seed in [3, 11, 97] {
        let edges = random_multi_edges(9, 40, seed);
        let adj = build_weighted_adjacency(&edges, 9).unwrap();
        let expected = reference_weighted(9, &edges);
        for (got, want) in to_dense(&adj).iter().flatten().zip(expected.iter().flatten()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_weighted_from_coordinate_file() {
    let dir = Builder::new().prefix("adjacency-coords").tempdir().unwrap();
    let path = dir.path().join("edges.npy");
    write_coordinate_file(&path, &chain()).unwrap();

    let from_file = build_weighted_adjacency(&CoordinateFile::new(&path), 3).unwrap();
    assert_eq!(from_file, build_weighted_adjacency(&chain(), 3).unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_distinct_coords_survive_conversion(seed in any::<u64>(), n in 1usize..12) {
        // Generated row-major, so already in the order `to_coords` yields.
        let edges = random_edges(n, 0.4, seed);
        let csr = coords_to_matrix(&edges, Some((n, n)), SparseFormat::Csr).unwrap();
        prop_assert_eq!(csr.to_coords(), edges.clone());
        let csc = coords_to_matrix(&edges, Some((n, n)), SparseFormat::Csc).unwrap();
        prop_assert_eq!(csc.into_csr().to_coords(), edges);
    }

    #[test]
    fn prop_edge_set_recovered(seed in any::<u64>(), n in 1usize..12) {
        let edges = random_edges(n, 0.3, seed);
        let adj = build_weighted_adjacency(&edges, n).unwrap();
        prop_assert_eq!(adj.nnz(), edges.len());

        let indeg = {
            let mut d = vec![0usize; n];
            for e in &edges {
                d[e.col] += 1;
            }
            d
        };
        for e in &edges {
            let w = *adj.get(e.row, e.col).unwrap();
            prop_assert!((w - 1.0 / (indeg[e.col] as f64 + 1.0)).abs() < 1e-12);
            prop_assert!(w > 0.0 && w <= 1.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_save_load_round_trip() {
    let dir = Builder::new().prefix("adjacency-npz").tempdir().unwrap();
    let path = dir.path().join("adj.npz");

    let adj = build_weighted_adjacency(&random_edges(15, 0.25, 5), 15).unwrap();
    save_row_compressed(&path, &adj).unwrap();
    let loaded = load_row_compressed(&path).unwrap();
    assert_eq!(loaded, adj);

    let mut archive = NpzArchive::open(&path).unwrap();
    let mut names = archive.names();
    names.sort();
    assert_eq!(names, vec!["data", "format", "indices", "indptr", "shape"]);
    let format = archive.read_array("format").unwrap();
    assert_eq!(format.as_byte_string(), Some(&b"csr"[..]));
    assert_eq!(archive.read_array("shape").unwrap().to_i64_vec().unwrap(), vec![15, 15]);
}

#[test]
fn test_save_load_rectangular() {
    let dir = Builder::new().prefix("adjacency-npz").tempdir().unwrap();
    let path = dir.path().join("rect.npz");
    let m = CsrMatrix::<f64>::from_coo(2, 5, vec![(0, 4, 0.5), (1, 1, 2.0)]).unwrap();
    save_row_compressed(&path, &m).unwrap();
    assert_eq!(load_row_compressed(&path).unwrap(), m);
}

#[test]
fn test_load_without_data_uses_ones() {
    let mut bundle = MemoryBundle::new();
    bundle.insert("indices", NpyArray::from_slice(&[3], &[1i32, 2, 1]).unwrap());
    bundle.insert("indptr", NpyArray::from_slice(&[4], &[0i32, 1, 2, 3]).unwrap());

    let m = load_row_compressed_from(&mut bundle).unwrap();
    assert_eq!((m.rows, m.cols), (3, 3));
    assert_eq!(m.values, vec![1.0; 3]);
    assert_eq!(m.get(2, 1), Some(&1.0));
}

#[test]
fn test_load_missing_index_arrays() {
    let mut bundle = MemoryBundle::new();
    bundle.insert("indptr", NpyArray::from_slice(&[2], &[0i64, 0]).unwrap());
    assert!(matches!(
        load_row_compressed_from(&mut bundle),
        Err(AdjacencyError::MissingField(name)) if name == "indices"
    ));
}

#[test]
fn test_load_rejects_inconsistent_structure() {
    let mut bundle = MemoryBundle::new();
    bundle.insert("indices", NpyArray::from_slice(&[2], &[0i32, 7]).unwrap());
    bundle.insert("indptr", NpyArray::from_slice(&[3], &[0i32, 1, 2]).unwrap());
    assert!(matches!(
        load_row_compressed_from(&mut bundle),
        Err(AdjacencyError::InvalidMatrix(_))
    ));

    let mut bundle = MemoryBundle::new();
    bundle.insert("indices", NpyArray::from_slice(&[1], &[0i32]).unwrap());
    bundle.insert("indptr", NpyArray::from_slice(&[2], &[0i32, 1]).unwrap());
    bundle.insert("shape", NpyArray::from_slice(&[2], &[4i64, 4]).unwrap());
    assert!(matches!(
        load_row_compressed_from(&mut bundle),
        Err(AdjacencyError::Format(_))
    ));
}

#[test]
fn test_load_missing_file() {
    let dir = Builder::new().prefix("adjacency-npz").tempdir().unwrap();
    assert!(matches!(
        load_row_compressed(dir.path().join("absent.npz")),
        Err(AdjacencyError::Io(_))
    ));
}
