//! Sparse weighted adjacency construction and persistence for the ruvector
//! ecosystem.
//!
//! This crate builds and stores the weighted directed graphs consumed by
//! graph-closure and path-similarity engines. Edge weights come from the
//! in-degree of each edge's destination, mapped into `(0, 1]` with
//! `1 / (x + 1)`.
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`sparse`] | in-degree, similarity, weighted adjacency, `.npz` load/save |
//! | [`types`] | `Coord`, `CsrMatrix`, `CscMatrix`, `SparseMatrix` |
//! | [`coords`] | coordinate files and sources, nested-map conversions |
//! | [`npy`] | `.npy` header codec, reader, memory-mapped writer |
//! | [`npz`] | `.npz` bundles |
//! | [`chunked`] | chunked zstd-compressed array store |
//! | [`cache`] | bounded LRU cache |
//! | [`grouping`] | `group_by` and run-length expansion |
//!
//! # Example
//!
//! ```rust
//! use ruvector_adjacency::sparse::build_weighted_adjacency;
//! use ruvector_adjacency::types::Coord;
//!
//! // 0 -> 1, 1 -> 2, 2 -> 1
//! let edges = vec![
//!     Coord::new(0, 1, 1.0),
//!     Coord::new(1, 2, 1.0),
//!     Coord::new(2, 1, 1.0),
//! ];
//! let adj = build_weighted_adjacency(&edges, 3).unwrap();
//!
//! // Node 1 has in-degree 2, so edges into it weigh 1/3.
//! assert_eq!(adj.get(0, 1), Some(&(1.0 / 3.0)));
//! assert_eq!(adj.get(1, 2), Some(&0.5));
//! ```

pub mod cache;
pub mod chunked;
pub mod config;
pub mod coords;
pub mod error;
pub mod grouping;
pub mod npy;
pub mod npz;
pub mod sparse;
pub mod types;
pub mod validation;

pub use error::{AdjacencyError, Result};
