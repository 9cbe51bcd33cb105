//! Sparse conversion pipeline.
//!
//! Coordinates are turned into compressed matrices, column sums give the
//! in-degree of every node, and the in-degree is mapped to a similarity in
//! `(0, 1]` with `1 / (x + 1)`. [`build_weighted_adjacency`] composes these
//! steps: every edge `(u, v)` is re-weighted with the similarity of its
//! destination `v`, so edges into popular nodes become weaker.
//!
//! Row-compressed matrices persist as `.npz` bundles with the `indices`,
//! `indptr`, `data`, `format` and `shape` entries that SciPy's
//! `save_npz`/`load_npz` use.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::coords::CoordinateSource;
use crate::error::{AdjacencyError, Result};
use crate::npy::{NpyArray, NpyHeader};
use crate::npz::{ArrayBundle, NpzArchive, NpzWriter};
use crate::types::{Coord, CsrMatrix, SparseFormat, SparseMatrix};
use crate::validation::validate_csr_matrix;

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Build a compressed matrix from coordinates.
///
/// Duplicate positions are summed and explicit zeros are kept. Without an
/// explicit `shape` the matrix is sized `(max(row) + 1, max(col) + 1)`.
///
/// # Errors
///
/// - [`AdjacencyError::InvalidShape`] for an empty list without a shape.
/// - [`AdjacencyError::ShapeMismatch`] if a coordinate lies outside `shape`.
pub fn coords_to_matrix(
    coords: &[Coord],
    shape: Option<(usize, usize)>,
    format: SparseFormat,
) -> Result<SparseMatrix> {
    let (rows, cols) = match shape {
        Some(shape) => shape,
        None => infer_shape(coords)?,
    };
    let csr = CsrMatrix::from_coo(rows, cols, coords.iter().map(|c| (c.row, c.col, c.weight)))?;
    debug!(rows, cols, nnz = csr.nnz(), %format, "coordinates converted");
    Ok(match format {
        SparseFormat::Csr => SparseMatrix::Csr(csr),
        SparseFormat::Csc => SparseMatrix::Csc(csr.to_csc()),
    })
}

fn infer_shape(coords: &[Coord]) -> Result<(usize, usize)> {
    let rows = coords.iter().map(|c| c.row).max();
    let cols = coords.iter().map(|c| c.col).max();
    match (rows, cols) {
        (Some(r), Some(c)) => Ok((r + 1, c + 1)),
        _ => Err(AdjacencyError::InvalidShape(
            "cannot infer the shape of an empty coordinate list".to_string(),
        )),
    }
}

/// In-degree of every node: the column sums of `adj`.
pub fn in_degree(adj: &SparseMatrix) -> Vec<f64> {
    adj.column_sums()
}

/// Map a non-negative distance to a similarity: `1 / (x + 1)`.
///
/// # Errors
///
/// [`AdjacencyError::NegativeInput`] for negative or NaN input. Values are
/// never clamped.
#[inline]
pub fn distance_to_similarity(x: f64) -> Result<f64> {
    if x.is_nan() || x < 0.0 {
        return Err(AdjacencyError::NegativeInput(x));
    }
    Ok(1.0 / (x + 1.0))
}

/// Elementwise [`distance_to_similarity`]; fails on the first invalid value.
pub fn distances_to_similarity(xs: &[f64]) -> Result<Vec<f64>> {
    xs.iter().map(|&x| distance_to_similarity(x)).collect()
}

/// Build the weighted adjacency matrix of an `n`-node graph.
///
/// 1. load the coordinates from `source` (their weights are ignored),
/// 2. build the unweighted `(n, n)` matrix, one unit per coordinate,
/// 3. take the in-degree and map it to similarities,
/// 4. weight each edge `(u, v)` with `similarity[v]`,
/// 5. rebuild the row-compressed matrix from the re-weighted edges.
///
/// Duplicate coordinates count once per occurrence in the in-degree and
/// their similarity weights are summed in the result.
///
/// # Errors
///
/// - [`AdjacencyError::InvalidShape`] if `n == 0`.
/// - [`AdjacencyError::ShapeMismatch`] if an index is `>= n`.
/// - Any error raised by `source`.
#[instrument(skip(source))]
pub fn build_weighted_adjacency<S>(source: &S, n: usize) -> Result<CsrMatrix<f64>>
where
    S: CoordinateSource + ?Sized,
{
    if n == 0 {
        return Err(AdjacencyError::InvalidShape(
            "a weighted adjacency matrix needs at least one node".to_string(),
        ));
    }
    let coords = source.load_coords()?;
    let shape = Some((n, n));

    let unweighted: Vec<Coord> = coords.iter().map(|c| Coord::new(c.row, c.col, 1.0)).collect();
    let adj = coords_to_matrix(&unweighted, shape, SparseFormat::Csc)?;
    let similarity = distances_to_similarity(&in_degree(&adj))?;

    let reweighted: Vec<Coord> = coords
        .iter()
        .map(|c| Coord::new(c.row, c.col, similarity[c.col]))
        .collect();
    let weighted = coords_to_matrix(&reweighted, shape, SparseFormat::Csr)?.into_csr();

    info!(n, edges = coords.len(), nnz = weighted.nnz(), "weighted adjacency built");
    Ok(weighted)
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Load a row-compressed matrix from an `.npz` file.
///
/// See [`load_row_compressed_from`].
pub fn load_row_compressed(path: impl AsRef<Path>) -> Result<CsrMatrix<f64>> {
    let mut archive = NpzArchive::open(path.as_ref())?;
    load_row_compressed_from(&mut archive)
}

/// Load a row-compressed matrix from any bundle holding `indices`, `indptr`
/// and optionally `data` and `shape`.
///
/// A missing `data` entry means every stored value is `1.0`. Without a
/// `shape` entry the matrix is square with `len(indptr) - 1` rows.
///
/// # Errors
///
/// - [`AdjacencyError::MissingField`] if `indices` or `indptr` is absent.
/// - [`AdjacencyError::Format`] for negative indices or a `shape` entry that
///   disagrees with `indptr`.
/// - [`AdjacencyError::InvalidMatrix`] if the arrays do not form a valid
///   compressed-row structure.
pub fn load_row_compressed_from<B: ArrayBundle + ?Sized>(bundle: &mut B) -> Result<CsrMatrix<f64>> {
    let col_indices = to_usize(bundle.read_array("indices")?.to_i64_vec()?)?;
    let row_ptr = to_usize(bundle.read_array("indptr")?.to_i64_vec()?)?;
    if row_ptr.is_empty() {
        return Err(AdjacencyError::Format("indptr must not be empty".to_string()));
    }
    let rows = row_ptr.len() - 1;

    let values = if bundle.contains("data") {
        bundle.read_array("data")?.to_f64_vec()?
    } else {
        vec![1.0; col_indices.len()]
    };

    let cols = if bundle.contains("shape") {
        let shape = to_usize(bundle.read_array("shape")?.to_i64_vec()?)?;
        match shape.as_slice() {
            [r, c] if *r == rows => *c,
            other => {
                return Err(AdjacencyError::Format(format!(
                    "shape entry {other:?} does not match {rows} rows"
                )))
            }
        }
    } else {
        rows
    };

    let matrix = CsrMatrix {
        row_ptr,
        col_indices,
        values,
        rows,
        cols,
    };
    validate_csr_matrix(&matrix)?;
    debug!(rows, cols, nnz = matrix.nnz(), "row-compressed matrix loaded");
    Ok(matrix)
}

fn to_usize(values: Vec<i64>) -> Result<Vec<usize>> {
    values
        .into_iter()
        .map(|v| {
            usize::try_from(v)
                .map_err(|_| AdjacencyError::Format(format!("negative index {v}")))
        })
        .collect()
}

/// Save a row-compressed matrix as an `.npz` file readable by
/// [`load_row_compressed`] and by SciPy's `load_npz`.
///
/// Index arrays are stored as `<i4` when every value fits, otherwise as
/// `<i8`.
pub fn save_row_compressed(path: impl AsRef<Path>, matrix: &CsrMatrix<f64>) -> Result<()> {
    let wide = matrix.nnz() > i32::MAX as usize || matrix.cols > i32::MAX as usize;
    let index_code = if wide { "<i8" } else { "<i4" };

    let mut writer = NpzWriter::create(path.as_ref())?;
    writer.add_array("indices", &index_array(&matrix.col_indices, index_code)?)?;
    writer.add_array("indptr", &index_array(&matrix.row_ptr, index_code)?)?;
    writer.add_array("format", &NpyArray::byte_string(b"csr"))?;
    writer.add_array("shape", &index_array(&[matrix.rows, matrix.cols], "<i8")?)?;
    writer.add_array("data", &float_array(&matrix.values)?)?;
    writer.finish()?;

    debug!(
        path = %path.as_ref().display(),
        rows = matrix.rows,
        nnz = matrix.nnz(),
        "row-compressed matrix saved"
    );
    Ok(())
}

fn index_array(values: &[usize], code: &str) -> Result<NpyArray> {
    let mut data = Vec::with_capacity(values.len() * 8);
    for &v in values {
        if code == "<i4" {
            let v = i32::try_from(v)
                .map_err(|_| AdjacencyError::parameter("index", v, "<= i32::MAX"))?;
            data.extend_from_slice(&v.to_le_bytes());
        } else {
            let v = i64::try_from(v)
                .map_err(|_| AdjacencyError::parameter("index", v, "<= i64::MAX"))?;
            data.extend_from_slice(&v.to_le_bytes());
        }
    }
    let header = NpyHeader::new(code.parse()?, false, vec![values.len()]);
    NpyArray::new(header, data)
}

fn float_array(values: &[f64]) -> Result<NpyArray> {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    NpyArray::new(NpyHeader::new("<f8".parse()?, false, vec![values.len()]), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npz::MemoryBundle;

    #[test]
    fn similarity_of_zero_is_one() {
        assert_eq!(distance_to_similarity(0.0).unwrap(), 1.0);
        assert_eq!(distance_to_similarity(3.0).unwrap(), 0.25);
    }

    #[test]
    fn similarity_rejects_negative_and_nan() {
        assert!(matches!(
            distance_to_similarity(-0.5),
            Err(AdjacencyError::NegativeInput(x)) if x == -0.5
        ));
        assert!(distance_to_similarity(f64::NAN).is_err());
        assert!(distances_to_similarity(&[0.0, -1.0]).is_err());
    }

    #[test]
    fn inferred_shape() {
        let m = coords_to_matrix(&[Coord::new(2, 4, 1.0)], None, SparseFormat::Csr).unwrap();
        assert_eq!(m.shape(), (3, 5));
        assert!(matches!(
            coords_to_matrix(&[], None, SparseFormat::Csr),
            Err(AdjacencyError::InvalidShape(_))
        ));
    }

    #[test]
    fn csc_output_tagged() {
        let m =
            coords_to_matrix(&[Coord::new(0, 1, 2.0)], Some((2, 2)), SparseFormat::Csc).unwrap();
        assert_eq!(m.format(), SparseFormat::Csc);
        assert_eq!(in_degree(&m), vec![0.0, 2.0]);
    }

    #[test]
    fn zero_nodes_rejected() {
        let coords: Vec<Coord> = Vec::new();
        assert!(matches!(
            build_weighted_adjacency(&coords, 0),
            Err(AdjacencyError::InvalidShape(_))
        ));
    }

    #[test]
    fn load_without_data_gives_ones() {
        let mut bundle = MemoryBundle::new();
        bundle.insert("indices", NpyArray::from_slice(&[3], &[1i32, 2, 0]).unwrap());
        bundle.insert("indptr", NpyArray::from_slice(&[4], &[0i32, 1, 2, 3]).unwrap());
        let m = load_row_compressed_from(&mut bundle).unwrap();
        assert_eq!((m.rows, m.cols), (3, 3));
        assert_eq!(m.values, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn load_requires_indices_and_indptr() {
        let mut bundle = MemoryBundle::new();
        bundle.insert("indptr", NpyArray::from_slice(&[1], &[0i32]).unwrap());
        assert!(matches!(
            load_row_compressed_from(&mut bundle),
            Err(AdjacencyError::MissingField(f)) if f == "indices"
        ));
    }

    #[test]
    fn load_rejects_broken_structure() {
        let mut bundle = MemoryBundle::new();
        bundle.insert("indices", NpyArray::from_slice(&[1], &[5i32]).unwrap());
        bundle.insert("indptr", NpyArray::from_slice(&[2], &[0i32, 1]).unwrap());
        assert!(matches!(
            load_row_compressed_from(&mut bundle),
            Err(AdjacencyError::InvalidMatrix(_))
        ));
    }
}
