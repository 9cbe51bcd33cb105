//! Core sparse types.
//!
//! Provides [`Coord`] triplets, the [`CsrMatrix`] / [`CscMatrix`] compressed
//! layouts, and [`SparseMatrix`], the format-tagged matrix produced by the
//! conversion pipeline.

use std::fmt;
use std::ops::AddAssign;
use std::str::FromStr;

use crate::error::{AdjacencyError, Result};
use crate::grouping::repeat_pairs;

// ---------------------------------------------------------------------------
// Coord
// ---------------------------------------------------------------------------

/// One weighted directed edge `row -> col`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    /// Source node.
    pub row: usize,
    /// Destination node.
    pub col: usize,
    /// Edge weight.
    pub weight: f64,
}

impl Coord {
    /// Create a coordinate.
    #[inline]
    pub const fn new(row: usize, col: usize, weight: f64) -> Self {
        Self { row, col, weight }
    }
}

impl From<(usize, usize, f64)> for Coord {
    fn from((row, col, weight): (usize, usize, f64)) -> Self {
        Self { row, col, weight }
    }
}

impl From<Coord> for (usize, usize, f64) {
    fn from(c: Coord) -> Self {
        (c.row, c.col, c.weight)
    }
}

// ---------------------------------------------------------------------------
// SparseFormat
// ---------------------------------------------------------------------------

/// Compressed layout requested from [`coords_to_matrix`](crate::sparse::coords_to_matrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SparseFormat {
    /// Compressed sparse row.
    #[default]
    Csr,
    /// Compressed sparse column.
    Csc,
}

impl fmt::Display for SparseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SparseFormat::Csr => write!(f, "csr"),
            SparseFormat::Csc => write!(f, "csc"),
        }
    }
}

impl FromStr for SparseFormat {
    type Err = AdjacencyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csr" => Ok(SparseFormat::Csr),
            "csc" => Ok(SparseFormat::Csc),
            other => Err(AdjacencyError::parameter("format", other, "'csr' or 'csc'")),
        }
    }
}

// ---------------------------------------------------------------------------
// CsrMatrix<T>
// ---------------------------------------------------------------------------

/// Compressed Sparse Row (CSR) matrix.
///
/// # Layout
///
/// For a matrix with `m` rows and `nnz` stored entries:
/// - `row_ptr` has length `m + 1`
/// - `col_indices` and `values` each have length `nnz`
/// - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`
///
/// Matrices built by [`from_coo`](Self::from_coo) have sorted, unique column
/// indices within each row. Matrices loaded from disk are only guaranteed to
/// satisfy [`validate_csr_matrix`](crate::validation::validate_csr_matrix).
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    /// Row pointers: `row_ptr[i]` is the start index in `col_indices`/`values`
    /// for row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices for each stored entry.
    pub col_indices: Vec<usize>,
    /// Values for each stored entry.
    pub values: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> CsrMatrix<T> {
    /// Number of stored entries (explicit zeros included).
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of stored entries in a specific row (the out-degree for an
    /// adjacency matrix).
    #[inline]
    pub fn row_degree(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Iterate over `(col_index, &value)` pairs for the given row.
    #[inline]
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, &T)> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter())
    }

    /// Stored value at `(row, col)`, if any.
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row >= self.rows {
            return None;
        }
        self.row_entries(row).find(|(c, _)| *c == col).map(|(_, v)| v)
    }
}

impl<T: Copy + Default> CsrMatrix<T> {
    /// Transpose: produces `A^T` in CSR form.
    ///
    /// Two-pass counting sort in O(nnz + rows + cols) time. Rows of the result
    /// are sorted by column because the input rows are visited in order.
    pub fn transpose(&self) -> CsrMatrix<T> {
        let nnz = self.nnz();
        let t_rows = self.cols;
        let t_cols = self.rows;

        // Pass 1: count entries per new row (= old column).
        let mut row_ptr = vec![0usize; t_rows + 1];
        for &c in &self.col_indices {
            row_ptr[c + 1] += 1;
        }
        for i in 1..=t_rows {
            row_ptr[i] += row_ptr[i - 1];
        }

        // Pass 2: scatter.
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::default(); nnz];
        let mut cursor = row_ptr.clone();

        for row in 0..self.rows {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                let c = self.col_indices[idx];
                let dest = cursor[c];
                col_indices[dest] = row;
                values[dest] = self.values[idx];
                cursor[c] += 1;
            }
        }

        CsrMatrix {
            row_ptr,
            col_indices,
            values,
            rows: t_rows,
            cols: t_cols,
        }
    }

    /// Same matrix in compressed-column form.
    pub fn to_csc(&self) -> CscMatrix<T> {
        let t = self.transpose();
        CscMatrix {
            col_ptr: t.row_ptr,
            row_indices: t.col_indices,
            values: t.values,
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<T: Copy + Default + AddAssign> CsrMatrix<T> {
    /// Build a CSR matrix from coordinate triplets.
    ///
    /// Entries are sorted by `(row, col)`; duplicate positions are summed and
    /// explicit zeros are kept.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::ShapeMismatch`] if any entry lies outside
    /// `rows x cols`.
    pub fn from_coo(
        rows: usize,
        cols: usize,
        entries: impl IntoIterator<Item = (usize, usize, T)>,
    ) -> Result<Self> {
        let mut sorted: Vec<(usize, usize, T)> = entries.into_iter().collect();
        if let Some(&(row, col, _)) = sorted.iter().find(|(r, c, _)| *r >= rows || *c >= cols) {
            return Err(AdjacencyError::ShapeMismatch {
                row,
                col,
                rows,
                cols,
            });
        }
        // Stable, so duplicates accumulate in input order.
        sorted.sort_by_key(|(r, c, _)| (*r, *c));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<T> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;

        for (r, c, v) in sorted {
            if last == Some((r, c)) {
                if let Some(acc) = values.last_mut() {
                    *acc += v;
                }
                continue;
            }
            row_ptr[r + 1] += 1;
            col_indices.push(c);
            values.push(v);
            last = Some((r, c));
        }
        for i in 1..=rows {
            row_ptr[i] += row_ptr[i - 1];
        }

        Ok(Self {
            row_ptr,
            col_indices,
            values,
            rows,
            cols,
        })
    }

    /// Column sums: `out[j] = sum_i A[i, j]`.
    pub fn column_sums(&self) -> Vec<T> {
        let mut sums = vec![T::default(); self.cols];
        for (&c, &v) in self.col_indices.iter().zip(self.values.iter()) {
            sums[c] += v;
        }
        sums
    }
}

impl CsrMatrix<f64> {
    /// Stored entries as coordinates, in row-major storage order.
    pub fn to_coords(&self) -> Vec<Coord> {
        let row_of = repeat_pairs((0..self.rows).map(|r| (r, self.row_degree(r))));
        row_of
            .into_iter()
            .zip(self.col_indices.iter().zip(self.values.iter()))
            .map(|(row, (&col, &weight))| Coord { row, col, weight })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CscMatrix<T>
// ---------------------------------------------------------------------------

/// Compressed Sparse Column (CSC) matrix. Mirror of [`CsrMatrix`] keyed by
/// column: column `j` spans `col_ptr[j]..col_ptr[j+1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix<T> {
    /// Column pointers, length `cols + 1`.
    pub col_ptr: Vec<usize>,
    /// Row index of each stored entry.
    pub row_indices: Vec<usize>,
    /// Value of each stored entry.
    pub values: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> CscMatrix<T> {
    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over `(row_index, &value)` pairs for the given column.
    #[inline]
    pub fn col_entries(&self, col: usize) -> impl Iterator<Item = (usize, &T)> {
        let start = self.col_ptr[col];
        let end = self.col_ptr[col + 1];
        self.row_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter())
    }
}

impl<T: Copy + Default> CscMatrix<T> {
    /// Same matrix in compressed-row form.
    pub fn to_csr(&self) -> CsrMatrix<T> {
        // A CSC matrix is the CSR form of its transpose.
        CsrMatrix {
            row_ptr: self.col_ptr.clone(),
            col_indices: self.row_indices.clone(),
            values: self.values.clone(),
            rows: self.cols,
            cols: self.rows,
        }
        .transpose()
    }
}

impl<T: Copy + Default + AddAssign> CscMatrix<T> {
    /// Column sums, one pass per column slice.
    pub fn column_sums(&self) -> Vec<T> {
        (0..self.cols)
            .map(|j| {
                let mut sum = T::default();
                for (_, &v) in self.col_entries(j) {
                    sum += v;
                }
                sum
            })
            .collect()
    }
}

impl CscMatrix<f64> {
    /// Stored entries as coordinates, in column-major storage order.
    pub fn to_coords(&self) -> Vec<Coord> {
        let col_of =
            repeat_pairs((0..self.cols).map(|c| (c, self.col_ptr[c + 1] - self.col_ptr[c])));
        col_of
            .into_iter()
            .zip(self.row_indices.iter().zip(self.values.iter()))
            .map(|(col, (&row, &weight))| Coord { row, col, weight })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// SparseMatrix
// ---------------------------------------------------------------------------

/// A weighted matrix in either compressed layout.
#[derive(Debug, Clone, PartialEq)]
pub enum SparseMatrix {
    /// Row-compressed.
    Csr(CsrMatrix<f64>),
    /// Column-compressed.
    Csc(CscMatrix<f64>),
}

impl SparseMatrix {
    /// Layout tag.
    pub fn format(&self) -> SparseFormat {
        match self {
            SparseMatrix::Csr(_) => SparseFormat::Csr,
            SparseMatrix::Csc(_) => SparseFormat::Csc,
        }
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            SparseMatrix::Csr(m) => (m.rows, m.cols),
            SparseMatrix::Csc(m) => (m.rows, m.cols),
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        match self {
            SparseMatrix::Csr(m) => m.nnz(),
            SparseMatrix::Csc(m) => m.nnz(),
        }
    }

    /// Column sums.
    pub fn column_sums(&self) -> Vec<f64> {
        match self {
            SparseMatrix::Csr(m) => m.column_sums(),
            SparseMatrix::Csc(m) => m.column_sums(),
        }
    }

    /// Stored entries as coordinates.
    pub fn to_coords(&self) -> Vec<Coord> {
        match self {
            SparseMatrix::Csr(m) => m.to_coords(),
            SparseMatrix::Csc(m) => m.to_coords(),
        }
    }

    /// Convert (or unwrap) into compressed-row form.
    pub fn into_csr(self) -> CsrMatrix<f64> {
        match self {
            SparseMatrix::Csr(m) => m,
            SparseMatrix::Csc(m) => m.to_csr(),
        }
    }

    /// Borrow the CSR form, if this is one.
    pub fn as_csr(&self) -> Option<&CsrMatrix<f64>> {
        match self {
            SparseMatrix::Csr(m) => Some(m),
            SparseMatrix::Csc(_) => None,
        }
    }

    /// Borrow the CSC form, if this is one.
    pub fn as_csc(&self) -> Option<&CscMatrix<f64>> {
        match self {
            SparseMatrix::Csc(m) => Some(m),
            SparseMatrix::Csr(_) => None,
        }
    }
}

impl From<CsrMatrix<f64>> for SparseMatrix {
    fn from(m: CsrMatrix<f64>) -> Self {
        SparseMatrix::Csr(m)
    }
}

impl From<CscMatrix<f64>> for SparseMatrix {
    fn from(m: CscMatrix<f64>) -> Self {
        SparseMatrix::Csc(m)
    }
}
