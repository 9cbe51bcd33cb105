//! Structural validation for compressed sparse matrices.
//!
//! Matrices assembled from persisted `indices`/`indptr`/`data` arrays are
//! checked eagerly, so callers receive a clear [`ValidationError`] instead of
//! an index panic deep inside a later computation. [`ValidationError`]
//! converts into [`AdjacencyError::InvalidMatrix`](crate::error::AdjacencyError::InvalidMatrix)
//! via `From`.

use crate::error::ValidationError;
use crate::types::CsrMatrix;

/// Validate the structural integrity of a CSR matrix.
///
/// Performs the following checks in order:
///
/// 1. `row_ptr` length equals `rows + 1`.
/// 2. `row_ptr` is monotonically non-decreasing.
/// 3. `row_ptr[0] == 0` and `row_ptr[rows] == nnz`.
/// 4. `col_indices` length equals `values` length.
/// 5. All column indices are less than `cols`.
/// 6. No `NaN` or `Inf` values.
/// 7. Column indices are sorted within each row (emits a [`tracing::warn`] if
///    not, but does not error).
///
/// # Errors
///
/// Returns [`ValidationError`] describing the first violation found.
///
/// # Examples
///
/// ```
/// use ruvector_adjacency::types::CsrMatrix;
/// use ruvector_adjacency::validation::validate_csr_matrix;
///
/// let m = CsrMatrix::<f64>::from_coo(2, 2, vec![(0, 0, 1.0), (1, 1, 2.0)]).unwrap();
/// assert!(validate_csr_matrix(&m).is_ok());
/// ```
pub fn validate_csr_matrix(matrix: &CsrMatrix<f64>) -> Result<(), ValidationError> {
    // 1. row_ptr length
    let expected_row_ptr_len = matrix.rows + 1;
    if matrix.row_ptr.len() != expected_row_ptr_len {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr length {} does not equal rows + 1 = {}",
            matrix.row_ptr.len(),
            expected_row_ptr_len,
        )));
    }

    // 2. monotonicity
    for i in 1..matrix.row_ptr.len() {
        if matrix.row_ptr[i] < matrix.row_ptr[i - 1] {
            return Err(ValidationError::NonMonotonicRowPtrs { position: i });
        }
    }

    // 3. boundary values
    if matrix.row_ptr[0] != 0 {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr[0] = {} (expected 0)",
            matrix.row_ptr[0],
        )));
    }
    let nnz = matrix.values.len();
    let expected_nnz = matrix.row_ptr[matrix.rows];
    if expected_nnz != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "values length {} does not match row_ptr[rows] = {}",
            nnz, expected_nnz,
        )));
    }

    // 4. col_indices vs values
    if matrix.col_indices.len() != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "col_indices length {} does not match values length {}",
            matrix.col_indices.len(),
            nnz,
        )));
    }

    // 5-7. per-entry checks
    for row in 0..matrix.rows {
        let mut prev_col: Option<usize> = None;
        for idx in matrix.row_ptr[row]..matrix.row_ptr[row + 1] {
            let col = matrix.col_indices[idx];
            if col >= matrix.cols {
                return Err(ValidationError::IndexOutOfBounds {
                    index: col,
                    row,
                    cols: matrix.cols,
                });
            }

            let val = matrix.values[idx];
            if !val.is_finite() {
                return Err(ValidationError::NonFiniteValue(format!(
                    "matrix[{}, {}] = {}",
                    row, col, val,
                )));
            }

            if let Some(pc) = prev_col {
                if col < pc {
                    tracing::warn!(
                        row = row,
                        "column indices not sorted within row (col {} follows {})",
                        col,
                        pc,
                    );
                }
            }
            prev_col = Some(col);
        }
    }

    Ok(())
}
