//! Error types for the adjacency crate.
//!
//! Every failure in this crate is a deterministic input-validation or I/O
//! failure; nothing is retried internally. [`AdjacencyError`] is the primary
//! error type and [`ValidationError`] carries structural problems found while
//! checking a compressed sparse matrix. All errors implement
//! `std::error::Error` via `thiserror`.

/// Primary error type for adjacency construction and persistence.
#[derive(Debug, thiserror::Error)]
pub enum AdjacencyError {
    /// A shape is empty or has a non-positive dimension, or could not be
    /// inferred.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// A coordinate lies outside the declared matrix shape.
    #[error("coordinate ({row}, {col}) out of bounds for shape ({rows}, {cols})")]
    ShapeMismatch {
        /// Row index of the offending coordinate.
        row: usize,
        /// Column index of the offending coordinate.
        col: usize,
        /// Declared number of rows.
        rows: usize,
        /// Declared number of columns.
        cols: usize,
    },

    /// An element type code does not resolve to a fixed-width numeric layout,
    /// or does not match the element type requested by the caller.
    #[error("unsupported element descriptor: {0}")]
    UnsupportedDescriptor(String),

    /// A required array entry is absent from a loaded container.
    #[error("missing field '{0}' in array container")]
    MissingField(String),

    /// A cache lookup missed.
    #[error("key not found: {0}")]
    NotFound(String),

    /// The distance transform was given a negative (or NaN) distance.
    #[error("distance must be non-negative, got {0}")]
    NegativeInput(f64),

    /// Two sequences that must pair up element-for-element differ in length.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length of the reference sequence.
        expected: usize,
        /// Length of the sequence that did not match.
        actual: usize,
    },

    /// A parameter is outside its valid range.
    #[error("parameter out of range: {name} = {value} (expected {expected})")]
    InvalidParameter {
        /// Name of the parameter.
        name: String,
        /// The invalid value, rendered as a string.
        value: String,
        /// Human-readable description of the valid range.
        expected: String,
    },

    /// Malformed on-disk data (bad magic, unparsable header, truncated
    /// payload, negative stored indices).
    #[error("malformed data: {0}")]
    Format(String),

    /// A loaded sparse matrix failed structural validation.
    #[error("invalid matrix: {0}")]
    InvalidMatrix(#[from] ValidationError),

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reading or writing an `.npz` archive.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Failure encoding or decoding JSON metadata or configuration.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdjacencyError>;

/// Structural errors for compressed sparse matrices.
///
/// Raised when a matrix assembled from persisted `indices`/`indptr`/`data`
/// arrays violates the compressed-row invariants, before any caller touches
/// the data.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Array lengths are inconsistent (e.g. `row_ptr` length vs rows).
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),

    /// A column index is out of bounds for the declared number of columns.
    #[error("column index {index} out of bounds for {cols} columns (row {row})")]
    IndexOutOfBounds {
        /// Offending column index.
        index: usize,
        /// Row containing the offending entry.
        row: usize,
        /// Declared column count.
        cols: usize,
    },

    /// The `row_ptr` array is not monotonically non-decreasing.
    #[error("row_ptr is not monotonically non-decreasing at position {position}")]
    NonMonotonicRowPtrs {
        /// Position in `row_ptr` where the violation was detected.
        position: usize,
    },
}

impl AdjacencyError {
    pub(crate) fn parameter(
        name: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        AdjacencyError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}
