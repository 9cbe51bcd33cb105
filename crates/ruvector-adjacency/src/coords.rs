//! Coordinate lists: on-disk coordinate files, coordinate sources, and
//! conversions from nested maps.
//!
//! A coordinate file is an `.npy` array of packed `(row, col, weight)`
//! records laid out as [`COO_DESCRIPTOR`]. Plain two-dimensional numeric
//! arrays with three columns are accepted as well.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::debug;

use crate::error::{AdjacencyError, Result};
use crate::grouping::group_by;
use crate::npy::{read_npy_file, write_npy_file, Descriptor, NpyArray, NpyHeader};
use crate::types::Coord;

/// Record layout of a coordinate file: `row` and `col` as little-endian
/// `i32`, `weight` as little-endian `f64`.
pub const COO_DESCRIPTOR: &[(&str, &str)] = &[("row", "<i4"), ("col", "<i4"), ("weight", "<f8")];

/// The [`Descriptor`] built from [`COO_DESCRIPTOR`].
pub fn coo_descriptor() -> Result<Descriptor> {
    Descriptor::record(COO_DESCRIPTOR)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Anything that can produce a coordinate list.
pub trait CoordinateSource {
    /// Load every coordinate.
    fn load_coords(&self) -> Result<Vec<Coord>>;
}

impl CoordinateSource for [Coord] {
    fn load_coords(&self) -> Result<Vec<Coord>> {
        Ok(self.to_vec())
    }
}

impl CoordinateSource for Vec<Coord> {
    fn load_coords(&self) -> Result<Vec<Coord>> {
        Ok(self.clone())
    }
}

impl<S: CoordinateSource + ?Sized> CoordinateSource for &S {
    fn load_coords(&self) -> Result<Vec<Coord>> {
        (**self).load_coords()
    }
}

/// A coordinate file on disk, read lazily by [`CoordinateSource::load_coords`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateFile {
    path: PathBuf,
}

impl CoordinateFile {
    /// Refer to the coordinate file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CoordinateSource for CoordinateFile {
    fn load_coords(&self) -> Result<Vec<Coord>> {
        read_coordinate_file(&self.path)
    }
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

/// Read a coordinate file.
///
/// # Errors
///
/// - [`AdjacencyError::MissingField`] if a record array lacks `row`, `col`
///   or `weight`.
/// - [`AdjacencyError::Format`] for negative or non-integral indices, or an
///   array that is neither a record vector nor an `(n, 3)` matrix.
pub fn read_coordinate_file(path: impl AsRef<Path>) -> Result<Vec<Coord>> {
    let array = read_npy_file(path.as_ref())?;
    let coords = coords_from_array(&array)?;
    debug!(path = %path.as_ref().display(), count = coords.len(), "coordinate file loaded");
    Ok(coords)
}

/// Decode coordinates from an already loaded array.
pub fn coords_from_array(array: &NpyArray) -> Result<Vec<Coord>> {
    match array.descriptor() {
        Descriptor::Record(_) => coords_from_records(array),
        Descriptor::Scalar(_) => coords_from_matrix(array),
        Descriptor::Bytes(_) => Err(AdjacencyError::Format(
            "a byte-string array holds no coordinates".to_string(),
        )),
    }
}

fn coords_from_records(array: &NpyArray) -> Result<Vec<Coord>> {
    let descr = array.descriptor();
    let field = |name: &str| {
        descr
            .field(name)
            .map(|f| (f.dtype, f.offset))
            .ok_or_else(|| AdjacencyError::MissingField(name.to_string()))
    };
    let (row_t, row_off) = field("row")?;
    let (col_t, col_off) = field("col")?;
    let (w_t, w_off) = field("weight")?;

    array
        .elements()
        .map(|rec| {
            let row = to_index(row_t.read_i64(&rec[row_off..row_off + row_t.size])?)?;
            let col = to_index(col_t.read_i64(&rec[col_off..col_off + col_t.size])?)?;
            let weight = w_t.read_f64(&rec[w_off..w_off + w_t.size]);
            Ok(Coord { row, col, weight })
        })
        .collect()
}

fn coords_from_matrix(array: &NpyArray) -> Result<Vec<Coord>> {
    let n = match array.shape() {
        [n, 3] => *n,
        [_, _] => {
            return Err(AdjacencyError::Format(
                "expecting three columns (row, col, weight)".to_string(),
            ))
        }
        _ => {
            return Err(AdjacencyError::Format(format!(
                "expecting a 2-d array or a record array, found shape {:?}",
                array.shape()
            )))
        }
    };
    let values = array.to_f64_vec()?;
    let at = |i: usize, j: usize| {
        if array.fortran_order() {
            values[j * n + i]
        } else {
            values[i * 3 + j]
        }
    };
    (0..n)
        .map(|i| {
            Ok(Coord {
                row: float_index(at(i, 0))?,
                col: float_index(at(i, 1))?,
                weight: at(i, 2),
            })
        })
        .collect()
}

fn to_index(v: i64) -> Result<usize> {
    usize::try_from(v).map_err(|_| AdjacencyError::Format(format!("negative index {v}")))
}

fn float_index(v: f64) -> Result<usize> {
    if !v.is_finite() || v.fract() != 0.0 || v < 0.0 {
        return Err(AdjacencyError::Format(format!(
            "index must be a non-negative integer, found {v}"
        )));
    }
    Ok(v as usize)
}

/// Write `coords` as a [`COO_DESCRIPTOR`] record file.
///
/// # Errors
///
/// [`AdjacencyError::InvalidParameter`] if an index does not fit in `i32`.
pub fn write_coordinate_file(path: impl AsRef<Path>, coords: &[Coord]) -> Result<()> {
    let descr = coo_descriptor()?;
    let mut data = Vec::with_capacity(coords.len() * descr.itemsize());
    for c in coords {
        let row = i32::try_from(c.row)
            .map_err(|_| AdjacencyError::parameter("row", c.row, "<= i32::MAX"))?;
        let col = i32::try_from(c.col)
            .map_err(|_| AdjacencyError::parameter("col", c.col, "<= i32::MAX"))?;
        data.extend_from_slice(&row.to_le_bytes());
        data.extend_from_slice(&col.to_le_bytes());
        data.extend_from_slice(&c.weight.to_le_bytes());
    }
    let array = NpyArray::new(NpyHeader::new(descr, false, vec![coords.len()]), data)?;
    write_npy_file(path.as_ref(), &array)?;
    debug!(path = %path.as_ref().display(), count = coords.len(), "coordinate file written");
    Ok(())
}

/// Coordinates as a plain `(n, 3)` `f64` array, the column layout accepted
/// by [`coords_from_array`].
pub fn coords_to_array(coords: &[Coord]) -> Result<NpyArray> {
    let flat: Vec<f64> = coords
        .iter()
        .flat_map(|c| [c.row as f64, c.col as f64, c.weight])
        .collect();
    NpyArray::from_slice(&[coords.len(), 3], &flat)
}

// ---------------------------------------------------------------------------
// Grouping and nested maps
// ---------------------------------------------------------------------------

/// Group coordinates by source row. Each list keeps input order.
pub fn adjacency_lists(coords: &[Coord]) -> BTreeMap<usize, Vec<Coord>> {
    group_by(coords.iter().copied(), |c| c.row)
}

/// Flatten a row -> (col -> weight) map into coordinates, sorted by row and
/// then column.
pub fn nested_to_coords(nested: &BTreeMap<usize, BTreeMap<usize, f64>>) -> Vec<Coord> {
    nested
        .iter()
        .flat_map(|(&row, cols)| cols.iter().map(move |(&col, &weight)| Coord { row, col, weight }))
        .collect()
}

/// Densify a row -> (col -> weight) map. Missing entries are zero.
///
/// # Errors
///
/// [`AdjacencyError::ShapeMismatch`] if a key lies outside `shape`.
pub fn nested_to_dense(
    nested: &BTreeMap<usize, BTreeMap<usize, f64>>,
    shape: (usize, usize),
) -> Result<Array2<f64>> {
    let (rows, cols) = shape;
    let mut dense = Array2::<f64>::zeros(shape);
    for (&row, entries) in nested {
        for (&col, &weight) in entries {
            if row >= rows || col >= cols {
                return Err(AdjacencyError::ShapeMismatch {
                    row,
                    col,
                    rows,
                    cols,
                });
            }
            dense[[row, col]] = weight;
        }
    }
    Ok(dense)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> BTreeMap<usize, BTreeMap<usize, f64>> {
        let mut m = BTreeMap::new();
        m.insert(2, BTreeMap::from([(0, 4.0)]));
        m.insert(0, BTreeMap::from([(2, 1.5), (1, 0.5)]));
        m
    }

    #[test]
    fn nested_to_coords_is_row_major() {
        let coords = nested_to_coords(&nested());
        assert_eq!(
            coords,
            vec![Coord::new(0, 1, 0.5), Coord::new(0, 2, 1.5), Coord::new(2, 0, 4.0)]
        );
    }

    #[test]
    fn nested_to_dense_fills_zeros() {
        let dense = nested_to_dense(&nested(), (3, 3)).unwrap();
        assert_eq!(dense[[0, 1]], 0.5);
        assert_eq!(dense[[2, 0]], 4.0);
        assert_eq!(dense[[1, 1]], 0.0);
        assert!(matches!(
            nested_to_dense(&nested(), (2, 3)),
            Err(AdjacencyError::ShapeMismatch { row: 2, .. })
        ));
    }

    #[test]
    fn adjacency_lists_group_by_row() {
        let coords = vec![Coord::new(1, 0, 1.0), Coord::new(0, 2, 1.0), Coord::new(1, 2, 2.0)];
        let lists = adjacency_lists(&coords);
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[&1], vec![Coord::new(1, 0, 1.0), Coord::new(1, 2, 2.0)]);
    }

    #[test]
    fn matrix_form_decodes() {
        let coords = vec![Coord::new(0, 1, 0.25), Coord::new(3, 2, 2.0)];
        let array = coords_to_array(&coords).unwrap();
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(coords_from_array(&array).unwrap(), coords);
    }

    #[test]
    fn matrix_form_rejects_fractional_index() {
        let array = NpyArray::from_slice(&[1, 3], &[0.5f64, 1.0, 1.0]).unwrap();
        assert!(matches!(coords_from_array(&array), Err(AdjacencyError::Format(_))));
    }

    #[test]
    fn matrix_form_rejects_wrong_columns() {
        let array = NpyArray::from_slice(&[1, 2], &[0.0f64, 1.0]).unwrap();
        assert!(matches!(coords_from_array(&array), Err(AdjacencyError::Format(_))));
    }

    #[test]
    fn record_form_rejects_negative_index() {
        let descr = coo_descriptor().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&1.0f64.to_le_bytes());
        let array = NpyArray::new(NpyHeader::new(descr, false, vec![1]), data).unwrap();
        assert!(matches!(coords_from_array(&array), Err(AdjacencyError::Format(_))));
    }

    #[test]
    fn record_form_requires_fields() {
        let descr = Descriptor::record(&[("row", "<i4"), ("col", "<i4")]).unwrap();
        let array = NpyArray::new(NpyHeader::new(descr, false, vec![0]), Vec::new()).unwrap();
        assert!(matches!(
            coords_from_array(&array),
            Err(AdjacencyError::MissingField(f)) if f == "weight"
        ));
    }
}
