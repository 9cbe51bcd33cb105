//! Chunked, compressed array store.
//!
//! A store is a directory. Each array lives under `<root>/<name>/` with a
//! `meta.json` document (shape, chunk shape, element descriptor, compression
//! level) and one zstd-compressed file per written chunk, named
//! `c.<i>.<j>...` after its position in the chunk grid. Chunks never written
//! read back as zeros. Edge chunks are stored at full chunk size.
//!
//! By default chunks are kept compressed in memory and written out on
//! [`ChunkedArray::flush`], [`ChunkedArray::close`] or drop. With
//! `persist_to_disk` every chunk write goes straight to its file. An array
//! created without a destination lives in a private temporary directory that
//! is removed when the array is closed or dropped.
//!
//! Chunk payloads are raw element bytes in the descriptor's byte order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{AdjacencyError, Result};
use crate::npy::{Descriptor, Element, IntoDescriptor};

/// zstd level used unless configured otherwise.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 5;

/// Chunk shape for row-at-a-time writers of wide 2-D arrays.
pub const DEFAULT_CHUNK_SHAPE: (usize, usize) = (1, 10_000);

const META_FILE: &str = "meta.json";

/// Storage options for [`create_chunked_array_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedArrayOptions {
    /// zstd compression level (1..=22).
    pub compression_level: i32,
    /// Write every chunk to disk immediately instead of buffering in memory.
    pub persist_to_disk: bool,
}

impl Default for ChunkedArrayOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            persist_to_disk: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArrayMeta {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
    descr: Descriptor,
    compression_level: i32,
}

/// Handle to one chunked array. Single writer; not synchronised.
pub struct ChunkedArray {
    name: String,
    dir: PathBuf,
    meta: ArrayMeta,
    persist_to_disk: bool,
    /// Compressed chunks not yet written to `dir`.
    pending: BTreeMap<Vec<usize>, Vec<u8>>,
    temp: Option<TempDir>,
    closed: bool,
}

/// Create an array with the default compression level.
///
/// `destination` is the store directory; `None` selects a temporary store.
/// See [`create_chunked_array_with`].
pub fn create_chunked_array(
    name: &str,
    shape: &[usize],
    chunk_shape: &[usize],
    descriptor: impl IntoDescriptor,
    destination: Option<&Path>,
    persist_to_disk: bool,
) -> Result<ChunkedArray> {
    create_chunked_array_with(
        name,
        shape,
        chunk_shape,
        descriptor,
        destination,
        ChunkedArrayOptions {
            persist_to_disk,
            ..ChunkedArrayOptions::default()
        },
    )
}

/// Create (or truncate) the array `name` inside the store at `destination`.
///
/// # Errors
///
/// - [`AdjacencyError::InvalidShape`] if `shape` is empty, has a zero
///   dimension, or differs in rank from `chunk_shape` (which must be
///   positive too).
/// - [`AdjacencyError::InvalidParameter`] for an empty name, a name with
///   `.`/`..` or empty components, a compression level outside 1..=22, or a
///   name whose directory contains another array (`"a"` over `"a/b"`).
/// - [`AdjacencyError::UnsupportedDescriptor`] for unresolvable descriptors.
pub fn create_chunked_array_with(
    name: &str,
    shape: &[usize],
    chunk_shape: &[usize],
    descriptor: impl IntoDescriptor,
    destination: Option<&Path>,
    options: ChunkedArrayOptions,
) -> Result<ChunkedArray> {
    validate_name(name)?;
    validate_shapes(shape, chunk_shape)?;
    if !(1..=22).contains(&options.compression_level) {
        return Err(AdjacencyError::parameter(
            "compression_level",
            options.compression_level,
            "1..=22",
        ));
    }
    let descr = descriptor.into_descriptor()?;

    let (temp, root) = match destination {
        Some(root) => (None, root.to_path_buf()),
        None => {
            let temp = tempfile::Builder::new().prefix("adjacency-store-").tempdir()?;
            let root = temp.path().to_path_buf();
            (Some(temp), root)
        }
    };

    let dir = root.join(name);
    if dir.exists() {
        if holds_nested_array(&dir)? {
            return Err(AdjacencyError::parameter(
                "name",
                format!("{name:?}"),
                "a name whose directory holds no other array",
            ));
        }
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;

    let meta = ArrayMeta {
        shape: shape.to_vec(),
        chunk_shape: chunk_shape.to_vec(),
        descr,
        compression_level: options.compression_level,
    };
    fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?)?;

    debug!(
        name,
        dir = %dir.display(),
        ?shape,
        ?chunk_shape,
        temporary = temp.is_some(),
        persist_to_disk = options.persist_to_disk,
        "chunked array created"
    );

    Ok(ChunkedArray {
        name: name.to_string(),
        dir,
        meta,
        persist_to_disk: options.persist_to_disk,
        pending: BTreeMap::new(),
        temp,
        closed: false,
    })
}

/// Reopen a persisted array. The handle writes straight to disk.
///
/// # Errors
///
/// [`AdjacencyError::NotFound`] if no array called `name` exists under
/// `root`.
pub fn open_chunked_array(root: &Path, name: &str) -> Result<ChunkedArray> {
    validate_name(name)?;
    let dir = root.join(name);
    let meta_path = dir.join(META_FILE);
    if !meta_path.is_file() {
        return Err(AdjacencyError::NotFound(format!(
            "chunked array '{name}' under {}",
            root.display()
        )));
    }
    let meta: ArrayMeta = serde_json::from_slice(&fs::read(&meta_path)?)?;
    validate_shapes(&meta.shape, &meta.chunk_shape)?;
    debug!(name, dir = %dir.display(), shape = ?meta.shape, "chunked array opened");

    Ok(ChunkedArray {
        name: name.to_string(),
        dir,
        meta,
        persist_to_disk: true,
        pending: BTreeMap::new(),
        temp: None,
        closed: false,
    })
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('/')
        && name.split('/').all(|part| !part.is_empty() && part != "." && part != "..")
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(AdjacencyError::parameter(
            "name",
            format!("{name:?}"),
            "non-empty '/'-separated components other than '.' and '..'",
        ))
    }
}

/// Whether any directory below `dir` carries array metadata.
fn holds_nested_array(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && (path.join(META_FILE).is_file() || holds_nested_array(&path)?) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn validate_shapes(shape: &[usize], chunk_shape: &[usize]) -> Result<()> {
    if shape.is_empty() {
        return Err(AdjacencyError::InvalidShape(
            "shape must have at least one dimension".to_string(),
        ));
    }
    if shape.len() != chunk_shape.len() {
        return Err(AdjacencyError::InvalidShape(format!(
            "chunk shape {chunk_shape:?} does not match the rank of {shape:?}"
        )));
    }
    if shape.contains(&0) || chunk_shape.contains(&0) {
        return Err(AdjacencyError::InvalidShape(format!(
            "shape {shape:?} and chunk shape {chunk_shape:?} must be positive"
        )));
    }
    Ok(())
}

impl ChunkedArray {
    /// Array name within its store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the array's metadata and chunks.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Array dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.meta.shape
    }

    /// Chunk dimensions.
    pub fn chunk_shape(&self) -> &[usize] {
        &self.meta.chunk_shape
    }

    /// Element layout.
    pub fn descriptor(&self) -> &Descriptor {
        &self.meta.descr
    }

    /// zstd level used for chunk payloads.
    pub fn compression_level(&self) -> i32 {
        self.meta.compression_level
    }

    /// Number of chunks along each dimension.
    pub fn chunk_grid(&self) -> Vec<usize> {
        self.meta
            .shape
            .iter()
            .zip(&self.meta.chunk_shape)
            .map(|(&n, &c)| n.div_ceil(c))
            .collect()
    }

    /// Uncompressed size of one chunk in bytes.
    pub fn chunk_nbytes(&self) -> usize {
        self.meta.chunk_shape.iter().product::<usize>() * self.meta.descr.itemsize()
    }

    fn check_index(&self, index: &[usize]) -> Result<()> {
        let grid = self.chunk_grid();
        if index.len() != grid.len() || index.iter().zip(&grid).any(|(&i, &g)| i >= g) {
            return Err(AdjacencyError::parameter(
                "chunk index",
                format!("{index:?}"),
                format!("an index inside the chunk grid {grid:?}"),
            ));
        }
        Ok(())
    }

    fn chunk_path(&self, index: &[usize]) -> PathBuf {
        let parts: Vec<String> = index.iter().map(|i| i.to_string()).collect();
        self.dir.join(format!("c.{}", parts.join(".")))
    }

    /// Compress and store one chunk.
    ///
    /// # Errors
    ///
    /// - [`AdjacencyError::InvalidParameter`] for an index outside the grid.
    /// - [`AdjacencyError::LengthMismatch`] unless `bytes` is exactly
    ///   [`chunk_nbytes`](Self::chunk_nbytes) long.
    pub fn write_chunk(&mut self, index: &[usize], bytes: &[u8]) -> Result<()> {
        self.check_index(index)?;
        let expected = self.chunk_nbytes();
        if bytes.len() != expected {
            return Err(AdjacencyError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let compressed = zstd::encode_all(bytes, self.meta.compression_level)?;
        debug!(
            name = %self.name,
            ?index,
            raw = bytes.len(),
            compressed = compressed.len(),
            "chunk written"
        );
        if self.persist_to_disk {
            fs::write(self.chunk_path(index), &compressed)?;
        } else {
            self.pending.insert(index.to_vec(), compressed);
        }
        Ok(())
    }

    /// Decompressed bytes of one chunk; zeros if it was never written.
    pub fn read_chunk(&self, index: &[usize]) -> Result<Vec<u8>> {
        self.check_index(index)?;
        let expected = self.chunk_nbytes();
        let raw = match self.pending.get(index) {
            Some(buf) => zstd::decode_all(buf.as_slice())?,
            None => {
                let path = self.chunk_path(index);
                if !path.is_file() {
                    return Ok(vec![0u8; expected]);
                }
                zstd::decode_all(fs::read(path)?.as_slice())?
            }
        };
        if raw.len() != expected {
            return Err(AdjacencyError::Format(format!(
                "chunk {index:?} of '{}' holds {} bytes, expected {expected}",
                self.name,
                raw.len()
            )));
        }
        Ok(raw)
    }

    fn check_row_access<T: Element>(&self, row: usize) -> Result<(usize, usize)> {
        let (rows, cols) = match self.meta.shape.as_slice() {
            [r, c] => (*r, *c),
            other => {
                return Err(AdjacencyError::InvalidShape(format!(
                    "row access needs a 2-d array, found shape {other:?}"
                )))
            }
        };
        match self.meta.descr.as_scalar() {
            Some(s) if T::matches(s) && s.is_native() => {}
            _ => {
                return Err(AdjacencyError::UnsupportedDescriptor(format!(
                    "array holds {} but native {} was requested",
                    self.meta.descr,
                    T::scalar_type()
                )))
            }
        }
        if row >= rows {
            return Err(AdjacencyError::parameter("row", row, format!("< {rows}")));
        }
        Ok((rows, cols))
    }

    /// Overwrite one row of a 2-D array, touching every chunk it spans.
    pub fn set_row<T: Element>(&mut self, row: usize, values: &[T]) -> Result<()> {
        let (_, cols) = self.check_row_access::<T>(row)?;
        if values.len() != cols {
            return Err(AdjacencyError::LengthMismatch {
                expected: cols,
                actual: values.len(),
            });
        }
        let (cr, cc) = (self.meta.chunk_shape[0], self.meta.chunk_shape[1]);
        let item = std::mem::size_of::<T>();
        let local_row = row % cr;

        for cj in 0..cols.div_ceil(cc) {
            let index = [row / cr, cj];
            let first = cj * cc;
            let last = (first + cc).min(cols);
            let mut chunk = self.read_chunk(&index)?;
            let start = local_row * cc * item;
            let src: &[u8] = bytemuck::cast_slice(&values[first..last]);
            chunk[start..start + src.len()].copy_from_slice(src);
            self.write_chunk(&index, &chunk)?;
        }
        Ok(())
    }

    /// Read one row of a 2-D array.
    pub fn row<T: Element>(&self, row: usize) -> Result<Vec<T>> {
        let (_, cols) = self.check_row_access::<T>(row)?;
        let (cr, cc) = (self.meta.chunk_shape[0], self.meta.chunk_shape[1]);
        let item = std::mem::size_of::<T>();
        let local_row = row % cr;

        let mut out = Vec::with_capacity(cols);
        for cj in 0..cols.div_ceil(cc) {
            let width = (cols - cj * cc).min(cc);
            let chunk = self.read_chunk(&[row / cr, cj])?;
            let start = local_row * cc * item;
            out.extend(
                chunk[start..start + width * item]
                    .chunks_exact(item)
                    .map(bytemuck::pod_read_unaligned::<T>),
            );
        }
        Ok(out)
    }

    /// Write buffered chunks to disk.
    ///
    /// A chunk leaves the buffer only once its file is written, so a failed
    /// flush can be retried without losing data.
    pub fn flush(&mut self) -> Result<()> {
        let count = self.pending.len();
        while let Some((index, compressed)) = self.pending.first_key_value() {
            fs::write(self.chunk_path(index), compressed)?;
            let index = index.clone();
            self.pending.remove(&index);
        }
        if count > 0 {
            debug!(name = %self.name, chunks = count, "chunked array flushed");
        }
        Ok(())
    }

    /// Flush and release the array. A temporary store is deleted.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        if self.temp.is_none() {
            self.flush()?;
        }
        if let Some(temp) = self.temp.take() {
            temp.close()?;
        }
        Ok(())
    }
}

impl Drop for ChunkedArray {
    fn drop(&mut self) {
        if self.closed || self.temp.is_some() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(name = %self.name, error = %e, "failed to flush chunked array on drop");
        }
    }
}

impl std::fmt::Debug for ChunkedArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedArray")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("shape", &self.meta.shape)
            .field("chunk_shape", &self.meta.chunk_shape)
            .field("descr", &self.meta.descr)
            .field("pending", &self.pending.len())
            .field("temporary", &self.temp.is_some())
            .finish()
    }
}
