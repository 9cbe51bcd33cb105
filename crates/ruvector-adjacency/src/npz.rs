//! Named bundles of arrays (`.npz` archives).
//!
//! An `.npz` file is a zip archive whose members are `<name>.npy` files.
//! [`ArrayBundle`] is the contract the sparse loader relies on; it is
//! implemented for [`NpzArchive`] (on-disk archives) and [`MemoryBundle`]
//! (arrays assembled in memory). [`NpzWriter`] produces archives that NumPy's
//! `np.load` reads directly.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use tracing::debug;
use zip::write::FileOptions;
use zip::CompressionMethod;

use crate::error::{AdjacencyError, Result};
use crate::npy::{read_npy, NpyArray};

/// A container of named arrays.
pub trait ArrayBundle {
    /// Whether an array called `name` is present.
    fn contains(&self, name: &str) -> bool;

    /// Load the array called `name`.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::MissingField`] if no such array exists.
    fn read_array(&mut self, name: &str) -> Result<NpyArray>;

    /// Names of all arrays, sorted.
    fn names(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// NpzArchive
// ---------------------------------------------------------------------------

/// Read access to an `.npz` archive.
pub struct NpzArchive<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
}

impl NpzArchive<BufReader<File>> {
    /// Open an `.npz` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> NpzArchive<R> {
    /// Wrap any seekable reader holding a zip archive.
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: zip::ZipArchive::new(reader)?,
        })
    }

    fn member(&self, name: &str) -> Option<String> {
        let with_ext = format!("{name}.npy");
        self.archive
            .file_names()
            .find(|m| *m == with_ext || *m == name)
            .map(str::to_string)
    }
}

impl<R: Read + Seek> ArrayBundle for NpzArchive<R> {
    fn contains(&self, name: &str) -> bool {
        self.member(name).is_some()
    }

    fn read_array(&mut self, name: &str) -> Result<NpyArray> {
        let member = self
            .member(name)
            .ok_or_else(|| AdjacencyError::MissingField(name.to_string()))?;
        let file = self.archive.by_name(&member)?;
        read_npy(file)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .map(|m| m.strip_suffix(".npy").unwrap_or(m).to_string())
            .collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// MemoryBundle
// ---------------------------------------------------------------------------

/// Arrays held in memory under their names.
#[derive(Debug, Clone, Default)]
pub struct MemoryBundle {
    arrays: BTreeMap<String, NpyArray>,
}

impl MemoryBundle {
    /// Empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an array.
    pub fn insert(&mut self, name: impl Into<String>, array: NpyArray) -> Option<NpyArray> {
        self.arrays.insert(name.into(), array)
    }

    /// Borrow an array without copying.
    pub fn get(&self, name: &str) -> Option<&NpyArray> {
        self.arrays.get(name)
    }
}

impl ArrayBundle for MemoryBundle {
    fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    fn read_array(&mut self, name: &str) -> Result<NpyArray> {
        self.arrays
            .get(name)
            .cloned()
            .ok_or_else(|| AdjacencyError::MissingField(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.arrays.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// NpzWriter
// ---------------------------------------------------------------------------

/// Writes arrays into a new `.npz` archive.
pub struct NpzWriter<W: Write + Seek> {
    zip: zip::ZipWriter<W>,
    method: CompressionMethod,
}

impl NpzWriter<File> {
    /// Create (or truncate) an `.npz` file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(File::create(path.as_ref())?))
    }
}

impl<W: Write + Seek> NpzWriter<W> {
    /// Start an archive on `writer`. Members are stored uncompressed, like
    /// `np.savez`.
    pub fn new(writer: W) -> Self {
        Self {
            zip: zip::ZipWriter::new(writer),
            method: CompressionMethod::Stored,
        }
    }

    /// Deflate members, like `np.savez_compressed`.
    pub fn compressed(mut self) -> Self {
        self.method = CompressionMethod::Deflated;
        self
    }

    /// Append `array` as `<name>.npy`.
    pub fn add_array(&mut self, name: &str, array: &NpyArray) -> Result<()> {
        let large = array.bytes().len() as u64 >= u64::from(u32::MAX);
        let options = FileOptions::default()
            .compression_method(self.method)
            .large_file(large);
        self.zip.start_file(format!("{name}.npy"), options)?;
        array.write_to(&mut self.zip)?;
        debug!(name, bytes = array.bytes().len(), "npz member written");
        Ok(())
    }

    /// Write the central directory and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}
