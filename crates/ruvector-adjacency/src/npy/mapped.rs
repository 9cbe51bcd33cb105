//! Memory-mapped `.npy` arrays.
//!
//! [`create_mapped_array`] writes a `.npy` preamble and header to a caller
//! owned file and returns a [`MappedArray`] over the data region, writable in
//! place. The header is encoded once into a scratch buffer so the data
//! offset is known before anything touches the sink; the sink then receives
//! the header with a single sequential write and is never seeked back.
//!
//! The mapped view aliases the file. Writes through it reach the file without
//! closing or flushing the sink; durability (`flush`) and the file's lifetime
//! remain the caller's business. If the writer fails after the header has
//! been written, the file is left truncated and should be discarded.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use super::descr::{Descriptor, Element, IntoDescriptor};
use super::header::NpyHeader;
use crate::error::{AdjacencyError, Result};

/// A writable, memory-mapped view of a `.npy` data region.
pub struct MappedArray {
    mmap: MmapMut,
    header: NpyHeader,
    data_offset: u64,
}

/// Write a `.npy` header to `sink` and map the data region that follows it.
///
/// The header is written at the sink's current position; the file is grown
/// (never shrunk) to hold the data region. `sink` must be opened for both
/// reading and writing.
///
/// # Errors
///
/// - [`AdjacencyError::InvalidShape`] if `shape` is empty or has a zero
///   dimension.
/// - [`AdjacencyError::UnsupportedDescriptor`] if `descriptor` does not
///   resolve to a fixed-width layout.
/// - [`AdjacencyError::Io`] if writing, resizing or mapping fails.
///
/// # Example
///
/// ```no_run
/// use std::fs::OpenOptions;
/// use ruvector_adjacency::npy::create_mapped_array;
///
/// let mut file = OpenOptions::new()
///     .read(true).write(true).create(true).truncate(true)
///     .open("dist.npy")?;
/// let mut view = create_mapped_array(&mut file, &[1000, 1000], "<f8", false)?;
/// view.as_mut_slice::<f64>()?[0] = 1.0;
/// view.flush()?;
/// # Ok::<(), ruvector_adjacency::error::AdjacencyError>(())
/// ```
pub fn create_mapped_array(
    sink: &mut File,
    shape: &[usize],
    descriptor: impl IntoDescriptor,
    fortran_order: bool,
) -> Result<MappedArray> {
    if shape.is_empty() {
        return Err(AdjacencyError::InvalidShape(
            "shape must have at least one dimension".to_string(),
        ));
    }
    if let Some(pos) = shape.iter().position(|&d| d == 0) {
        return Err(AdjacencyError::InvalidShape(format!(
            "dimension {pos} of shape {shape:?} is not positive"
        )));
    }
    let descriptor = descriptor.into_descriptor()?;

    let header = NpyHeader::new(descriptor, fortran_order, shape.to_vec());
    let encoded = header.encode()?;
    let data_len = header.data_len()?;

    let start = sink.stream_position()?;
    let data_offset = start + encoded.len() as u64;
    sink.write_all(&encoded)?;

    let end = data_offset + data_len as u64;
    if sink.metadata()?.len() < end {
        sink.set_len(end)?;
    }

    // SAFETY: the mapping covers [data_offset, end), which was just sized
    // above. Concurrent modification of that region by other handles is
    // excluded by the single-owner convention documented on `MappedArray`.
    let mmap = unsafe {
        MmapOptions::new()
            .offset(data_offset)
            .len(data_len)
            .map_mut(&*sink)?
    };

    debug!(
        shape = ?header.shape,
        descr = %header.descr,
        header_len = encoded.len(),
        data_offset,
        data_len,
        "mapped .npy array created"
    );

    Ok(MappedArray {
        mmap,
        header,
        data_offset,
    })
}

impl MappedArray {
    /// Map an existing `.npy` file read-write.
    ///
    /// The header is parsed from the start of `file`.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::Format`] if the file is shorter than its header
    /// claims.
    pub fn open(file: &File) -> Result<Self> {
        let mut reader = file;
        reader.seek(SeekFrom::Start(0))?;
        let (header, consumed) = NpyHeader::decode(&mut reader)?;
        let data_offset = consumed as u64;
        let data_len = header.data_len()?;

        let file_len = file.metadata()?.len();
        if file_len < data_offset + data_len as u64 {
            return Err(AdjacencyError::Format(format!(
                "file holds {} data bytes, header requires {data_len}",
                file_len.saturating_sub(data_offset)
            )));
        }

        // SAFETY: the mapped range was checked against the file length above.
        let mmap = unsafe {
            MmapOptions::new()
                .offset(data_offset)
                .len(data_len)
                .map_mut(file)?
        };

        Ok(Self {
            mmap,
            header,
            data_offset,
        })
    }

    /// Header describing the mapped data.
    pub fn header(&self) -> &NpyHeader {
        &self.header
    }

    /// Array dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.header.shape
    }

    /// Element layout.
    pub fn descriptor(&self) -> &Descriptor {
        &self.header.descr
    }

    /// Whether elements are stored column-major.
    pub fn fortran_order(&self) -> bool {
        self.header.fortran_order
    }

    /// Byte offset of the data region from the start of the file.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.header.element_count()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The data region.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// The data region, writable.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    fn check_element<T: Element>(&self) -> Result<()> {
        match self.header.descr.as_scalar() {
            Some(s) if T::matches(s) && s.is_native() => Ok(()),
            _ => Err(AdjacencyError::UnsupportedDescriptor(format!(
                "array holds {} which cannot be viewed as native {}",
                self.header.descr,
                T::scalar_type()
            ))),
        }
    }

    /// View the data as a slice of `T`, in storage order.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::UnsupportedDescriptor`] unless the array holds
    /// native-endian `T`.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.check_element::<T>()?;
        bytemuck::try_cast_slice(&self.mmap[..])
            .map_err(|e| AdjacencyError::Format(format!("cannot view mapped data: {e:?}")))
    }

    /// View the data as a mutable slice of `T`, in storage order.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check_element::<T>()?;
        bytemuck::try_cast_slice_mut(&mut self.mmap[..])
            .map_err(|e| AdjacencyError::Format(format!("cannot view mapped data: {e:?}")))
    }

    /// Storage position of the element at `index`, honouring C or Fortran
    /// order. `None` if the rank differs or any coordinate is out of range.
    pub fn linear_index(&self, index: &[usize]) -> Option<usize> {
        let shape = &self.header.shape;
        if index.len() != shape.len() || index.iter().zip(shape).any(|(i, d)| i >= d) {
            return None;
        }
        let mut linear = 0usize;
        let mut stride = 1usize;
        if self.header.fortran_order {
            for (i, d) in index.iter().zip(shape) {
                linear += i * stride;
                stride *= d;
            }
        } else {
            for (i, d) in index.iter().zip(shape).rev() {
                linear += i * stride;
                stride *= d;
            }
        }
        Some(linear)
    }

    fn checked_index(&self, index: &[usize]) -> Result<usize> {
        self.linear_index(index).ok_or_else(|| {
            AdjacencyError::parameter(
                "index",
                format!("{index:?}"),
                format!("within shape {:?}", self.header.shape),
            )
        })
    }

    /// Read the element at `index`.
    pub fn get<T: Element>(&self, index: &[usize]) -> Result<T> {
        let at = self.checked_index(index)?;
        Ok(self.as_slice::<T>()?[at])
    }

    /// Overwrite the element at `index`.
    pub fn set<T: Element>(&mut self, index: &[usize], value: T) -> Result<()> {
        let at = self.checked_index(index)?;
        self.as_mut_slice::<T>()?[at] = value;
        Ok(())
    }

    /// Raw bytes of the `i`-th element in storage order (records included).
    pub fn record(&self, i: usize) -> Option<&[u8]> {
        let size = self.header.descr.itemsize();
        self.mmap.get(i * size..(i + 1) * size)
    }

    /// Raw bytes of the `i`-th element, writable.
    pub fn record_mut(&mut self, i: usize) -> Option<&mut [u8]> {
        let size = self.header.descr.itemsize();
        self.mmap.get_mut(i * size..(i + 1) * size)
    }

    /// Flush outstanding writes in the mapped region to the file.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for MappedArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedArray")
            .field("shape", &self.header.shape)
            .field("descr", &self.header.descr.to_string())
            .field("fortran_order", &self.header.fortran_order)
            .field("data_offset", &self.data_offset)
            .finish()
    }
}
