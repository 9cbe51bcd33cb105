//! NumPy `.npy` array files.
//!
//! - [`descr`]: element descriptors and the [`Element`] trait for typed views.
//! - [`header`]: the preamble/header codec (format 1.0 and 2.0).
//! - [`reader`]: loading whole arrays ([`NpyArray`]).
//! - [`mapped`]: the memory-mapped writer ([`create_mapped_array`]).
//!
//! Reference: <https://numpy.org/devdocs/reference/generated/numpy.lib.format.html>

pub mod descr;
pub mod header;
pub mod mapped;
pub mod reader;

pub use descr::{
    ByteOrder, Descriptor, Element, IntoDescriptor, RecordField, ScalarKind, ScalarType,
};
pub use header::{NpyHeader, ARRAY_ALIGN, MAGIC};
pub use mapped::{create_mapped_array, MappedArray};
pub use reader::{read_npy, read_npy_file, write_npy_file, NpyArray};
