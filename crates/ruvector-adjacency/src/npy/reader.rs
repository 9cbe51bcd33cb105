//! In-memory `.npy` arrays and the standard reader.
//!
//! [`NpyArray`] owns a header and the raw data bytes. It is what the `.npz`
//! bundle hands out and what tests use to re-read files produced by the
//! mapped writer.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::descr::{Descriptor, Element, ScalarType};
use super::header::NpyHeader;
use crate::error::{AdjacencyError, Result};

/// A fully loaded `.npy` array.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    header: NpyHeader,
    data: Vec<u8>,
}

impl NpyArray {
    /// Wrap raw data under `header`.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::LengthMismatch`] if `data` is not exactly the size
    /// the header describes.
    pub fn new(header: NpyHeader, data: Vec<u8>) -> Result<Self> {
        let expected = header.data_len()?;
        if data.len() != expected {
            return Err(AdjacencyError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { header, data })
    }

    /// Build a C-ordered array of native `T` values.
    pub fn from_slice<T: Element>(shape: &[usize], values: &[T]) -> Result<Self> {
        let header = NpyHeader::new(Descriptor::Scalar(T::scalar_type()), false, shape.to_vec());
        if header.element_count() != values.len() {
            return Err(AdjacencyError::LengthMismatch {
                expected: header.element_count(),
                actual: values.len(),
            });
        }
        Ok(Self {
            header,
            data: bytemuck::cast_slice(values).to_vec(),
        })
    }

    /// Build a zero-dimensional array holding a single value.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            header: NpyHeader::new(Descriptor::Scalar(T::scalar_type()), false, Vec::new()),
            data: bytemuck::bytes_of(&value).to_vec(),
        }
    }

    /// Build a zero-dimensional `|S<n>` byte string, as NumPy stores
    /// `np.array(b"csr")`.
    pub fn byte_string(value: &[u8]) -> Self {
        let width = value.len().max(1);
        let mut data = value.to_vec();
        data.resize(width, 0);
        Self {
            header: NpyHeader::new(Descriptor::Bytes(width), false, Vec::new()),
            data,
        }
    }

    /// Contents of a zero-dimensional byte string with trailing NULs removed.
    pub fn as_byte_string(&self) -> Option<&[u8]> {
        match self.header.descr {
            Descriptor::Bytes(_) if self.header.shape.is_empty() => {
                let end = self.data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Some(&self.data[..end])
            }
            _ => None,
        }
    }

    /// Header of the array.
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

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.header.element_count()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw data bytes in storage order.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes of each element, in storage order.
    pub fn elements(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.header.descr.itemsize().max(1))
    }

    fn scalar_type(&self) -> Result<ScalarType> {
        self.header.descr.as_scalar().copied().ok_or_else(|| {
            AdjacencyError::UnsupportedDescriptor(format!(
                "expected a scalar array, found record {}",
                self.header.descr
            ))
        })
    }

    /// Values as `T`, in storage order. Either byte order is accepted.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::UnsupportedDescriptor`] unless the element type is
    /// exactly `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let scalar = self.scalar_type()?;
        if !T::matches(&scalar) {
            return Err(AdjacencyError::UnsupportedDescriptor(format!(
                "array holds {} but {} was requested",
                scalar,
                T::scalar_type()
            )));
        }
        let swap = !scalar.is_native();
        Ok(self
            .elements()
            .map(|raw| {
                if swap {
                    let mut buf = raw.to_vec();
                    buf.reverse();
                    bytemuck::pod_read_unaligned(&buf)
                } else {
                    bytemuck::pod_read_unaligned(raw)
                }
            })
            .collect())
    }

    /// Values widened to `f64`, for any numeric scalar element type.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        let scalar = self.scalar_type()?;
        Ok(self.elements().map(|raw| scalar.read_f64(raw)).collect())
    }

    /// Values as `i64`, for integer (or integral float) element types.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        let scalar = self.scalar_type()?;
        self.elements().map(|raw| scalar.read_i64(raw)).collect()
    }

    /// Serialize header and data to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.header.encode()?)?;
        writer.write_all(&self.data)?;
        Ok(())
    }
}

/// Read a complete `.npy` array from `reader`.
pub fn read_npy<R: Read>(mut reader: R) -> Result<NpyArray> {
    let (header, _) = NpyHeader::decode(&mut reader)?;
    let len = header.data_len()?;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => AdjacencyError::Format(format!(
            "truncated .npy data ({len} bytes expected)"
        )),
        _ => AdjacencyError::Io(e),
    })?;
    NpyArray::new(header, data)
}

/// Read a `.npy` file from disk.
pub fn read_npy_file(path: impl AsRef<Path>) -> Result<NpyArray> {
    let file = File::open(path.as_ref())?;
    read_npy(BufReader::new(file))
}

/// Write `array` to a new `.npy` file at `path`.
pub fn write_npy_file(path: impl AsRef<Path>, array: &NpyArray) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    array.write_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_round_trip() {
        let arr = NpyArray::from_slice(&[2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut buf = Vec::new();
        arr.write_to(&mut buf).unwrap();
        let back = read_npy(buf.as_slice()).unwrap();
        assert_eq!(back.shape(), &[2, 3]);
        assert_eq!(back.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn from_slice_checks_length() {
        let err = NpyArray::from_slice(&[2, 2], &[1i32, 2, 3]).unwrap_err();
        assert!(matches!(err, AdjacencyError::LengthMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn type_mismatch_is_unsupported() {
        let arr = NpyArray::from_slice(&[2], &[1i32, 2]).unwrap();
        assert!(matches!(
            arr.to_vec::<i64>(),
            Err(AdjacencyError::UnsupportedDescriptor(_))
        ));
        assert_eq!(arr.to_i64_vec().unwrap(), vec![1, 2]);
        assert_eq!(arr.to_f64_vec().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn big_endian_values_are_swapped() {
        let header = NpyHeader::new(Descriptor::parse(">i4").unwrap(), false, vec![2]);
        let mut data = Vec::new();
        data.extend_from_slice(&5i32.to_be_bytes());
        data.extend_from_slice(&(-9i32).to_be_bytes());
        let arr = NpyArray::new(header, data).unwrap();
        assert_eq!(arr.to_vec::<i32>().unwrap(), vec![5, -9]);
    }

    #[test]
    fn truncated_data_rejected() {
        let arr = NpyArray::from_slice(&[4], &[1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let mut buf = Vec::new();
        arr.write_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(read_npy(buf.as_slice()), Err(AdjacencyError::Format(_))));
    }

    #[test]
    fn byte_string_round_trip() {
        let arr = NpyArray::byte_string(b"csr");
        let mut buf = Vec::new();
        arr.write_to(&mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf[10..]);
        assert!(text.starts_with("{'descr': '|S3', 'fortran_order': False, 'shape': (), }"));
        let back = read_npy(buf.as_slice()).unwrap();
        assert_eq!(back.as_byte_string(), Some(&b"csr"[..]));
        assert!(back.to_f64_vec().is_err());
    }

    #[test]
    fn scalar_array() {
        let arr = NpyArray::scalar(42i64);
        assert!(arr.shape().is_empty());
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.to_vec::<i64>().unwrap(), vec![42]);
    }
}
