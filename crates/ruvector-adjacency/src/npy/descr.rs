//! Element descriptors for `.npy` arrays.
//!
//! A [`Descriptor`] is either a single fixed-width numeric [`ScalarType`] or a
//! packed record of named scalar fields (the coordinate files use
//! `[('row', '<i4'), ('col', '<i4'), ('weight', '<f8')]`). Descriptors are
//! parsed from NumPy type codes and rendered back in the exact form NumPy
//! writes into array headers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AdjacencyError, Result};

/// Byte order of a multi-byte element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    /// `<`
    Little,
    /// `>`
    Big,
    /// `|`, used for single-byte elements.
    NotApplicable,
}

impl ByteOrder {
    /// Byte order of the host.
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    fn symbol(self) -> char {
        match self {
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
            ByteOrder::NotApplicable => '|',
        }
    }
}

/// Numeric family of a scalar element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// `b`
    Bool,
    /// `i`
    Int,
    /// `u`
    UInt,
    /// `f`
    Float,
}

impl ScalarKind {
    fn code(self) -> char {
        match self {
            ScalarKind::Bool => 'b',
            ScalarKind::Int => 'i',
            ScalarKind::UInt => 'u',
            ScalarKind::Float => 'f',
        }
    }

    fn from_code(c: char) -> Option<Self> {
        match c {
            'b' => Some(ScalarKind::Bool),
            'i' => Some(ScalarKind::Int),
            'u' => Some(ScalarKind::UInt),
            'f' => Some(ScalarKind::Float),
            _ => None,
        }
    }
}

/// A fixed-width numeric element layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarType {
    /// Numeric family.
    pub kind: ScalarKind,
    /// Width in bytes.
    pub size: usize,
    /// Byte order; always [`ByteOrder::NotApplicable`] for one-byte types.
    pub order: ByteOrder,
}

impl ScalarType {
    /// Build a scalar type, normalising the byte order for one-byte widths.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::UnsupportedDescriptor`] if `size` is not a width the
    /// kind supports (bool: 1; ints: 1, 2, 4, 8; floats: 4, 8).
    pub fn new(kind: ScalarKind, size: usize, order: ByteOrder) -> Result<Self> {
        let valid = match kind {
            ScalarKind::Bool => size == 1,
            ScalarKind::Int | ScalarKind::UInt => matches!(size, 1 | 2 | 4 | 8),
            ScalarKind::Float => matches!(size, 4 | 8),
        };
        if !valid {
            return Err(AdjacencyError::UnsupportedDescriptor(format!(
                "{}{} is not a supported fixed-width element",
                kind.code(),
                size
            )));
        }
        let order = match (size, order) {
            (1, _) => ByteOrder::NotApplicable,
            (_, ByteOrder::NotApplicable) => ByteOrder::native(),
            (_, o) => o,
        };
        Ok(Self { kind, size, order })
    }

    /// Scalar type in host byte order.
    pub fn native(kind: ScalarKind, size: usize) -> Result<Self> {
        Self::new(kind, size, ByteOrder::native())
    }

    /// Parse a NumPy type code such as `"<f8"`, `"int32"` or `"d"`.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if let Some((kind, size)) = alias(code) {
            return Self::native(kind, size);
        }

        let unsupported =
            || AdjacencyError::UnsupportedDescriptor(format!("cannot resolve type code '{code}'"));

        let mut chars = code.chars();
        let (order, rest) = match chars.next() {
            Some('<') => (ByteOrder::Little, chars.as_str()),
            Some('>') => (ByteOrder::Big, chars.as_str()),
            Some('|') => (ByteOrder::NotApplicable, chars.as_str()),
            Some('=') => (ByteOrder::native(), chars.as_str()),
            Some(_) => (ByteOrder::native(), code),
            None => return Err(unsupported()),
        };

        let mut chars = rest.chars();
        let kind = chars
            .next()
            .and_then(ScalarKind::from_code)
            .ok_or_else(unsupported)?;
        let size: usize = chars.as_str().parse().map_err(|_| unsupported())?;
        // `|` only describes single-byte types.
        if order == ByteOrder::NotApplicable && size > 1 {
            return Err(unsupported());
        }
        Self::new(kind, size, order)
    }

    /// Canonical type code, e.g. `"<f8"` or `"|u1"`.
    pub fn code(&self) -> String {
        format!("{}{}{}", self.order.symbol(), self.kind.code(), self.size)
    }

    /// Whether elements can be reinterpreted in place on this host.
    pub fn is_native(&self) -> bool {
        self.order == ByteOrder::NotApplicable || self.order == ByteOrder::native()
    }

    fn fixed<const N: usize>(&self, bytes: &[u8]) -> [u8; N] {
        let mut buf = [0u8; N];
        buf.copy_from_slice(&bytes[..N]);
        if self.order == ByteOrder::Big {
            buf.reverse();
        }
        buf
    }

    /// Decode one element as `f64`. `bytes` must hold at least `size` bytes.
    pub fn read_f64(&self, bytes: &[u8]) -> f64 {
        match (self.kind, self.size) {
            (ScalarKind::Bool, _) => f64::from(u8::from(bytes[0] != 0)),
            (ScalarKind::Int, 1) => f64::from(bytes[0] as i8),
            (ScalarKind::Int, 2) => f64::from(i16::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::Int, 4) => f64::from(i32::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::Int, _) => i64::from_le_bytes(self.fixed(bytes)) as f64,
            (ScalarKind::UInt, 1) => f64::from(bytes[0]),
            (ScalarKind::UInt, 2) => f64::from(u16::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::UInt, 4) => f64::from(u32::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::UInt, _) => u64::from_le_bytes(self.fixed(bytes)) as f64,
            (ScalarKind::Float, 4) => f64::from(f32::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::Float, _) => f64::from_le_bytes(self.fixed(bytes)),
        }
    }

    /// Decode one element as `i64`.
    ///
    /// Floats are accepted only when they hold an integral value.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::Format`] for non-integral floats or unsigned values
    /// above `i64::MAX`.
    pub fn read_i64(&self, bytes: &[u8]) -> Result<i64> {
        let value = match (self.kind, self.size) {
            (ScalarKind::Bool, _) => i64::from(bytes[0] != 0),
            (ScalarKind::Int, 1) => i64::from(bytes[0] as i8),
            (ScalarKind::Int, 2) => i64::from(i16::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::Int, 4) => i64::from(i32::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::Int, _) => i64::from_le_bytes(self.fixed(bytes)),
            (ScalarKind::UInt, 1) => i64::from(bytes[0]),
            (ScalarKind::UInt, 2) => i64::from(u16::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::UInt, 4) => i64::from(u32::from_le_bytes(self.fixed(bytes))),
            (ScalarKind::UInt, _) => {
                let v = u64::from_le_bytes(self.fixed(bytes));
                i64::try_from(v)
                    .map_err(|_| AdjacencyError::Format(format!("value {v} exceeds i64::MAX")))?
            }
            (ScalarKind::Float, _) => {
                let v = self.read_f64(bytes);
                if v.fract() != 0.0 || !v.is_finite() {
                    return Err(AdjacencyError::Format(format!(
                        "expected an integral value, found {v}"
                    )));
                }
                v as i64
            }
        };
        Ok(value)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// NumPy names and single-character codes for native scalar types.
fn alias(code: &str) -> Option<(ScalarKind, usize)> {
    use ScalarKind::*;
    let resolved = match code {
        "bool" | "?" => (Bool, 1),
        "int8" | "b" => (Int, 1),
        "int16" | "h" => (Int, 2),
        "int32" | "i" => (Int, 4),
        "int64" | "int" | "l" | "q" => (Int, 8),
        "uint8" | "B" => (UInt, 1),
        "uint16" | "H" => (UInt, 2),
        "uint32" | "I" => (UInt, 4),
        "uint64" | "L" | "Q" => (UInt, 8),
        "float32" | "f" => (Float, 4),
        "float64" | "float" | "d" => (Float, 8),
        _ => return None,
    };
    Some(resolved)
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// A named field of a record descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordField {
    /// Field name.
    pub name: String,
    /// Field element type.
    pub dtype: ScalarType,
    /// Byte offset of the field within one record.
    pub offset: usize,
}

/// Layout of one array element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Descriptor {
    /// A single numeric value.
    Scalar(ScalarType),
    /// A packed sequence of named numeric fields.
    Record(Vec<RecordField>),
    /// A fixed-width, NUL-padded byte string (`|S<n>`).
    Bytes(usize),
}

impl Descriptor {
    /// Parse a scalar or byte-string type code.
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        let body = trimmed.strip_prefix('|').unwrap_or(trimmed);
        if let Some(width) = body.strip_prefix('S') {
            return match width.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Descriptor::Bytes(n)),
                _ => Err(AdjacencyError::UnsupportedDescriptor(format!(
                    "cannot resolve type code '{trimmed}'"
                ))),
            };
        }
        ScalarType::parse(code).map(Descriptor::Scalar)
    }

    /// Build a packed record descriptor from `(name, type code)` pairs.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::UnsupportedDescriptor`] for an empty field list,
    /// empty, duplicate, or quote-containing names, or unresolvable codes.
    pub fn record(fields: &[(&str, &str)]) -> Result<Self> {
        if fields.is_empty() {
            return Err(AdjacencyError::UnsupportedDescriptor(
                "record descriptor needs at least one field".to_string(),
            ));
        }
        let mut out: Vec<RecordField> = Vec::with_capacity(fields.len());
        let mut offset = 0usize;
        for (name, code) in fields {
            if name.is_empty() || name.contains(['\'', '"', '\\']) {
                return Err(AdjacencyError::UnsupportedDescriptor(format!(
                    "invalid record field name {name:?}"
                )));
            }
            if out.iter().any(|f| f.name == *name) {
                return Err(AdjacencyError::UnsupportedDescriptor(format!(
                    "duplicate record field '{name}'"
                )));
            }
            let dtype = ScalarType::parse(code)?;
            out.push(RecordField {
                name: (*name).to_string(),
                dtype,
                offset,
            });
            offset += dtype.size;
        }
        Ok(Descriptor::Record(out))
    }

    /// Bytes per element.
    pub fn itemsize(&self) -> usize {
        match self {
            Descriptor::Scalar(s) => s.size,
            Descriptor::Record(fields) => fields.iter().map(|f| f.dtype.size).sum(),
            Descriptor::Bytes(n) => *n,
        }
    }

    /// The scalar type, if this is not a record.
    pub fn as_scalar(&self) -> Option<&ScalarType> {
        match self {
            Descriptor::Scalar(s) => Some(s),
            Descriptor::Record(_) | Descriptor::Bytes(_) => None,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        match self {
            Descriptor::Scalar(_) | Descriptor::Bytes(_) => None,
            Descriptor::Record(fields) => fields.iter().find(|f| f.name == name),
        }
    }

    /// The `descr` value as NumPy writes it into a header dict.
    pub(crate) fn header_repr(&self) -> String {
        match self {
            Descriptor::Scalar(s) => format!("'{}'", s.code()),
            Descriptor::Record(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|f| format!("('{}', '{}')", f.name, f.dtype.code()))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Descriptor::Bytes(n) => format!("'|S{n}'"),
        }
    }
}

impl From<ScalarType> for Descriptor {
    fn from(s: ScalarType) -> Self {
        Descriptor::Scalar(s)
    }
}

impl FromStr for Descriptor {
    type Err = AdjacencyError;

    fn from_str(s: &str) -> Result<Self> {
        Descriptor::parse(s)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_repr())
    }
}

/// Anything that resolves to a [`Descriptor`]: type-code strings, scalar
/// types and descriptors themselves.
pub trait IntoDescriptor {
    /// Resolve into a descriptor.
    fn into_descriptor(self) -> Result<Descriptor>;
}

impl IntoDescriptor for Descriptor {
    fn into_descriptor(self) -> Result<Descriptor> {
        Ok(self)
    }
}

impl IntoDescriptor for &Descriptor {
    fn into_descriptor(self) -> Result<Descriptor> {
        Ok(self.clone())
    }
}

impl IntoDescriptor for ScalarType {
    fn into_descriptor(self) -> Result<Descriptor> {
        Ok(Descriptor::Scalar(self))
    }
}

impl IntoDescriptor for &str {
    fn into_descriptor(self) -> Result<Descriptor> {
        Descriptor::parse(self)
    }
}

impl IntoDescriptor for String {
    fn into_descriptor(self) -> Result<Descriptor> {
        Descriptor::parse(&self)
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// Rust types that can be viewed directly inside `.npy` data.
pub trait Element: bytemuck::Pod {
    /// Numeric family of the type.
    const KIND: ScalarKind;

    /// The native-order scalar type for `Self`.
    fn scalar_type() -> ScalarType {
        let size = std::mem::size_of::<Self>();
        let order = if size == 1 {
            ByteOrder::NotApplicable
        } else {
            ByteOrder::native()
        };
        ScalarType {
            kind: Self::KIND,
            size,
            order,
        }
    }

    /// Whether `scalar` stores values of this type (in either byte order).
    fn matches(scalar: &ScalarType) -> bool {
        scalar.kind == Self::KIND && scalar.size == std::mem::size_of::<Self>()
    }
}

macro_rules! impl_element {
    ($($t:ty => $kind:ident),* $(,)?) => {
        $(impl Element for $t {
            const KIND: ScalarKind = ScalarKind::$kind;
        })*
    };
}

impl_element!(
    i8 => Int, i16 => Int, i32 => Int, i64 => Int,
    u8 => UInt, u16 => UInt, u32 => UInt, u64 => UInt,
    f32 => Float, f64 => Float,
);
