//! `.npy` preamble and header dictionary codec.
//!
//! The on-disk layout is:
//!
//! ```text
//! \x93NUMPY | major | minor | header_len (u16 LE for 1.0, u32 LE for 2.0)
//! {'descr': '<f8', 'fortran_order': False, 'shape': (3, 4), }   <spaces> \n
//! <raw element data>
//! ```
//!
//! The header text is padded with spaces and terminated by `\n` so that the
//! data region starts on a multiple of [`ARRAY_ALIGN`] bytes, matching
//! NumPy's `write_array_header_1_0` byte-for-byte.

use std::io::Read;

use super::descr::{Descriptor, RecordField, ScalarType};
use crate::error::{AdjacencyError, Result};

/// Magic bytes opening every `.npy` file.
pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Alignment of the data region, in bytes.
pub const ARRAY_ALIGN: usize = 64;

/// Parsed or to-be-written `.npy` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    /// Element layout.
    pub descr: Descriptor,
    /// Column-major element order when `true`.
    pub fortran_order: bool,
    /// Array dimensions.
    pub shape: Vec<usize>,
}

impl NpyHeader {
    /// Assemble a header.
    pub fn new(descr: Descriptor, fortran_order: bool, shape: Vec<usize>) -> Self {
        Self {
            descr,
            fortran_order,
            shape,
        }
    }

    /// Number of elements (1 for a zero-dimensional array).
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Size of the data region in bytes.
    ///
    /// # Errors
    ///
    /// [`AdjacencyError::InvalidShape`] if the size overflows `usize`.
    pub fn data_len(&self) -> Result<usize> {
        self.shape
            .iter()
            .try_fold(self.descr.itemsize(), |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                AdjacencyError::InvalidShape(format!(
                    "data size of shape {:?} overflows usize",
                    self.shape
                ))
            })
    }

    /// The header dictionary text, without padding.
    pub fn dict_repr(&self) -> String {
        let shape = match self.shape.as_slice() {
            [] => "()".to_string(),
            [n] => format!("({n},)"),
            dims => {
                let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                format!("({})", parts.join(", "))
            }
        };
        format!(
            "{{'descr': {}, 'fortran_order': {}, 'shape': {}, }}",
            self.descr.header_repr(),
            if self.fortran_order { "True" } else { "False" },
            shape
        )
    }

    /// Encode preamble and padded header.
    ///
    /// Uses format 1.0 unless the padded header exceeds a `u16` length, in
    /// which case format 2.0 is used. The returned length is always a
    /// multiple of [`ARRAY_ALIGN`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let dict = self.dict_repr();
        // +1 for the terminating newline.
        let hlen = dict.len() + 1;

        for (major, len_bytes) in [(1u8, 2usize), (2u8, 4usize)] {
            let prefix = MAGIC.len() + 2 + len_bytes;
            let padlen = ARRAY_ALIGN - (prefix + hlen) % ARRAY_ALIGN;
            let padded = hlen + padlen;
            if len_bytes == 2 && padded > usize::from(u16::MAX) {
                continue;
            }
            let padded_u32 = u32::try_from(padded).map_err(|_| {
                AdjacencyError::InvalidShape(format!("header of {padded} bytes is too large"))
            })?;

            let mut out = Vec::with_capacity(prefix + padded);
            out.extend_from_slice(MAGIC);
            out.push(major);
            out.push(0);
            if len_bytes == 2 {
                out.extend_from_slice(&(padded_u32 as u16).to_le_bytes());
            } else {
                out.extend_from_slice(&padded_u32.to_le_bytes());
            }
            out.extend_from_slice(dict.as_bytes());
            out.resize(out.len() + padlen, b' ');
            out.push(b'\n');
            return Ok(out);
        }

        Err(AdjacencyError::InvalidShape(
            "header does not fit any supported format version".to_string(),
        ))
    }

    /// Read preamble and header from `reader`.
    ///
    /// Returns the header and the number of bytes consumed, which is the
    /// data offset relative to where reading began.
    pub fn decode<R: Read>(reader: &mut R) -> Result<(Self, usize)> {
        let mut magic = [0u8; 6];
        read_exact(reader, &mut magic, "magic")?;
        if &magic != MAGIC {
            return Err(AdjacencyError::Format(
                "not a valid .npy file (bad magic)".to_string(),
            ));
        }

        let mut version = [0u8; 2];
        read_exact(reader, &mut version, "version")?;
        let (len_bytes, header_len) = match version[0] {
            1 => {
                let mut buf = [0u8; 2];
                read_exact(reader, &mut buf, "header length")?;
                (2, usize::from(u16::from_le_bytes(buf)))
            }
            2 | 3 => {
                let mut buf = [0u8; 4];
                read_exact(reader, &mut buf, "header length")?;
                let len = u32::from_le_bytes(buf) as usize;
                (4, len)
            }
            v => {
                return Err(AdjacencyError::Format(format!(
                    "unsupported .npy format version {v}.{}",
                    version[1]
                )))
            }
        };

        let mut text = vec![0u8; header_len];
        read_exact(reader, &mut text, "header")?;
        let text = std::str::from_utf8(&text)
            .map_err(|e| AdjacencyError::Format(format!("header is not utf-8: {e}")))?;

        let header = parse_header_dict(text)?;
        Ok((header, MAGIC.len() + 2 + len_bytes + header_len))
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            AdjacencyError::Format(format!("truncated .npy file while reading {what}"))
        }
        _ => AdjacencyError::Io(e),
    })
}

// ---------------------------------------------------------------------------
// Header dictionary parsing
// ---------------------------------------------------------------------------

/// The subset of Python literals that appears in `.npy` headers.
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    /// Tuple or list.
    Seq(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

struct LiteralParser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, msg: &str) -> AdjacencyError {
        AdjacencyError::Format(format!("bad .npy header at byte {}: {msg}", self.pos))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn value(&mut self) -> Result<Literal> {
        self.skip_ws();
        match self.peek() {
            Some(q @ (b'\'' | b'"')) => self.string(q),
            Some(b'(') => self.seq(b')'),
            Some(b'[') => self.seq(b']'),
            Some(b'{') => self.dict(),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.int(),
            Some(c) if c.is_ascii_alphabetic() => self.word(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of header")),
        }
    }

    fn string(&mut self, quote: u8) -> Result<Literal> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated string")),
            }
        }
        String::from_utf8(out)
            .map(Literal::Str)
            .map_err(|_| self.error("string is not utf-8"))
    }

    fn int(&mut self) -> Result<Literal> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| self.error("bad integer"))?;
        let value = digits.parse().map_err(|_| self.error("bad integer"))?;
        // Python 2 headers write long integers as `3L`.
        if self.peek() == Some(b'L') {
            self.pos += 1;
        }
        Ok(Literal::Int(value))
    }

    fn word(&mut self) -> Result<Literal> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            b"True" => Ok(Literal::Bool(true)),
            b"False" => Ok(Literal::Bool(false)),
            b"None" => Ok(Literal::None),
            _ => Err(self.error("unknown identifier")),
        }
    }

    fn seq(&mut self, close: u8) -> Result<Literal> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Literal::Seq(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.error("expected ',' or closing bracket")),
            }
        }
    }

    fn dict(&mut self) -> Result<Literal> {
        self.pos += 1;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Literal::Dict(entries));
            }
            let key = self.value()?;
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':'"));
            }
            self.pos += 1;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}

fn parse_header_dict(text: &str) -> Result<NpyHeader> {
    let mut parser = LiteralParser::new(text);
    let entries = match parser.value()? {
        Literal::Dict(entries) => entries,
        _ => {
            return Err(AdjacencyError::Format(
                "header is not a dictionary".to_string(),
            ))
        }
    };

    let lookup = |key: &str| {
        entries
            .iter()
            .find(|(k, _)| matches!(k, Literal::Str(s) if s == key))
            .map(|(_, v)| v)
            .ok_or_else(|| AdjacencyError::Format(format!("header has no '{key}' key")))
    };

    let descr = descriptor_from_literal(lookup("descr")?)?;
    let fortran_order = match lookup("fortran_order")? {
        Literal::Bool(b) => *b,
        other => {
            return Err(AdjacencyError::Format(format!(
                "fortran_order must be a bool, found {other:?}"
            )))
        }
    };
    let shape = match lookup("shape")? {
        Literal::Seq(dims) => dims
            .iter()
            .map(|d| match d {
                Literal::Int(n) if *n >= 0 => Ok(*n as usize),
                other => Err(AdjacencyError::Format(format!(
                    "shape entries must be non-negative integers, found {other:?}"
                ))),
            })
            .collect::<Result<Vec<usize>>>()?,
        other => {
            return Err(AdjacencyError::Format(format!(
                "shape must be a tuple, found {other:?}"
            )))
        }
    };

    Ok(NpyHeader::new(descr, fortran_order, shape))
}

fn descriptor_from_literal(lit: &Literal) -> Result<Descriptor> {
    match lit {
        Literal::Str(code) => Descriptor::parse(code),
        Literal::Seq(fields) => {
            let mut out = Vec::with_capacity(fields.len());
            let mut offset = 0usize;
            for field in fields {
                let (name, code) = match field {
                    Literal::Seq(parts) if parts.len() == 2 => match (&parts[0], &parts[1]) {
                        (Literal::Str(name), Literal::Str(code)) => (name, code),
                        _ => {
                            return Err(AdjacencyError::UnsupportedDescriptor(format!(
                                "unsupported record field {field:?}"
                            )))
                        }
                    },
                    _ => {
                        return Err(AdjacencyError::UnsupportedDescriptor(format!(
                            "unsupported record field {field:?} (sub-arrays are not supported)"
                        )))
                    }
                };
                let dtype = ScalarType::parse(code)?;
                out.push(RecordField {
                    name: name.clone(),
                    dtype,
                    offset,
                });
                offset += dtype.size;
            }
            if out.is_empty() {
                return Err(AdjacencyError::UnsupportedDescriptor(
                    "empty record descriptor".to_string(),
                ));
            }
            Ok(Descriptor::Record(out))
        }
        other => Err(AdjacencyError::UnsupportedDescriptor(format!(
            "unsupported descr {other:?}"
        ))),
    }
}
