//! Reader and writer for NumPy `.npy` files.
//!
//! Supports 1-D and 2-D little-endian arrays of `f4`, `f8`, `i4`, `i8`,
//! `u1` and `b1`, in C or Fortran order. Everything is converted to `f32`.

use anyhow::{anyhow, bail, Context, Result};
use cinesim_core::FeatureMatrix;
use std::fs;
use std::io::Write;
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DType {
    F4,
    F8,
    I4,
    I8,
    U1,
    B1,
}

impl DType {
    fn parse(descr: &str) -> Result<Self> {
        let dtype = match descr {
            "<f4" => DType::F4,
            "<f8" => DType::F8,
            "<i4" => DType::I4,
            "<i8" => DType::I8,
            "|u1" => DType::U1,
            "|b1" => DType::B1,
            other => bail!("unsupported npy dtype {:?}", other),
        };
        Ok(dtype)
    }

    fn size(self) -> usize {
        match self {
            DType::F4 | DType::I4 => 4,
            DType::F8 | DType::I8 => 8,
            DType::U1 | DType::B1 => 1,
        }
    }

    fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            DType::F4 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            DType::F8 => f64::from_le_bytes(eight(bytes)) as f32,
            DType::I4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            DType::I8 => i64::from_le_bytes(eight(bytes)) as f32,
            DType::U1 => bytes[0] as f32,
            DType::B1 => {
                if bytes[0] != 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[inline]
fn eight(bytes: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    buf
}

#[derive(Debug, PartialEq)]
struct Header {
    dtype: DType,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Read a `.npy` file into a row-major matrix. 1-D arrays become one column.
pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<FeatureMatrix> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    parse_npy(&bytes).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_npy(bytes: &[u8]) -> Result<FeatureMatrix> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        bail!("not an npy file (bad magic)");
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                bail!("truncated npy header");
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => bail!("unsupported npy format version {}", v),
    };

    let data_start = header_start + header_len;
    let header_text = bytes
        .get(header_start..data_start)
        .ok_or_else(|| anyhow!("truncated npy header"))?;
    let header = parse_header(std::str::from_utf8(header_text).context("npy header is not text")?)?;

    let (rows, cols) = match header.shape.as_slice() {
        [n] => (*n, 1),
        [n, d] => (*n, *d),
        other => bail!("expected a 1-D or 2-D array, got shape {:?}", other),
    };

    let count = rows
        .checked_mul(cols)
        .ok_or_else(|| anyhow!("npy shape overflows"))?;
    let width = header.dtype.size();
    let payload = &bytes[data_start..];
    if payload.len() < count * width {
        bail!(
            "npy payload has {} bytes, shape {}x{} needs {}",
            payload.len(),
            rows,
            cols,
            count * width
        );
    }

    let values: Vec<f32> = payload[..count * width]
        .chunks_exact(width)
        .map(|chunk| header.dtype.decode(chunk))
        .collect();

    let data = if header.fortran_order && cols > 1 {
        let mut row_major = vec![0.0f32; count];
        for c in 0..cols {
            for r in 0..rows {
                row_major[r * cols + c] = values[c * rows + r];
            }
        }
        row_major
    } else {
        values
    };

    Ok(FeatureMatrix::new(rows, cols, data)?)
}

fn parse_header(text: &str) -> Result<Header> {
    let descr = dict_value(text, "descr")?;
    let descr = descr
        .trim()
        .trim_matches(|c: char| c == '\'' || c == '"')
        .to_string();

    let fortran_order = match dict_value(text, "fortran_order")?.trim() {
        "True" => true,
        "False" => false,
        other => bail!("bad fortran_order value {:?}", other),
    };

    let shape_text = dict_value(text, "shape")?;
    let shape_text = shape_text
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| anyhow!("bad shape {:?}", shape_text))?;
    let shape = shape_text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .with_context(|| format!("bad shape dimension {:?}", s))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Header {
        dtype: DType::parse(&descr)?,
        fortran_order,
        shape,
    })
}

/// Raw text of the value stored under `key` in the header dict literal
fn dict_value<'a>(text: &'a str, key: &str) -> Result<&'a str> {
    let quoted = format!("'{}'", key);
    let start = text
        .find(&quoted)
        .ok_or_else(|| anyhow!("npy header has no {:?}", key))?;
    let rest = &text[start + quoted.len()..];
    let rest = rest
        .trim_start()
        .strip_prefix(':')
        .ok_or_else(|| anyhow!("npy header: missing ':' after {:?}", key))?;

    // a tuple value contains commas, so cut at the closing paren
    let rest_trimmed = rest.trim_start();
    let end = if rest_trimmed.starts_with('(') {
        rest_trimmed
            .find(')')
            .map(|i| i + 1)
            .ok_or_else(|| anyhow!("npy header: unterminated tuple for {:?}", key))?
    } else {
        rest_trimmed
            .find(|c: char| c == ',' || c == '}')
            .unwrap_or(rest_trimmed.len())
    };
    Ok(&rest_trimmed[..end])
}

/// Write a matrix as a version 1.0 `<f4` `.npy` file.
pub fn write_npy<P: AsRef<Path>>(path: P, matrix: &FeatureMatrix) -> Result<()> {
    let path = path.as_ref();
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.rows(),
        matrix.cols()
    );
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let header_len = u16::try_from(header.len()).context("npy header too long")?;
    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + matrix.as_slice().len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in matrix.as_slice() {
        out.extend_from_slice(&value.to_le_bytes());
    }

    let mut file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(&out)?;
    Ok(())
}
