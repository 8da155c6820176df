// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Minimal reader for one-dimensional `.npy` arrays.
//!
//! Open Ephys binary recordings store event sample numbers, timestamps and
//! states as NumPy arrays. Only what those files use is supported:
//! C-order, one or two dimensions (flattened), integer or float dtypes.
//!
//! # File Structure
//!
//! - Magic: `\x93NUMPY` (6 bytes), major and minor version (1 byte each)
//! - Header length: u16 LE (v1) or u32 LE (v2, v3)
//! - Header: Python dict literal, e.g. `{'descr': '<i8', 'fortran_order': False, 'shape': (12,), }`
//! - Data

use std::path::Path;
use std::sync::OnceLock;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use regex::Regex;

use crate::{EphysError, Result};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Decoded array values.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyArray {
    /// Signed or unsigned integer data
    Int(Vec<i64>),
    /// Floating point data
    Float(Vec<f64>),
}

impl NpyArray {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            NpyArray::Int(v) => v.len(),
            NpyArray::Float(v) => v.len(),
        }
    }

    /// Check if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values as integers; floats are rounded.
    pub fn to_i64(&self) -> Vec<i64> {
        match self {
            NpyArray::Int(v) => v.clone(),
            NpyArray::Float(v) => v.iter().map(|x| x.round() as i64).collect(),
        }
    }

    /// Values as floats.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            NpyArray::Int(v) => v.iter().map(|&x| x as f64).collect(),
            NpyArray::Float(v) => v.clone(),
        }
    }
}

fn header_regexes() -> &'static (Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"'descr'\s*:\s*'([<>|=])([iuf])(\d+)'").expect("valid regex"),
            Regex::new(r"'fortran_order'\s*:\s*(True|False)").expect("valid regex"),
            Regex::new(r"'shape'\s*:\s*\(([^)]*)\)").expect("valid regex"),
        )
    })
}

/// Read a `.npy` file.
pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<NpyArray> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| EphysError::io(path.display().to_string(), e))?;
    parse_npy(&bytes).map_err(|msg| EphysError::backend("npy", path.display().to_string(), msg))
}

/// Parse `.npy` bytes.
pub fn parse_npy(bytes: &[u8]) -> std::result::Result<NpyArray, String> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err("missing NUMPY magic".to_string());
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (LittleEndian::read_u16(&bytes[8..10]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header length".to_string());
            }
            (LittleEndian::read_u32(&bytes[8..12]) as usize, 12)
        }
        v => return Err(format!("unsupported npy version {v}")),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err("truncated header".to_string());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| "header is not valid UTF-8".to_string())?;

    let (descr_re, order_re, shape_re) = header_regexes();

    let descr = descr_re
        .captures(header)
        .ok_or_else(|| format!("unsupported dtype in header: {}", header.trim()))?;
    let big_endian = &descr[1] == ">";
    let kind = descr[2].chars().next().unwrap_or('i');
    let width: usize = descr[3].parse().map_err(|_| "bad dtype width".to_string())?;

    if order_re
        .captures(header)
        .is_some_and(|c| &c[1] == "True")
    {
        return Err("fortran-ordered arrays are not supported".to_string());
    }

    let shape = shape_re
        .captures(header)
        .ok_or_else(|| "missing shape".to_string())?;
    let mut count: usize = 1;
    for dim in shape[1].split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let d: usize = dim.parse().map_err(|_| format!("bad shape entry '{dim}'"))?;
        count = count.saturating_mul(d);
    }

    let data = &bytes[data_start..];
    let needed = count.saturating_mul(width);
    if data.len() < needed {
        return Err(format!(
            "data holds {} bytes, shape needs {needed}",
            data.len()
        ));
    }

    let values = data[..needed].chunks_exact(width);
    let array = match (kind, width) {
        ('f', 8) => NpyArray::Float(values.map(|c| read_f64(c, big_endian)).collect()),
        ('f', 4) => NpyArray::Float(values.map(|c| read_f32(c, big_endian) as f64).collect()),
        ('i', 1) => NpyArray::Int(values.map(|c| c[0] as i8 as i64).collect()),
        ('u', 1) => NpyArray::Int(values.map(|c| c[0] as i64).collect()),
        ('i', 2) | ('i', 4) | ('i', 8) => {
            NpyArray::Int(values.map(|c| read_int(c, big_endian, true)).collect())
        }
        ('u', 2) | ('u', 4) | ('u', 8) => {
            NpyArray::Int(values.map(|c| read_int(c, big_endian, false)).collect())
        }
        _ => return Err(format!("unsupported dtype {kind}{width}")),
    };

    Ok(array)
}

fn read_f64(c: &[u8], big_endian: bool) -> f64 {
    if big_endian {
        BigEndian::read_f64(c)
    } else {
        LittleEndian::read_f64(c)
    }
}

fn read_f32(c: &[u8], big_endian: bool) -> f32 {
    if big_endian {
        BigEndian::read_f32(c)
    } else {
        LittleEndian::read_f32(c)
    }
}

fn read_int(c: &[u8], big_endian: bool, signed: bool) -> i64 {
    let n = c.len();
    match (signed, big_endian) {
        (true, false) => LittleEndian::read_int(c, n),
        (true, true) => BigEndian::read_int(c, n),
        (false, false) => LittleEndian::read_uint(c, n) as i64,
        (false, true) => BigEndian::read_uint(c, n) as i64,
    }
}

/// Encode a one-dimensional little-endian `.npy` array (test fixtures, exports).
pub fn encode_npy_i64(values: &[i64]) -> Vec<u8> {
    encode(values.iter().flat_map(|v| v.to_le_bytes()), "<i8", values.len())
}

/// Encode a one-dimensional little-endian float64 `.npy` array.
pub fn encode_npy_f64(values: &[f64]) -> Vec<u8> {
    encode(values.iter().flat_map(|v| v.to_le_bytes()), "<f8", values.len())
}

fn encode(data: impl Iterator<Item = u8>, descr: &str, len: usize) -> Vec<u8> {
    let mut header = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': ({len},), }}");
    // magic(6) + version(2) + len(2) + header + '\n' padded to 64 bytes
    let unpadded = 10 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + len * 8);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int64() {
        let bytes = encode_npy_i64(&[3, -7, 1_000_000_000_000]);
        assert_eq!((bytes.len() - 24) % 64, 0);
        let arr = parse_npy(&bytes).unwrap();
        assert_eq!(arr, NpyArray::Int(vec![3, -7, 1_000_000_000_000]));
    }

    #[test]
    fn test_parse_float64() {
        let bytes = encode_npy_f64(&[0.5, 1.25]);
        let arr = parse_npy(&bytes).unwrap();
        assert_eq!(arr.to_f64(), vec![0.5, 1.25]);
        assert_eq!(arr.to_i64(), vec![1, 1]);
    }

    #[test]
    fn test_parse_int16_hand_built() {
        let header = "{'descr': '<i2', 'fortran_order': False, 'shape': (3,), }\n";
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for v in [1i16, -1, 8] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(parse_npy(&bytes).unwrap(), NpyArray::Int(vec![1, -1, 8]));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_npy(b"not an npy file").is_err());

        let mut truncated = encode_npy_i64(&[1, 2, 3]);
        truncated.truncate(truncated.len() - 4);
        assert!(parse_npy(&truncated).is_err());

        let header = "{'descr': '<i8', 'fortran_order': True, 'shape': (0,), }\n";
        let mut fortran = NPY_MAGIC.to_vec();
        fortran.extend_from_slice(&[1, 0]);
        fortran.extend_from_slice(&(header.len() as u16).to_le_bytes());
        fortran.extend_from_slice(header.as_bytes());
        assert!(parse_npy(&fortran).is_err());
    }
}
