//! Shared file-format tags and binary (de)serialization helpers used by the
//! CSR tile, DenseVector and DiskVector layers. Layouts are bit-exact across
//! builds and platforms.

use std::io::{Read, Write};

use crate::codec;
use crate::error::{GraphError, IoResultExt};

/// On-disk payload encoding: raw little-endian bytes, or chunked Snappy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Bin = 0,
    SnappyChunked = 1,
}

impl FileFormat {
    pub fn from_i32(v: i32) -> Result<Self, GraphError> {
        match v {
            0 => Ok(FileFormat::Bin),
            1 => Ok(FileFormat::SnappyChunked),
            other => Err(GraphError::Format(format!("unknown file_format tag {}", other))),
        }
    }
}

pub const TYPE_NAME_CSR_BOOL: &str = "SparseBMatrixCSR";
pub const TYPE_NAME_CSR_WEIGHTED: &str = "SparseMatrixCSR";
pub const TYPE_NAME_VECTOR: &str = "Vector";

/// A fixed-width little-endian-serializable scalar: the numeric type `T`
/// DenseVector and weighted CSR tiles are generic over.
pub trait Scalar: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    const WIDTH: usize;
    fn to_le(self, out: &mut [u8]);
    fn from_le(bytes: &[u8]) -> Self;
    fn is_zero(self) -> bool;
    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
    fn mul(self, other: Self) -> Self;
    fn div(self, other: Self) -> Self;
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

impl Scalar for f64 {
    const WIDTH: usize = 8;
    fn to_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
    fn from_le(bytes: &[u8]) -> Self {
        let mut b = [0u8; 8];
        b.copy_from_slice(bytes);
        f64::from_le_bytes(b)
    }
    fn is_zero(self) -> bool {
        self == 0.0
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn sub(self, other: Self) -> Self {
        self - other
    }
    fn mul(self, other: Self) -> Self {
        self * other
    }
    fn div(self, other: Self) -> Self {
        self / other
    }
    fn to_f64(self) -> f64 {
        self
    }
    fn from_f64(v: f64) -> Self {
        v
    }
}

impl Scalar for u64 {
    const WIDTH: usize = 8;
    fn to_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
    fn from_le(bytes: &[u8]) -> Self {
        let mut b = [0u8; 8];
        b.copy_from_slice(bytes);
        u64::from_le_bytes(b)
    }
    fn is_zero(self) -> bool {
        self == 0
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn sub(self, other: Self) -> Self {
        self.saturating_sub(other)
    }
    fn mul(self, other: Self) -> Self {
        self * other
    }
    fn div(self, other: Self) -> Self {
        self / other
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as u64
    }
}

pub fn write_type_header(w: &mut impl Write, type_name: &str) -> Result<(), GraphError> {
    let bytes = type_name.as_bytes();
    w.write_all(&(bytes.len() as u64).to_le_bytes()).with_path("")?;
    w.write_all(bytes).with_path("")?;
    Ok(())
}

pub fn read_type_header(r: &mut impl Read) -> Result<String, GraphError> {
    let mut len_buf = [0u8; 8];
    r.read_exact(&mut len_buf).with_path("")?;
    let len = u64::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).with_path("")?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Reads the type-name header and checks it against the allowed set,
/// returning `FormatError` on mismatch.
pub fn expect_type_header(r: &mut impl Read, expected: &[&str]) -> Result<(), GraphError> {
    let found = read_type_header(r)?;
    if !expected.iter().any(|e| *e == found) {
        return Err(GraphError::Format(format!(
            "type-name mismatch: expected one of {:?}, found '{}'",
            expected, found
        )));
    }
    Ok(())
}

fn pack_le<T: Scalar>(values: &[T]) -> Vec<u8> {
    let mut buf = vec![0u8; values.len() * T::WIDTH];
    for (i, v) in values.iter().enumerate() {
        v.to_le(&mut buf[i * T::WIDTH..(i + 1) * T::WIDTH]);
    }
    buf
}

fn unpack_le<T: Scalar>(bytes: &[u8], count: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        out.push(T::from_le(&bytes[i * T::WIDTH..(i + 1) * T::WIDTH]));
    }
    out
}

/// Writes `payload(X)` for an array of scalars: raw bytes for BIN, or a
/// `u64` compressed length followed by codec output for SNAPPY-CHUNKED.
pub fn write_payload<T: Scalar>(
    w: &mut impl Write,
    values: &[T],
    format: FileFormat,
) -> Result<(), GraphError> {
    let raw = pack_le(values);
    match format {
        FileFormat::Bin => {
            w.write_all(&raw).with_path("")?;
        }
        FileFormat::SnappyChunked => {
            let compressed = codec::compress_to_vec(&raw)?;
            w.write_all(&(compressed.len() as u64).to_le_bytes()).with_path("")?;
            w.write_all(&compressed).with_path("")?;
        }
    }
    Ok(())
}

/// Reads `payload(X)` for an array of `count` scalars.
pub fn read_payload<T: Scalar>(
    r: &mut impl Read,
    count: usize,
    format: FileFormat,
) -> Result<Vec<T>, GraphError> {
    match format {
        FileFormat::Bin => {
            let mut buf = vec![0u8; count * T::WIDTH];
            r.read_exact(&mut buf).with_path("")?;
            Ok(unpack_le(&buf, count))
        }
        FileFormat::SnappyChunked => {
            let mut len_buf = [0u8; 8];
            r.read_exact(&mut len_buf).with_path("")?;
            let clen = u64::from_le_bytes(len_buf) as usize;
            let mut cbuf = vec![0u8; clen];
            r.read_exact(&mut cbuf).with_path("")?;
            let raw = codec::decompress_to_vec(&cbuf, count * T::WIDTH)?;
            Ok(unpack_le(&raw, count))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrip_bin() {
        let values: Vec<f64> = vec![1.0, 2.5, -3.25, 0.0];
        let mut buf = Vec::new();
        write_payload(&mut buf, &values, FileFormat::Bin).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let back: Vec<f64> = read_payload(&mut cursor, values.len(), FileFormat::Bin).unwrap();
        assert_eq!(values, back);
    }

    #[test]
    fn payload_roundtrip_snappy_chunked() {
        let values: Vec<u64> = (0..5000).collect();
        let mut buf = Vec::new();
        write_payload(&mut buf, &values, FileFormat::SnappyChunked).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let back: Vec<u64> =
            read_payload(&mut cursor, values.len(), FileFormat::SnappyChunked).unwrap();
        assert_eq!(values, back);
    }

    #[test]
    fn type_header_roundtrip() {
        let mut buf = Vec::new();
        write_type_header(&mut buf, TYPE_NAME_VECTOR).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let name = read_type_header(&mut cursor).unwrap();
        assert_eq!(name, TYPE_NAME_VECTOR);
    }
}
