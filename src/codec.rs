//! Block-chunked compress/decompress over a length-limited backend. The
//! backend here is `snap` (Snappy); its single-call input ceiling is modeled
//! as [`CHUNK_MAX`].
//!
//! Encoded layout: little-endian `u32` chunk count `K`, followed by `K`
//! records of (`u64` compressed length, that many compressed bytes).

use crate::error::GraphError;

/// Largest input fed to a single underlying Snappy `compress` call.
pub const CHUNK_MAX: usize = 4 * 1024 * 1024;

fn max_compressed_len(chunk_len: usize) -> usize {
    snap::raw::max_compress_len(chunk_len)
}

/// Compresses `input` into `out`, chunked at [`CHUNK_MAX`]. Returns the
/// number of bytes written. Fails with `CodecError` if the preflight bound
/// `K*sizeof(u64) + K*max_compressed_chunk_len` exceeds `out.len()`, or if
/// any underlying compress call fails.
pub fn compress(input: &[u8], out: &mut [u8]) -> Result<usize, GraphError> {
    let chunks: Vec<&[u8]> = if input.is_empty() {
        Vec::new()
    } else {
        input.chunks(CHUNK_MAX).collect()
    };
    let k = chunks.len() as u32;

    let preflight: usize = 4 + chunks
        .iter()
        .map(|c| 8 + max_compressed_len(c.len()))
        .sum::<usize>();
    if preflight > out.len() {
        return Err(GraphError::Codec(format!(
            "compress: preflight bound {} exceeds output buffer {}",
            preflight,
            out.len()
        )));
    }

    let mut pos = 0usize;
    out[pos..pos + 4].copy_from_slice(&k.to_le_bytes());
    pos += 4;

    let mut encoder = snap::raw::Encoder::new();
    for chunk in &chunks {
        let max_len = max_compressed_len(chunk.len());
        if pos + 8 + max_len > out.len() {
            return Err(GraphError::Codec("compress: output buffer too small mid-stream".into()));
        }
        let compressed = encoder
            .compress(chunk, &mut out[pos + 8..pos + 8 + max_len])
            .map_err(|e| GraphError::Codec(format!("snappy compress failed: {}", e)))?;
        out[pos..pos + 8].copy_from_slice(&(compressed as u64).to_le_bytes());
        pos += 8 + compressed;
    }
    Ok(pos)
}

/// Decompresses a buffer produced by [`compress`] into `out`. Returns the
/// number of bytes written. Fails with `CodecError` on a truncated header,
/// an inconsistent chunk length, an underlying decompress error, or if any
/// chunk's expansion would overflow `out.len()`.
pub fn decompress(input: &[u8], out: &mut [u8]) -> Result<usize, GraphError> {
    if input.len() < 4 {
        return Err(GraphError::Codec("decompress: truncated header".into()));
    }
    let k = u32::from_le_bytes(input[0..4].try_into().unwrap()) as usize;
    let mut pos = 4usize;
    let mut out_pos = 0usize;
    let mut decoder = snap::raw::Decoder::new();

    for _ in 0..k {
        if pos + 8 > input.len() {
            return Err(GraphError::Codec("decompress: truncated chunk length".into()));
        }
        let clen = u64::from_le_bytes(input[pos..pos + 8].try_into().unwrap()) as usize;
        pos += 8;
        if pos + clen > input.len() {
            return Err(GraphError::Codec("decompress: truncated chunk body".into()));
        }
        let chunk = &input[pos..pos + clen];
        pos += clen;

        let dlen = snap::raw::decompress_len(chunk)
            .map_err(|e| GraphError::Codec(format!("snappy decompress_len failed: {}", e)))?;
        if out_pos + dlen > out.len() {
            return Err(GraphError::Codec("decompress: output buffer too small".into()));
        }
        let written = decoder
            .decompress(chunk, &mut out[out_pos..out_pos + dlen])
            .map_err(|e| GraphError::Codec(format!("snappy decompress failed: {}", e)))?;
        out_pos += written;
    }
    Ok(out_pos)
}

/// Convenience wrapper that sizes its own output buffer from the preflight
/// bound, for callers (tile/slice save paths) that don't want to precompute it.
pub fn compress_to_vec(input: &[u8]) -> Result<Vec<u8>, GraphError> {
    let nchunks = if input.is_empty() { 0 } else { (input.len() + CHUNK_MAX - 1) / CHUNK_MAX };
    let worst = 4 + nchunks * (8 + max_compressed_len(CHUNK_MAX));
    let mut out = vec![0u8; worst.max(16)];
    let n = compress(input, &mut out)?;
    out.truncate(n);
    Ok(out)
}

/// Convenience wrapper around [`decompress`] given the known decompressed
/// length (tile/slice loads always know this from the header).
pub fn decompress_to_vec(input: &[u8], expected_len: usize) -> Result<Vec<u8>, GraphError> {
    let mut out = vec![0u8; expected_len];
    let n = decompress(input, &mut out)?;
    out.truncate(n);
    Ok(out)
}
