//! State blob encoding with optional zstd compression
//!
//! Stored form: one codec byte followed by the payload.

use crate::StoreError;

/// Payload stored as-is
const CODEC_RAW: u8 = 0;
/// Payload is a zstd frame
const CODEC_ZSTD: u8 = 1;

/// Blobs at or above this size are compressed (4 KiB)
pub const DEFAULT_COMPRESS_THRESHOLD: usize = 4 * 1024;

const ZSTD_LEVEL: i32 = 3;

/// Encode a state blob for storage
///
/// Compression is kept only when it actually shrinks the payload.
pub fn encode(data: &[u8], compress_threshold: usize) -> Result<Vec<u8>, StoreError> {
    if data.len() >= compress_threshold {
        let compressed = zstd::encode_all(data, ZSTD_LEVEL)?;
        if compressed.len() < data.len() {
            let mut out = Vec::with_capacity(compressed.len() + 1);
            out.push(CODEC_ZSTD);
            out.extend_from_slice(&compressed);
            return Ok(out);
        }
    }

    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(CODEC_RAW);
    out.extend_from_slice(data);
    Ok(out)
}

/// Decode a stored blob back into the original state
pub fn decode(stored: &[u8]) -> Result<Vec<u8>, StoreError> {
    match stored.split_first() {
        Some((&CODEC_RAW, payload)) => Ok(payload.to_vec()),
        Some((&CODEC_ZSTD, payload)) => Ok(zstd::decode_all(payload)?),
        Some((codec, _)) => Err(StoreError::Compression(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unknown blob codec {}", codec),
        ))),
        None => Err(StoreError::Compression(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "empty stored blob",
        ))),
    }
}
