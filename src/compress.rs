//! Payload Compression
//!
//! LZ4 block compression for serialized payloads. The engine compresses a
//! payload only when the entry's strategy asks for it, and falls back to the
//! uncompressed bytes when compression fails or does not shrink the payload.

use std::io;

/// Compresses a payload with LZ4, prepending the decompressed size.
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4::block::compress(data, None, true)
}

/// Decompresses a payload produced by [`compress`].
pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4::block::decompress(data, None)
}

/// Compresses a payload when doing so actually shrinks it.
///
/// Returns the stored bytes and whether they are compressed. Compression
/// failures and non-shrinking results both fall back to the original bytes.
pub fn maybe_compress(data: &[u8]) -> (Vec<u8>, bool) {
    match compress(data) {
        Ok(compressed) if compressed.len() < data.len() => (compressed, true),
        Ok(_) => (data.to_vec(), false),
        Err(err) => {
            tracing::warn!("payload compression failed, storing uncompressed: {}", err);
            (data.to_vec(), false)
        }
    }
}
