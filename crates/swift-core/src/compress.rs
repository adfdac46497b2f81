//! zlib compression for node-owned blobs.
//!
//! Every payload a node seals is compressed first, so operation URLs and
//! cookie values stay inside browser limits.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Compresses the bytes with DEFLATE inside the zlib wrapper.
pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut z = ZlibEncoder::new(Vec::new(), Compression::default());
    z.write_all(data)?;
    z.finish()
}

/// Inverts [`compress`].
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut z = ZlibDecoder::new(data);
    let mut out = Vec::new();
    z.read_to_end(&mut out)?;
    Ok(out)
}
