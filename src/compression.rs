//! zlib decompression with an exact-size contract, and the `ZLB`
//! framing used by compressed archive entries.

use std::io::Read;

use binrw::binread;
use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};

/// Size of the `ZLB\0` frame preceding a compressed payload.
pub const ZLB_HEADER_SIZE: usize = 16;

/// The `ZLB\0` frame: magic, version (always 0), uncompressed size,
/// compressed size, then the zlib stream.
#[binread]
#[derive(Debug, Clone, Copy)]
#[br(little, magic = b"ZLB\0")]
pub struct ZlbHeader {
    pub version: u32,
    pub out_size: u32,
    pub in_size: u32,
}

/// Inflate `compressed` into a buffer of exactly `expected_size` bytes.
///
/// The stream failing to decode maps to [`Error::DecompressFailed`]; a
/// stream that yields any other length maps to [`Error::SizeMismatch`].
pub fn inflate_exact(compressed: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(expected_size)
        .map_err(|_| Error::OutOfMemory(expected_size))?;

    // Reading one byte past the expected size detects oversized streams
    // without letting a hostile file allocate unbounded memory.
    let mut decoder = ZlibDecoder::new(compressed).take(expected_size as u64 + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::DecompressFailed(e.to_string()))?;

    if out.len() != expected_size {
        return Err(Error::SizeMismatch {
            expected: expected_size,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Unwrap a `ZLB\0`-framed buffer and inflate its payload.
pub fn read_zlb(data: &[u8]) -> Result<Vec<u8>> {
    use binrw::BinReaderExt;

    let mut cursor = std::io::Cursor::new(data);
    let header: ZlbHeader = cursor.read_le()?;
    if header.version != 0 {
        return Err(Error::UnsupportedVersion {
            what: "ZLB",
            version: header.version,
        });
    }
    let payload = data
        .get(ZLB_HEADER_SIZE..ZLB_HEADER_SIZE + header.in_size as usize)
        .ok_or(Error::Truncated)?;
    inflate_exact(payload, header.out_size as usize)
}
