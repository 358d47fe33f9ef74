//! BLTE block decompression
//!
//! Dispatches each block on its codec tag and concatenates the output.

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use std::io::{Cursor, Read};
use tracing::{debug, trace};

use crate::{BlteHeader, CompressionMode, Error, MAX_FRAME_DEPTH, Result};

/// Decode a complete BLTE container into the original file bytes.
pub fn decompress_blte(data: &[u8]) -> Result<Vec<u8>> {
    decompress_container(data, 0)
}

fn decompress_container(data: &[u8], depth: usize) -> Result<Vec<u8>> {
    if depth > MAX_FRAME_DEPTH {
        return Err(Error::RecursionLimit(MAX_FRAME_DEPTH));
    }

    let header = BlteHeader::parse(data)?;
    debug!(
        "decompressing BLTE container: {} blocks, {} bytes declared",
        header.blocks().len(),
        header.total_decompressed_size()
    );

    let mut result = Vec::with_capacity(header.total_decompressed_size());
    for block in header.blocks() {
        // Offsets were bounds-checked against `data` during header parse.
        let payload =
            &data[block.compressed_offset..block.compressed_offset + block.compressed_size];
        let decoded = decompress_block(payload, block.decompressed_size, depth)?;
        result.extend_from_slice(&decoded);
    }

    Ok(result)
}

/// Decompress a single block: codec tag byte followed by the codec payload.
///
/// `decompressed_size` is the block table's declared output size; the `Z` and
/// `4` codecs are checked against it.
pub fn decompress_block(block: &[u8], decompressed_size: usize, depth: usize) -> Result<Vec<u8>> {
    if block.is_empty() {
        return Err(Error::TruncatedData {
            expected: 1,
            actual: 0,
        });
    }

    let mode =
        CompressionMode::from_byte(block[0]).ok_or(Error::UnknownCompressionMode(block[0]))?;
    let payload = &block[1..];

    trace!("block mode {:?}, {} payload bytes", mode, payload.len());

    match mode {
        CompressionMode::None => Ok(payload.to_vec()),
        CompressionMode::ZLib => decompress_zlib(payload, decompressed_size),
        CompressionMode::Lz4 => decompress_lz4(payload, decompressed_size),
        CompressionMode::Frame => decompress_container(payload, depth + 1),
        CompressionMode::Encrypted => Err(Error::EncryptionNotSupported),
    }
}

/// Mode 'Z' - zlib
fn decompress_zlib(payload: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(payload);
    let mut result = Vec::with_capacity(decompressed_size);
    decoder
        .read_to_end(&mut result)
        .map_err(|e| Error::DecompressionFailed(format!("zlib: {e}")))?;

    if result.len() != decompressed_size {
        return Err(Error::SizeMismatch {
            expected: decompressed_size,
            actual: result.len(),
        });
    }
    Ok(result)
}

/// Mode '4' - LZ4 with a small framing header: version byte, big-endian
/// size, block-shift byte, then one raw LZ4 block.
fn decompress_lz4(payload: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    const FRAME_LEN: usize = 10;
    if payload.len() < FRAME_LEN {
        return Err(Error::TruncatedData {
            expected: FRAME_LEN,
            actual: payload.len(),
        });
    }

    let mut f = Cursor::new(payload);
    let version = f.read_u8()?;
    if version != 1 {
        return Err(Error::UnsupportedLz4Version(version));
    }

    // Declared size and block shift are informational only.
    let _size = f.read_u64::<BigEndian>()?;
    let _block_shift = f.read_u8()?;

    let result = lz4_flex::decompress(&payload[FRAME_LEN..], decompressed_size)
        .map_err(|e| Error::DecompressionFailed(format!("lz4: {e}")))?;

    if result.len() != decompressed_size {
        return Err(Error::SizeMismatch {
            expected: decompressed_size,
            actual: result.len(),
        });
    }
    Ok(result)
}
