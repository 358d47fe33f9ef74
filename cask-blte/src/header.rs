//! BLTE header and block table parsing

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use tracing::trace;

use crate::{BLTE_MAGIC, Error, MD5_LENGTH, Md5, Result};

/// Fixed portion of the header: magic, header size, table format, block count.
const FIXED_HEADER_LEN: usize = 12;

/// Parsed BLTE header and block table.
#[derive(Debug, Clone)]
pub struct BlteHeader {
    /// Block table entries, in file order.
    blocks: Vec<BlockInfo>,

    /// Offset of the first block payload (end of the block table).
    data_start: usize,

    /// Sum of all declared decompressed sizes.
    total_decompressed_size: usize,
}

/// One block table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Compressed size of the block, including the codec tag byte.
    pub compressed_size: usize,

    /// Declared size of the block once decompressed.
    pub decompressed_size: usize,

    /// MD5 of the compressed block payload. Retained, not verified.
    pub checksum: Md5,

    /// MD5 of the decompressed block. Present only for table format `0x10`.
    pub decompressed_checksum: Option<Md5>,

    /// Absolute offset of the block payload, derived by summing the
    /// compressed sizes of all prior blocks in table order.
    pub compressed_offset: usize,
}

impl BlteHeader {
    /// Parse a BLTE header and block table from the start of `data`.
    ///
    /// `data` must contain the whole container: the block table is validated
    /// against the buffer length so that every block payload is in range.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(Error::TruncatedData {
                expected: FIXED_HEADER_LEN,
                actual: data.len(),
            });
        }

        let mut f = Cursor::new(data);

        let mut magic = [0; BLTE_MAGIC.len()];
        f.read_exact(&mut magic)?;
        if magic != BLTE_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let header_size = f.read_u32::<BigEndian>()?;
        if header_size == 0 {
            return Err(Error::InvalidHeaderSize(header_size));
        }

        let table_format = f.read_u8()?;
        if table_format != 0x0F && table_format != 0x10 {
            return Err(Error::UnsupportedTableFormat(table_format));
        }
        let has_decompressed_checksum = table_format == 0x10;

        let block_count = f.read_u24::<BigEndian>()?;
        if block_count == 0 {
            return Err(Error::InvalidBlockCount(block_count));
        }

        trace!("block table format {table_format:#x}, {block_count} blocks");

        let entry_len = if has_decompressed_checksum { 40 } else { 24 };
        let data_start = FIXED_HEADER_LEN + block_count as usize * entry_len;
        if data.len() < data_start {
            return Err(Error::TruncatedData {
                expected: data_start,
                actual: data.len(),
            });
        }

        let mut blocks = Vec::with_capacity(block_count as usize);
        let mut compressed_offset = data_start;
        let mut total_decompressed_size = 0;
        for _ in 0..block_count {
            let compressed_size = f.read_u32::<BigEndian>()? as usize;
            let decompressed_size = f.read_u32::<BigEndian>()? as usize;

            let mut checksum = [0; MD5_LENGTH];
            f.read_exact(&mut checksum)?;

            let decompressed_checksum = if has_decompressed_checksum {
                let mut hash = [0; MD5_LENGTH];
                f.read_exact(&mut hash)?;
                Some(hash)
            } else {
                None
            };

            blocks.push(BlockInfo {
                compressed_size,
                decompressed_size,
                checksum,
                decompressed_checksum,
                compressed_offset,
            });

            compressed_offset += compressed_size;
            if compressed_offset > data.len() {
                return Err(Error::TruncatedData {
                    expected: compressed_offset,
                    actual: data.len(),
                });
            }

            total_decompressed_size += decompressed_size;
        }

        Ok(Self {
            blocks,
            data_start,
            total_decompressed_size,
        })
    }

    /// Block table entries in file order.
    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    /// Offset of the first block payload.
    pub fn data_start(&self) -> usize {
        self.data_start
    }

    /// Sum of all declared decompressed sizes.
    pub fn total_decompressed_size(&self) -> usize {
        self.total_decompressed_size
    }
}
