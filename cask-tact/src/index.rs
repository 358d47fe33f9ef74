//! Archive index (`.index`) parser.
//!
//! Each CDN archive is paired with an index file locating the BLTE blobs
//! packed inside it. The file is a sequence of 4 KiB pages of fixed-width
//! entries; the trailing partial page is a footer and carries no entries.

use tracing::trace;

use crate::reader::ByteReader;
use crate::{EKey, Md5};

/// Page size of an archive index file.
pub const INDEX_PAGE_SIZE: usize = 4096;

/// Sanity bound on a single entry's size. Larger values indicate that the
/// parser has run into padding or footer bytes.
pub const MAX_ENTRY_SIZE: u32 = 2 * 1024 * 1024;

/// Where an index entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Archive,
    Patch,
}

/// Location of one encoded blob inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub ekey: EKey,
    /// Compressed size of the blob within the archive.
    pub size: u32,
    /// Byte offset of the blob within the archive.
    pub offset: u32,
    /// Hash of the archive holding the blob.
    pub archive_hash: Md5,
    pub source: IndexSource,
}

/// Parse a raw `.index` file into its entries.
///
/// Tolerant by design: parsing stops at the first entry that fails the size
/// sanity check (zero or over [`MAX_ENTRY_SIZE`]) or that cannot be read in
/// full. Zero-size entries produced by page tail padding are never emitted.
pub fn parse_index(data: &[u8], archive_hash: Md5, source: IndexSource) -> Vec<IndexEntry> {
    // A trailing partial page is a footer. When the length is an exact
    // multiple of the page size the file is treated as all data; the
    // per-entry size check stops the run before footer bytes become
    // entries.
    let data_len = if data.len() % INDEX_PAGE_SIZE != 0 {
        (data.len() / INDEX_PAGE_SIZE) * INDEX_PAGE_SIZE
    } else {
        data.len()
    };

    let mut r = ByteReader::new(&data[..data_len]);
    let mut entries = Vec::new();

    loop {
        let Ok(ekey) = r.read_key() else { break };
        let Ok(size) = r.read_u32_be() else { break };
        let Ok(offset) = r.read_u32_be() else { break };

        if size == 0 || size > MAX_ENTRY_SIZE {
            break;
        }

        entries.push(IndexEntry {
            ekey,
            size,
            offset,
            archive_hash,
            source,
        });
    }

    trace!(
        "index {}: {} entries from {} data bytes",
        hex::encode(archive_hash),
        entries.len(),
        data_len
    );

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARCHIVE: Md5 = [0xA7; 16];

    fn entry_bytes(ekey: u8, size: u32, offset: u32) -> Vec<u8> {
        let mut e = vec![ekey; 16];
        e.extend_from_slice(&size.to_be_bytes());
        e.extend_from_slice(&offset.to_be_bytes());
        e
    }

    #[test]
    fn test_basic_entries() {
        let mut data = entry_bytes(0x01, 100, 0);
        data.extend(entry_bytes(0x02, 200, 100));
        data.resize(INDEX_PAGE_SIZE + 1, 0); // partial second page = footer

        let entries = parse_index(&data, ARCHIVE, IndexSource::Archive);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            IndexEntry {
                ekey: [0x01; 16],
                size: 100,
                offset: 0,
                archive_hash: ARCHIVE,
                source: IndexSource::Archive,
            }
        );
        assert_eq!(entries[1].offset, 100);
    }

    #[test]
    fn test_footer_page_trimmed() {
        // Two full pages; the second is all zeros and must yield nothing
        let mut data = entry_bytes(0x01, 512, 0);
        data.resize(2 * INDEX_PAGE_SIZE, 0);

        let entries = parse_index(&data, ARCHIVE, IndexSource::Archive);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ekey, [0x01; 16]);
        // Zero-size padding entries are not emitted
        assert!(entries.iter().all(|e| e.size > 0));
    }

    #[test]
    fn test_oversized_entry_stops_run() {
        let mut data = entry_bytes(0x01, 100, 0);
        data.extend(entry_bytes(0x02, MAX_ENTRY_SIZE + 1, 100));
        data.extend(entry_bytes(0x03, 100, 300));
        data.resize(INDEX_PAGE_SIZE + 1, 0);

        let entries = parse_index(&data, ARCHIVE, IndexSource::Archive);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_max_size_entry_accepted() {
        let mut data = entry_bytes(0x01, MAX_ENTRY_SIZE, 0);
        data.resize(INDEX_PAGE_SIZE + 1, 0);

        let entries = parse_index(&data, ARCHIVE, IndexSource::Archive);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, MAX_ENTRY_SIZE);
    }

    #[test]
    fn test_short_input() {
        assert!(parse_index(&[0x01; 10], ARCHIVE, IndexSource::Archive).is_empty());
        assert!(parse_index(&[], ARCHIVE, IndexSource::Archive).is_empty());
    }

    #[test]
    fn test_patch_source_tag() {
        let mut data = entry_bytes(0x01, 64, 0);
        data.resize(INDEX_PAGE_SIZE + 1, 0);

        let entries = parse_index(&data, ARCHIVE, IndexSource::Patch);
        assert_eq!(entries[0].source, IndexSource::Patch);
    }
}
