//! Encoding table parser.
//!
//! The encoding table maps Content Keys (CKey) to the Encoded Keys (EKey)
//! under which the content is actually stored, plus the decompressed file
//! size. The table arrives BLTE-wrapped; this parser expects the decoded
//! bytes.
//!
//! The table is big-endian, unlike most other TACT formats.

use std::collections::HashMap;
use tracing::{debug, trace, warn};

use crate::reader::ByteReader;
use crate::{CKey, EKey, Error, KEY_LENGTH, Result};

/// Signature bytes for the encoding table: "EN"
const ENCODING_SIGNATURE: [u8; 2] = [b'E', b'N'];

/// Size of a page-index record: first key of the page plus an MD5 of the
/// page contents. Not consulted; pages are walked linearly.
const PAGE_INDEX_RECORD_LEN: usize = 32;

/// Encoding table header (22 bytes, big-endian).
#[derive(Debug, Clone)]
pub struct EncodingHeader {
    pub version: u8,
    pub ckey_length: u8,
    pub ekey_length: u8,
    /// Page size of the CKey → EKey table, in KiB.
    pub ce_page_size_kb: u16,
    /// Page size of the espec table, in KiB. Unused here.
    pub espec_page_size_kb: u16,
    pub ce_page_count: u32,
    pub espec_page_count: u32,
    pub flags: u8,
    pub espec_block_size: u32,
}

/// One encoding table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingEntry {
    pub ckey: CKey,
    /// Alternative encodings in table order; the first is canonical.
    pub ekeys: Vec<EKey>,
    /// Decompressed file size (40-bit on the wire).
    pub file_size: u64,
}

/// Parsed encoding table with CKey lookup.
#[derive(Debug)]
pub struct EncodingTable {
    pub header: EncodingHeader,
    entries: HashMap<CKey, EncodingEntry>,
}

impl EncodingTable {
    /// Parse an encoding table from its (already BLTE-decoded) bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);

        let header = Self::parse_header(&mut r)?;
        debug!(
            "encoding header: version={}, ce_pages={}x{}KiB, espec_block={}B",
            header.version, header.ce_page_count, header.ce_page_size_kb, header.espec_block_size
        );

        // Espec string table and the page index are not consulted.
        r.skip(header.espec_block_size as usize)?;
        r.skip(header.ce_page_count as usize * PAGE_INDEX_RECORD_LEN)?;

        let page_size = header.ce_page_size_kb as usize * 1024;
        let mut entries = HashMap::new();
        let mut page_start = r.position();

        for page in 0..header.ce_page_count {
            let window = &data[page_start.min(data.len())..(page_start + page_size).min(data.len())];
            let before = entries.len();
            Self::parse_page(window, &mut entries);
            trace!("page {page}: {} entries", entries.len() - before);

            // Pages are padded to a fixed stride
            page_start += page_size;
        }

        debug!("parsed {} encoding entries", entries.len());

        Ok(Self { header, entries })
    }

    fn parse_header(r: &mut ByteReader) -> Result<EncodingHeader> {
        if r.read_bytes(2)? != ENCODING_SIGNATURE {
            return Err(Error::BadSignature);
        }

        let version = r.read_u8()?;
        if version != 1 {
            warn!("unexpected encoding table version: {version}");
        }

        let ckey_length = r.read_u8()?;
        let ekey_length = r.read_u8()?;
        if ckey_length as usize != KEY_LENGTH {
            return Err(Error::UnsupportedKeyLength(ckey_length));
        }
        if ekey_length as usize != KEY_LENGTH {
            return Err(Error::UnsupportedKeyLength(ekey_length));
        }

        Ok(EncodingHeader {
            version,
            ckey_length,
            ekey_length,
            ce_page_size_kb: r.read_u16_be()?,
            espec_page_size_kb: r.read_u16_be()?,
            ce_page_count: r.read_u32_be()?,
            espec_page_count: r.read_u32_be()?,
            flags: r.read_u8()?,
            espec_block_size: r.read_u32_be()?,
        })
    }

    /// Parse entries from one page window. Stops at a zero key count (tail
    /// padding), window exhaustion, or a short read.
    fn parse_page(window: &[u8], entries: &mut HashMap<CKey, EncodingEntry>) {
        let mut r = ByteReader::new(window);

        loop {
            let Ok(key_count) = r.read_u8() else { break };
            if key_count == 0 {
                break;
            }

            let Ok(file_size) = r.read_u40_be() else {
                break;
            };
            let Ok(ckey) = r.read_key() else { break };

            let mut ekeys = Vec::with_capacity(key_count as usize);
            for _ in 0..key_count {
                let Ok(ekey) = r.read_key() else { return };
                ekeys.push(ekey);
            }

            // Last-wins; collisions are not expected in well-formed input
            entries.insert(
                ckey,
                EncodingEntry {
                    ckey,
                    ekeys,
                    file_size,
                },
            );
        }
    }

    /// Look up an entry by content key.
    pub fn get(&self, ckey: &CKey) -> Option<&EncodingEntry> {
        self.entries.get(ckey)
    }

    /// The canonical (first) encoded key for a content key.
    pub fn get_ekey(&self, ckey: &CKey) -> Option<&EKey> {
        self.entries.get(ckey).and_then(|e| e.ekeys.first())
    }

    /// Number of content keys in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all entries.
    pub fn entries(&self) -> impl Iterator<Item = &EncodingEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_table(pages: &[Vec<u8>], page_size_kb: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&ENCODING_SIGNATURE);
        data.push(1); // version
        data.push(16); // ckey length
        data.push(16); // ekey length
        data.extend_from_slice(&page_size_kb.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes()); // espec page size
        data.extend_from_slice(&(pages.len() as u32).to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes()); // espec page count
        data.push(0); // flags
        data.extend_from_slice(&0u32.to_be_bytes()); // espec block size

        // Page index records (ignored by the parser)
        for _ in pages {
            data.extend_from_slice(&[0; PAGE_INDEX_RECORD_LEN]);
        }

        let page_size = page_size_kb as usize * 1024;
        for page in pages {
            let mut padded = page.clone();
            padded.resize(page_size, 0);
            data.extend_from_slice(&padded);
        }
        data
    }

    fn entry_bytes(key_count: u8, file_size: u64, ckey: u8, ekeys: &[u8]) -> Vec<u8> {
        let mut e = vec![key_count];
        e.extend_from_slice(&file_size.to_be_bytes()[3..]);
        e.extend_from_slice(&[ckey; 16]);
        for &b in ekeys {
            e.extend_from_slice(&[b; 16]);
        }
        e
    }

    #[test]
    fn test_smallest_valid_table() {
        let data = build_table(&[entry_bytes(1, 5, 0xAA, &[0xBB])], 4);
        let table = EncodingTable::parse(&data).unwrap();

        assert_eq!(table.len(), 1);
        let entry = table.get(&[0xAA; 16]).unwrap();
        assert_eq!(entry.ekeys, vec![[0xBB; 16]]);
        assert_eq!(entry.file_size, 5);
        assert_eq!(table.get_ekey(&[0xAA; 16]), Some(&[0xBB; 16]));
    }

    #[test]
    fn test_multiple_ekeys_preserve_order() {
        let data = build_table(&[entry_bytes(3, 1024, 0x01, &[0x10, 0x20, 0x30])], 4);
        let table = EncodingTable::parse(&data).unwrap();

        let entry = table.get(&[0x01; 16]).unwrap();
        assert_eq!(entry.ekeys, vec![[0x10; 16], [0x20; 16], [0x30; 16]]);
        // The canonical encoding is the first one listed
        assert_eq!(table.get_ekey(&[0x01; 16]), Some(&[0x10; 16]));
    }

    #[test]
    fn test_multiple_pages_fixed_stride() {
        let pages = vec![
            entry_bytes(1, 10, 0x01, &[0x11]),
            entry_bytes(1, 20, 0x02, &[0x22]),
        ];
        let data = build_table(&pages, 1);
        let table = EncodingTable::parse(&data).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&[0x01; 16]).unwrap().file_size, 10);
        assert_eq!(table.get(&[0x02; 16]).unwrap().file_size, 20);
    }

    #[test]
    fn test_lookup_is_stable() {
        let mut page = entry_bytes(1, 10, 0x01, &[0x11]);
        page.extend(entry_bytes(2, 20, 0x02, &[0x22, 0x33]));
        let data = build_table(&[page], 4);
        let table = EncodingTable::parse(&data).unwrap();

        // Every ckey maps to exactly one entry; re-looking it up returns
        // the same entry
        for entry in table.entries().collect::<Vec<_>>() {
            assert_eq!(table.get(&entry.ckey), Some(entry));
        }
    }

    #[test]
    fn test_forty_bit_file_size() {
        let data = build_table(&[entry_bytes(1, 0xFF_FFFF_FFFF, 0x0C, &[0x0D])], 4);
        let table = EncodingTable::parse(&data).unwrap();
        assert_eq!(table.get(&[0x0C; 16]).unwrap().file_size, 0xFF_FFFF_FFFF);
    }

    #[test]
    fn test_bad_signature() {
        let err = EncodingTable::parse(&[0xFF; 64]).unwrap_err();
        assert!(matches!(err, Error::BadSignature));
    }

    #[test]
    fn test_unsupported_key_length() {
        let mut data = build_table(&[], 4);
        data[3] = 9;
        let err = EncodingTable::parse(&data).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKeyLength(9)));
    }

}
