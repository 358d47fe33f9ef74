//! Root manifest parsers.
//!
//! The root manifest maps stable identifiers to content keys. Two variants
//! share the entry model:
//!
//! * `MFST` — modern products: binary, little-endian, fileDataID-keyed with
//!   delta compression and optional name hashes. Carries no paths.
//! * `War3` — Warcraft III: pipe-delimited UTF-8 text of
//!   `path|key|locale` lines, with fileDataIDs derived by hashing the path.

use modular_bitfield::prelude::*;
use std::ops::BitAnd;
use tracing::{debug, trace};

use crate::reader::ByteReader;
use crate::{CKey, Error, Result};

const MFST_MAGIC: &[u8; 4] = b"MFST";
const WAR3_MAGIC: &[u8; 4] = b"War3";

/// Bitmask of locales a root entry applies to.
#[bitfield(bytes = 4)]
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u32)]
pub struct LocaleFlags {
    #[skip]
    __: B1,
    pub en_us: bool, // 0x2
    pub ko_kr: bool, // 0x4
    #[skip]
    __: B1,
    pub fr_fr: bool, // 0x10
    pub de_de: bool, // 0x20
    pub zh_cn: bool, // 0x40
    pub es_es: bool, // 0x80

    pub zh_tw: bool, // 0x100
    pub en_gb: bool, // 0x200
    pub en_cn: bool, // 0x400
    pub en_tw: bool, // 0x800

    pub es_mx: bool, // 0x1000
    pub ru_ru: bool, // 0x2000
    pub pt_br: bool, // 0x4000
    pub it_it: bool, // 0x8000

    pub pt_pt: bool, // 0x10000
    #[skip]
    __: B15,
}

impl LocaleFlags {
    /// Match a locale name token against the known names, verbatim.
    ///
    /// Unknown tokens yield no flags.
    pub fn from_name(name: &str) -> Self {
        let bits: u32 = match name {
            "enUS" => 0x2,
            "koKR" => 0x4,
            "frFR" => 0x10,
            "deDE" => 0x20,
            "zhCN" => 0x40,
            "esES" => 0x80,
            "zhTW" => 0x100,
            "enGB" => 0x200,
            "enCN" => 0x400,
            "enTW" => 0x800,
            "esMX" => 0x1000,
            "ruRU" => 0x2000,
            "ptBR" => 0x4000,
            "itIT" => 0x8000,
            "ptPT" => 0x10000,
            _ => 0,
        };
        Self::from(bits)
    }

    /// `true` if at least one locale flag is set.
    pub fn any(&self) -> bool {
        u32::from(*self) != 0
    }
}

impl BitAnd for LocaleFlags {
    type Output = LocaleFlags;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from(u32::from(self) & u32::from(rhs))
    }
}

/// Content flags on a root entry.
#[bitfield(bytes = 4)]
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
#[repr(u32)]
pub struct ContentFlags {
    #[skip]
    __: B2,
    /// File is in the install manifest.
    pub install: bool, // 0x4
    /// Non-Windows clients should ignore this file.
    pub windows: bool, // 0x8
    /// Non-macOS clients should ignore this file.
    pub macos: bool, // 0x10
    pub x86_32: bool, // 0x20
    pub x86_64: bool, // 0x40
    pub low_violence: bool, // 0x80

    #[skip]
    __: B19,

    /// Diagnostic only; encrypted content is rejected downstream.
    pub encrypted: bool, // 0x8000000
    pub no_name_hash: bool, // 0x10000000
    pub uncommon_resolution: bool, // 0x20000000
    pub bundle: bool, // 0x40000000
    pub no_compression: bool, // 0x80000000
}

/// One root manifest entry. Duplicate fileDataIDs are permitted, one per
/// locale/flag combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
    pub file_data_id: u32,
    pub content_key: CKey,
    pub name_hash: Option<u64>,
    pub locale_flags: LocaleFlags,
    pub content_flags: ContentFlags,
    /// Lower-cased, slash-normalized path. Only the text variant carries
    /// paths.
    pub normalized_path: Option<String>,
    /// `':'`-separated path prefix components (e.g. the containing mod).
    pub scopes: Vec<String>,
}

/// Parsed root manifest with path and content-key lookup.
#[derive(Debug)]
pub struct RootManifest {
    entries: Vec<RootEntry>,
}

impl RootManifest {
    /// Parse a root manifest from its (already BLTE-decoded) bytes,
    /// dispatching on the leading magic.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let Some(magic) = data.get(..4) else {
            return Err(Error::OutOfRange {
                requested: 4,
                remaining: data.len(),
            });
        };

        let entries = if magic == MFST_MAGIC {
            parse_mfst(&data[4..])?
        } else if magic == WAR3_MAGIC {
            parse_war3(&data[4..])
        } else {
            let mut got = [0; 4];
            got.copy_from_slice(magic);
            return Err(Error::BadMagic(got));
        };

        debug!("parsed root manifest: {} entries", entries.len());
        Ok(Self { entries })
    }

    /// All entries, in manifest order.
    pub fn entries(&self) -> &[RootEntry] {
        &self.entries
    }

    /// First entry with the given content key.
    pub fn get_entry_by_ckey(&self, ckey: &CKey) -> Option<&RootEntry> {
        self.entries.iter().find(|e| &e.content_key == ckey)
    }

    /// All entries whose normalized path contains the normalized query as a
    /// substring.
    pub fn get_entries_by_path(&self, path: &str) -> Vec<&RootEntry> {
        let query = normalize_path(path);
        self.entries
            .iter()
            .filter(|e| {
                e.normalized_path
                    .as_deref()
                    .is_some_and(|p| p.contains(&query))
            })
            .collect()
    }
}

/// Normalize a path for storage and lookup: lower-case, backslash runs
/// collapsed to a single `/`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_backslash = false;
    for c in path.chars() {
        if c == '\\' {
            if !prev_backslash {
                out.push('/');
            }
            prev_backslash = true;
        } else {
            prev_backslash = false;
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// 32-bit positive path hash used by the text variant for fileDataIDs:
/// `h = (h << 5) - h + c` over the code points, then the magnitude.
fn path_hash(path: &str) -> u32 {
    let mut h: i32 = 0;
    for c in path.chars() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32);
    }
    h.unsigned_abs()
}

fn parse_mfst(body: &[u8]) -> Result<Vec<RootEntry>> {
    let mut r = ByteReader::new(body);

    // The first word is either a header size or the total file count; a
    // header is present when the value is plausibly a header size.
    let probe = r.read_u32_le()?;
    let (header_size, version) = if (12..=100).contains(&probe) {
        (probe, r.read_u32_le()?)
    } else {
        r.seek(r.position() - 4)?;
        (0, 1)
    };

    if version != 1 && version != 2 {
        return Err(Error::UnsupportedVersion(version));
    }

    let total_file_count = r.read_u32_le()?;
    let named_file_count = r.read_u32_le()?;
    if header_size > 0 {
        r.skip(4)?; // reserved
    }

    trace!(
        "MFST root: version={version}, total={total_file_count}, named={named_file_count}"
    );

    let mut entries = Vec::new();
    loop {
        if r.is_eof() {
            break;
        }
        match parse_mfst_block(&mut r, version, total_file_count, named_file_count) {
            Ok(block) => entries.extend(block),
            // A structural shortfall mid-block ends iteration cleanly
            Err(Error::OutOfRange { .. }) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(entries)
}

fn parse_mfst_block(
    r: &mut ByteReader,
    version: u32,
    total_file_count: u32,
    named_file_count: u32,
) -> Result<Vec<RootEntry>> {
    let num_records = r.read_u32_le()? as usize;

    let (content_flags, locale_flags) = if version == 2 {
        let locale = LocaleFlags::from(r.read_u32_le()?);
        let unk1 = r.read_u32_le()?;
        let unk2 = r.read_u32_le()?;
        let unk3 = r.read_u8()?;
        (
            ContentFlags::from(unk1 | unk2 | (u32::from(unk3) << 17)),
            locale,
        )
    } else {
        (
            ContentFlags::from(r.read_u32_le()?),
            LocaleFlags::from(r.read_u32_le()?),
        )
    };

    let has_name_hashes =
        !(total_file_count != named_file_count && content_flags.no_name_hash());

    // Delta-compressed fileDataIDs
    let mut file_data_ids = Vec::with_capacity(num_records);
    let mut current = 0u32;
    for i in 0..num_records {
        let delta = r.read_i32_le()?;
        current = if i == 0 {
            u32::try_from(delta).map_err(|_| Error::FileIdDeltaOverflow)?
        } else {
            current
                .checked_add(1)
                .and_then(|v| v.checked_add_signed(delta))
                .ok_or(Error::FileIdDeltaOverflow)?
        };
        file_data_ids.push(current);
    }

    let mut content_keys = Vec::with_capacity(num_records);
    for _ in 0..num_records {
        content_keys.push(r.read_key()?);
    }

    let name_hashes = if has_name_hashes {
        let mut hashes = Vec::with_capacity(num_records);
        for _ in 0..num_records {
            hashes.push(r.read_u64_le()?);
        }
        Some(hashes)
    } else {
        None
    };

    let entries = file_data_ids
        .into_iter()
        .zip(content_keys)
        .enumerate()
        .map(|(i, (file_data_id, content_key))| RootEntry {
            file_data_id,
            content_key,
            name_hash: name_hashes.as_ref().map(|h| h[i]),
            locale_flags,
            content_flags,
            normalized_path: None,
            scopes: Vec::new(),
        })
        .collect();

    Ok(entries)
}

fn parse_war3(body: &[u8]) -> Vec<RootEntry> {
    let text = String::from_utf8_lossy(body);
    let mut entries = Vec::new();

    for line in text.split("\r\n") {
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split('|');
        let path = fields.next().unwrap_or("").trim();
        let key_hex = fields.next().unwrap_or("").trim();
        let locale = fields.next().unwrap_or("").trim();
        if path.is_empty() || key_hex.is_empty() {
            continue;
        }

        // Warcraft III conflates content and encoded keys
        let Ok(key_bytes) = hex::decode(key_hex) else {
            continue;
        };
        let Ok(content_key) = CKey::try_from(key_bytes.as_slice()) else {
            continue;
        };

        let file_data_id = path_hash(path);
        let scopes: Vec<String> = {
            let parts: Vec<&str> = path.split(':').collect();
            parts[..parts.len() - 1]
                .iter()
                .map(|s| s.to_string())
                .collect()
        };

        entries.push(RootEntry {
            file_data_id,
            content_key,
            name_hash: Some(u64::from(file_data_id)),
            locale_flags: LocaleFlags::from_name(locale),
            content_flags: ContentFlags::from(0),
            normalized_path: Some(normalize_path(path)),
            scopes,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_flag_bits() {
        assert!(LocaleFlags::from(0x2).en_us());
        assert!(LocaleFlags::from(0x4).ko_kr());
        assert!(LocaleFlags::from(0x10).fr_fr());
        assert!(LocaleFlags::from(0x10000).pt_pt());
        assert!(!LocaleFlags::from(0x2).ko_kr());
        assert!(LocaleFlags::from_name("enUS").en_us());
        assert!(LocaleFlags::from_name("ruRU").ru_ru());
        assert!(!LocaleFlags::from_name("en-US").any());
        assert!(!LocaleFlags::from_name("").any());
    }

    #[test]
    fn test_content_flag_bits() {
        assert!(ContentFlags::from(0x10000000).no_name_hash());
        assert!(ContentFlags::from(0x8000000).encrypted());
        assert!(!ContentFlags::from(0x10000000).encrypted());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("Foo\\Bar"), "foo/bar");
        assert_eq!(normalize_path("foo/bar"), "foo/bar");
        assert_eq!(normalize_path("A\\\\B\\c.TXT"), "a/b/c.txt");
    }

    fn build_mfst_v1_block(
        content_flags: u32,
        locale: u32,
        deltas: &[i32],
        keys: &[CKey],
        hashes: Option<&[u64]>,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(deltas.len() as u32).to_le_bytes());
        data.extend_from_slice(&content_flags.to_le_bytes());
        data.extend_from_slice(&locale.to_le_bytes());
        for d in deltas {
            data.extend_from_slice(&d.to_le_bytes());
        }
        for k in keys {
            data.extend_from_slice(k);
        }
        if let Some(hashes) = hashes {
            for h in hashes {
                data.extend_from_slice(&h.to_le_bytes());
            }
        }
        data
    }

    #[test]
    fn test_mfst_delta_reconstruction() {
        let keys = [[0x01; 16], [0x02; 16], [0x03; 16]];
        let mut data = b"MFST".to_vec();
        data.extend_from_slice(&3u32.to_le_bytes()); // total
        data.extend_from_slice(&3u32.to_le_bytes()); // named
        data.extend(build_mfst_v1_block(0, 0x2, &[10, 0, 4], &keys, Some(&[0, 0, 0])));

        let root = RootManifest::parse(&data).unwrap();
        let entries = root.entries();
        assert_eq!(entries.len(), 3);

        let fids: Vec<u32> = entries.iter().map(|e| e.file_data_id).collect();
        assert_eq!(fids, vec![10, 11, 16]);
        assert!(entries.iter().all(|e| e.locale_flags.en_us()));
        assert!(entries.iter().all(|e| e.normalized_path.is_none()));
        assert_eq!(entries[2].content_key, [0x03; 16]);
        assert_eq!(entries[0].name_hash, Some(0));

        // Reconstructed IDs are strictly increasing within a block
        assert!(fids.windows(2).all(|w| w[1] >= w[0] + 1));
    }

    #[test]
    fn test_mfst_header_size_variant() {
        // headerSize=12 in [12, 100] triggers the extended header path
        let keys = [[0xAB; 16]];
        let mut data = b"MFST".to_vec();
        data.extend_from_slice(&12u32.to_le_bytes()); // header size
        data.extend_from_slice(&1u32.to_le_bytes()); // version
        data.extend_from_slice(&1u32.to_le_bytes()); // total
        data.extend_from_slice(&1u32.to_le_bytes()); // named
        data.extend_from_slice(&0u32.to_le_bytes()); // reserved
        data.extend(build_mfst_v1_block(0, 0x2, &[7], &keys, Some(&[99])));

        let root = RootManifest::parse(&data).unwrap();
        assert_eq!(root.entries().len(), 1);
        assert_eq!(root.entries()[0].file_data_id, 7);
        assert_eq!(root.entries()[0].name_hash, Some(99));
    }

    #[test]
    fn test_mfst_name_hash_rule() {
        // total != named and the NoNameHash bit set: no hash array
        let keys = [[0x0E; 16]];
        let mut data = b"MFST".to_vec();
        data.extend_from_slice(&2u32.to_le_bytes()); // total
        data.extend_from_slice(&1u32.to_le_bytes()); // named
        data.extend(build_mfst_v1_block(0x10000000, 0x2, &[1], &keys, None));

        let root = RootManifest::parse(&data).unwrap();
        assert_eq!(root.entries().len(), 1);
        assert_eq!(root.entries()[0].name_hash, None);
        assert!(root.entries()[0].content_flags.no_name_hash());
    }

    #[test]
    fn test_mfst_truncated_block_ends_cleanly() {
        let keys = [[0x01; 16]];
        let mut data = b"MFST".to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend(build_mfst_v1_block(0, 0x2, &[5], &keys, Some(&[0])));
        // A second block header that cannot be read in full
        data.extend_from_slice(&[0x03, 0x00]);

        let root = RootManifest::parse(&data).unwrap();
        assert_eq!(root.entries().len(), 1);
    }

    #[test]
    fn test_mfst_negative_first_delta() {
        let keys = [[0x01; 16]];
        let mut data = b"MFST".to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend(build_mfst_v1_block(0, 0x2, &[-5], &keys, Some(&[0])));

        let err = RootManifest::parse(&data).unwrap_err();
        assert!(matches!(err, Error::FileIdDeltaOverflow));
    }

    const WAR3_KEY_A: &str = "31323334353637383930616263646566";
    const WAR3_KEY_B: &str = "61616161616161616161616161616161";

    fn war3_manifest() -> Vec<u8> {
        let mut data = b"War3".to_vec();
        data.extend_from_slice(
            format!(
                "Units\\Human.slk|{WAR3_KEY_A}|enUS\r\n\
                 \r\n\
                 war3.w3mod:UI\\Glue.fdf|{WAR3_KEY_B}|deDE\r\n\
                 missing-key-line|\r\n"
            )
            .as_bytes(),
        );
        data
    }

    #[test]
    fn test_war3_parse() {
        let root = RootManifest::parse(&war3_manifest()).unwrap();
        let entries = root.entries();
        assert_eq!(entries.len(), 2);

        let human = &entries[0];
        assert_eq!(human.normalized_path.as_deref(), Some("units/human.slk"));
        assert_eq!(hex::encode(human.content_key), WAR3_KEY_A);
        assert!(human.locale_flags.en_us());
        assert!(human.scopes.is_empty());
        assert_eq!(human.name_hash, Some(u64::from(human.file_data_id)));

        let glue = &entries[1];
        assert_eq!(glue.scopes, vec!["war3.w3mod".to_string()]);
        assert!(glue.locale_flags.de_de());
        assert_eq!(
            glue.normalized_path.as_deref(),
            Some("war3.w3mod:ui/glue.fdf")
        );
    }

    #[test]
    fn test_war3_path_lookup_normalization() {
        let root = RootManifest::parse(&war3_manifest()).unwrap();

        let by_backslash = root.get_entries_by_path("Units\\Human.slk");
        let by_slash = root.get_entries_by_path("units/human.slk");
        assert_eq!(by_backslash.len(), 1);
        assert_eq!(by_backslash, by_slash);

        // Substring match
        assert_eq!(root.get_entries_by_path("human").len(), 1);
        assert_eq!(root.get_entries_by_path(".slk").len(), 1);
        assert!(root.get_entries_by_path("nonexistent").is_empty());
    }

    #[test]
    fn test_lookup_by_ckey() {
        let root = RootManifest::parse(&war3_manifest()).unwrap();
        let mut key = [0u8; 16];
        key.copy_from_slice(&hex::decode(WAR3_KEY_A).unwrap());

        let entry = root.get_entry_by_ckey(&key).unwrap();
        assert_eq!(entry.normalized_path.as_deref(), Some("units/human.slk"));
        assert!(root.get_entry_by_ckey(&[0xFF; 16]).is_none());
    }

    #[test]
    fn test_bad_magic() {
        let err = RootManifest::parse(b"ROOT????").unwrap_err();
        assert!(matches!(err, Error::BadMagic(_)));
    }
}
