//! The CASC client: initialization and the three-hop extraction pipeline.
//!
//! Steady-state resolution is
//!
//! ```text
//! path → RootManifest → CKey → EncodingTable → EKey
//!      → archive index → (archive, offset, size) → BLTE → bytes
//! ```
//!
//! All tables are assembled once during [`CascClient::init`] and are
//! immutable afterwards.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use cask_blte::decompress_blte;
use cask_cdn::{CdnClient, CdnEntry, DiskCache, PatchClient, Region};
use cask_tact::config::{BuildConfig, CdnConfig};
use cask_tact::encoding::EncodingTable;
use cask_tact::index::{IndexEntry, IndexSource, parse_index};
use cask_tact::root::{RootEntry, RootManifest};
use cask_tact::{CKey, EKey, KEY_LENGTH, Md5};

use crate::source::{BlobSource, CdnSource};
use crate::{Error, Result};

/// Maximum concurrent archive index fetches per batch.
pub const INDEX_FETCH_BATCH: usize = 10;

/// A read-only online CASC client for one product build.
#[derive(Debug)]
pub struct CascClient<S = CdnSource> {
    source: S,
    build: BuildConfig,
    cdn_config: CdnConfig,
    encoding: EncodingTable,
    index: HashMap<EKey, IndexEntry>,
    root: Option<RootManifest>,
}

/// Parse a hex key string into its wire form.
fn parse_key(text: &str) -> Result<Md5> {
    let bytes = hex::decode(text).map_err(|_| Error::InvalidKey(text.to_string()))?;
    if bytes.len() != KEY_LENGTH {
        return Err(Error::InvalidKey(text.to_string()));
    }
    let mut key = [0; KEY_LENGTH];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Pick the CDN entry for a region: exact name match, then `eu`, then the
/// first listed.
fn pick_cdn(entries: &[CdnEntry], region: Region) -> Result<&CdnEntry> {
    entries
        .iter()
        .find(|e| e.name == region.as_str())
        .or_else(|| entries.iter().find(|e| e.name == "eu"))
        .or_else(|| entries.first())
        .ok_or(Error::NoCdn)
}

impl CascClient<CdnSource> {
    /// Discover the current build of `product` in `region` and assemble the
    /// full client: CDN list, version, configs, encoding table, archive
    /// indices, and (when the build has one) the root manifest.
    pub async fn init(product: &str, region: Region) -> Result<Self> {
        let patch = PatchClient::new(region)?;

        let cdns = patch.get_cdns_parsed(product).await?;
        let cdn = pick_cdn(&cdns, region)?;
        let host = cdn.best_hosts().first().ok_or(Error::NoCdn)?.clone();
        debug!("using CDN host {host} with path {}", cdn.path);

        let version = patch
            .get_versions_parsed(product)
            .await?
            .into_iter()
            .find(|v| v.region == region.as_str())
            .ok_or_else(|| Error::NoVersion(region.to_string()))?;
        info!(
            "{product} {region}: version {} (build config {})",
            version.versions_name, version.build_config
        );

        // The cache is advisory; running without one is fine
        let cache = match DiskCache::new(product).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!("disk cache unavailable: {e}");
                None
            }
        };

        let source = CdnSource::new(CdnClient::new()?, cache, host, cdn.path.clone());
        Self::init_with_source(source, &version.build_config, &version.cdn_config).await
    }
}

impl<S: BlobSource> CascClient<S> {
    /// Assemble a client from an explicit blob source and config hashes.
    pub async fn init_with_source(
        source: S,
        build_config_hash: &str,
        cdn_config_hash: &str,
    ) -> Result<Self> {
        let build_text = source.config(build_config_hash).await?;
        let build = BuildConfig::parse(&String::from_utf8_lossy(&build_text));

        let cdn_text = source.config(cdn_config_hash).await?;
        let cdn_config = CdnConfig::parse(&String::from_utf8_lossy(&cdn_text));

        // Encoding table: stored under its EKey, BLTE-wrapped
        let encoding_ekey = build.encoding_ekey().ok_or(Error::NoEncodingHash)?;
        let encoding_blob = source.data(encoding_ekey).await?;
        let encoding = EncodingTable::parse(&decompress_blte(&encoding_blob)?)?;
        info!("encoding table: {} entries", encoding.len());

        let index = Self::load_archives(&source, cdn_config.archives()).await;
        info!("archive index: {} entries", index.len());

        let root = match build.root_ckey() {
            Some(root_ckey) => Some(Self::load_root(&source, &encoding, root_ckey).await?),
            None => None,
        };

        Ok(Self {
            source,
            build,
            cdn_config,
            encoding,
            index,
            root,
        })
    }

    /// Fetch and parse every archive index, at most [`INDEX_FETCH_BATCH`]
    /// concurrently, joining each batch before the next starts.
    ///
    /// Individual archives may be unreachable; failures are logged and the
    /// client continues with a partial map. Each task returns its entries
    /// as an owned sequence and the merge happens single-threaded here.
    async fn load_archives(source: &S, archives: &[String]) -> HashMap<EKey, IndexEntry> {
        let mut index = HashMap::new();

        for batch in archives.chunks(INDEX_FETCH_BATCH) {
            let results = futures::future::join_all(batch.iter().map(|hash| async move {
                let archive_hash = parse_key(hash)?;
                let bytes = source.index(hash).await?;
                Ok::<_, Error>(parse_index(&bytes, archive_hash, IndexSource::Archive))
            }))
            .await;

            for (hash, result) in batch.iter().zip(results) {
                match result {
                    Ok(entries) => {
                        for entry in entries {
                            index.insert(entry.ekey, entry);
                        }
                    }
                    Err(e) => warn!("skipping archive index {hash}: {e}"),
                }
            }
        }

        index
    }

    /// Fetch and parse the root manifest: CKey resolved to an EKey through
    /// the encoding table, fetched as a loose data blob.
    async fn load_root(
        source: &S,
        encoding: &EncodingTable,
        root_ckey: &str,
    ) -> Result<RootManifest> {
        let ckey = parse_key(root_ckey)?;
        let ekey = encoding.get_ekey(&ckey).copied().unwrap_or(ckey);

        let blob = source.data(&hex::encode(ekey)).await?;
        let root = RootManifest::parse(&decompress_blte(&blob)?)?;
        info!("root manifest: {} entries", root.entries().len());
        Ok(root)
    }

    /// The EKey candidates for a content key: the encoding table's list,
    /// or the CKey itself when the table lacks the entry (loose files).
    fn ekey_candidates(&self, ckey: &CKey) -> Vec<EKey> {
        match self.encoding.get(ckey) {
            Some(entry) => entry.ekeys.clone(),
            None => vec![*ckey],
        }
    }

    /// Slice an archive buffer at an index location.
    fn slice_archive<'a>(archive: &'a [u8], loc: &IndexEntry) -> Result<&'a [u8]> {
        let start = loc.offset as usize;
        let end = start + loc.size as usize;
        archive
            .get(start..end)
            .ok_or_else(|| Error::Tact(cask_tact::Error::OutOfRange {
                requested: end,
                remaining: archive.len(),
            }))
    }

    /// Fetch and decode one file by content key.
    ///
    /// Returns `Ok(None)` when no candidate EKey is present in the archive
    /// index; fetch and decode failures are errors.
    pub async fn get_file(&self, ckey: &CKey) -> Result<Option<Vec<u8>>> {
        for ekey in self.ekey_candidates(ckey) {
            let Some(loc) = self.index.get(&ekey) else {
                continue;
            };

            debug!(
                "fetching {} from archive {} at {}+{}",
                hex::encode(ckey),
                hex::encode(loc.archive_hash),
                loc.offset,
                loc.size
            );

            let archive = self.source.data(&hex::encode(loc.archive_hash)).await?;
            let bytes = decompress_blte(Self::slice_archive(&archive, loc)?)?;
            return Ok(Some(bytes));
        }

        Ok(None)
    }

    /// Fetch and decode many files, grouping by archive so that each
    /// archive blob is downloaded exactly once per call.
    ///
    /// The callback receives `(originating CKey, bytes)`; invocation order
    /// across archives is unspecified.
    pub async fn get_files_with<F>(&self, ckeys: &[CKey], mut emit: F) -> Result<()>
    where
        F: FnMut(CKey, Vec<u8>),
    {
        // Flat-map to located candidates, remembering the origin
        let mut groups: HashMap<Md5, Vec<(&IndexEntry, CKey)>> = HashMap::new();
        for ckey in ckeys {
            for ekey in self.ekey_candidates(ckey) {
                if let Some(loc) = self.index.get(&ekey) {
                    groups.entry(loc.archive_hash).or_default().push((loc, *ckey));
                }
            }
        }

        for (archive_hash, locations) in groups {
            let archive = self.source.data(&hex::encode(archive_hash)).await?;
            debug!(
                "archive {}: {} slices",
                hex::encode(archive_hash),
                locations.len()
            );

            for (loc, ckey) in locations {
                let bytes = decompress_blte(Self::slice_archive(&archive, loc)?)?;
                emit(ckey, bytes);
            }
            // The archive buffer is dropped before the next group is fetched
        }

        Ok(())
    }

    /// Fetch and decode many files into a map keyed by the originating
    /// content key.
    pub async fn get_files(&self, ckeys: &[CKey]) -> Result<HashMap<CKey, Vec<u8>>> {
        let mut results = HashMap::new();
        self.get_files_with(ckeys, |ckey, bytes| {
            results.insert(ckey, bytes);
        })
        .await?;
        Ok(results)
    }

    /// The root manifest, when the build has one.
    pub fn root(&self) -> Result<&RootManifest> {
        self.root.as_ref().ok_or(Error::RootNotAvailable)
    }

    /// Root entries whose normalized path contains `path`.
    pub fn get_entries_by_path(&self, path: &str) -> Result<Vec<&RootEntry>> {
        Ok(self.root()?.get_entries_by_path(path))
    }

    /// Fetch the first file whose normalized path contains `path`.
    pub async fn get_file_by_path(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(ckey) = self
            .get_entries_by_path(path)?
            .first()
            .map(|e| e.content_key)
        else {
            return Ok(None);
        };
        self.get_file(&ckey).await
    }

    /// The parsed build configuration.
    pub fn build(&self) -> &BuildConfig {
        &self.build
    }

    /// The parsed CDN configuration.
    pub fn cdn_config(&self) -> &CdnConfig {
        &self.cdn_config
    }

    /// The parsed encoding table.
    pub fn encoding(&self) -> &EncodingTable {
        &self.encoding
    }

    /// Number of entries in the merged archive index.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}
