//! Blob transport seam.
//!
//! The resolver only needs three fetch shapes from the outside world:
//! config files, data blobs (archives and loose files), and archive index
//! files, each addressed by a hex hash. Keeping that surface behind a trait
//! lets the pipeline run against an in-memory source in tests.

use tracing::warn;

use cask_cdn::{CdnClient, DiskCache};

use crate::Result;

/// Source of CDN-addressed blobs.
#[allow(async_fn_in_trait)]
pub trait BlobSource {
    /// Fetch a config file by hash.
    async fn config(&self, hash: &str) -> Result<Vec<u8>>;

    /// Fetch a data blob (archive or loose file) by hash.
    async fn data(&self, hash: &str) -> Result<Vec<u8>>;

    /// Fetch an archive's `.index` file by the archive hash.
    async fn index(&self, hash: &str) -> Result<Vec<u8>>;
}

/// The production [`BlobSource`]: a CDN host fronted by the advisory disk
/// cache.
pub struct CdnSource {
    cdn: CdnClient,
    cache: Option<DiskCache>,
    host: String,
    path: String,
}

impl CdnSource {
    pub fn new(cdn: CdnClient, cache: Option<DiskCache>, host: String, path: String) -> Self {
        Self {
            cdn,
            cache,
            host,
            path,
        }
    }

    async fn cache_get(&self, key: &str) -> Option<Vec<u8>> {
        match &self.cache {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    async fn cache_put(&self, key: &str, bytes: &[u8]) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(key, bytes).await {
                warn!("cache write failed for {key}: {e}");
            }
        }
    }
}

impl BlobSource for CdnSource {
    async fn config(&self, hash: &str) -> Result<Vec<u8>> {
        let key = format!("config_{hash}");
        if let Some(hit) = self.cache_get(&key).await {
            return Ok(hit);
        }
        let bytes = self.cdn.download_config(&self.host, &self.path, hash).await?;
        self.cache_put(&key, &bytes).await;
        Ok(bytes)
    }

    async fn data(&self, hash: &str) -> Result<Vec<u8>> {
        if let Some(hit) = self.cache_get(hash).await {
            return Ok(hit);
        }
        let bytes = self.cdn.download_data(&self.host, &self.path, hash).await?;
        self.cache_put(hash, &bytes).await;
        Ok(bytes)
    }

    async fn index(&self, hash: &str) -> Result<Vec<u8>> {
        let key = format!("{hash}.index");
        if let Some(hit) = self.cache_get(&key).await {
            return Ok(hit);
        }
        let bytes = self.cdn.download_index(&self.host, &self.path, hash).await?;
        self.cache_put(&key, &bytes).await;
        Ok(bytes)
    }
}
