//! Advisory on-disk cache for CDN content.
//!
//! Misses fall through to the network; write failures are logged and
//! otherwise ignored. Keys are flat file names: `config_<hash>`, `<hash>`
//! for data blobs, `<hash>.index` for archive indices.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Error, Result};

/// On-disk key-value cache.
pub struct DiskCache {
    base_dir: PathBuf,
}

impl DiskCache {
    /// Create a cache under the user's cache directory, scoped per product.
    ///
    /// The location is `{cache_dir}/cask/{product}`, e.g.
    /// `~/.cache/cask/w3` on Linux.
    pub async fn new(product: &str) -> Result<Self> {
        let base_dir = dirs::cache_dir()
            .ok_or(Error::CacheDirectoryNotFound)?
            .join("cask")
            .join(product);
        Self::with_base_dir(base_dir).await
    }

    /// Create a cache with a custom base directory.
    pub async fn with_base_dir(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_dir).await?;

        debug!("initialized disk cache at {base_dir:?}");
        Ok(Self { base_dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }

    /// Read a cached value. Returns `None` on a miss; read errors are
    /// logged and treated as misses.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("cache read error for {key}: {e}");
                None
            }
        }
    }

    /// Write a value to the cache.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(self.entry_path(key), bytes).await?;
        Ok(())
    }

    /// The cache's base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::with_base_dir(dir.path()).await.unwrap();

        assert!(cache.get("deadbeef").await.is_none());

        cache.put("deadbeef", b"archive bytes").await.unwrap();
        assert_eq!(cache.get("deadbeef").await.unwrap(), b"archive bytes");

        cache.put("deadbeef.index", b"index bytes").await.unwrap();
        assert_eq!(cache.get("deadbeef.index").await.unwrap(), b"index bytes");

        cache.put("config_deadbeef", b"cfg").await.unwrap();
        assert_eq!(cache.get("config_deadbeef").await.unwrap(), b"cfg");
    }

    #[tokio::test]
    async fn test_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::with_base_dir(dir.path()).await.unwrap();

        cache.put("k", b"old").await.unwrap();
        cache.put("k", b"new").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), b"new");
    }
}
