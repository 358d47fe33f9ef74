//! CDN content client.
//!
//! Content hosts serve config and data files under hash fan-out paths:
//!
//! ```text
//! http://{host}/{path}/config/{h[0:2]}/{h[2:4]}/{h}
//! http://{host}/{path}/data/{h[0:2]}/{h[2:4]}/{h}[.index]
//! ```

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Default maximum retries
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff in milliseconds
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Default maximum backoff in milliseconds
const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Default jitter factor
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout; archives can be large
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// HTTP client for CDN content downloads
#[derive(Debug, Clone)]
pub struct CdnClient {
    client: reqwest::Client,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    jitter_factor: f64,
}

impl CdnClient {
    /// Create a new CDN client with default configuration
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(20)
            .gzip(true)
            .deflate(true)
            .build()?;

        Ok(Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        })
    }

    /// Set the maximum number of retries for failed requests
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build a CDN URL for a content hash.
    ///
    /// `kind` is the directory under the CDN path (`config` or `data`);
    /// `suffix` is appended to the hash (empty or `.index`).
    pub fn build_url(
        cdn_host: &str,
        path: &str,
        kind: &str,
        hash: &str,
        suffix: &str,
    ) -> Result<String> {
        if hash.len() < 4 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_hash(hash));
        }

        Ok(format!(
            "http://{}/{}/{}/{}/{}/{}{}",
            cdn_host.trim_matches('/'),
            path.trim_matches('/'),
            kind,
            &hash[0..2],
            &hash[2..4],
            hash,
            suffix,
        ))
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_backoff = self.initial_backoff_ms as f64 * 2f64.powi(attempt as i32);
        let capped_backoff = base_backoff.min(self.max_backoff_ms as f64);

        let jitter_range = capped_backoff * self.jitter_factor;
        let jitter = rand::random::<f64>() * 2.0 * jitter_range - jitter_range;
        let final_backoff = (capped_backoff + jitter).max(0.0) as u64;

        Duration::from_millis(final_backoff)
    }

    /// Execute a GET with retry, returning the response body
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.calculate_backoff(attempt - 1);
                debug!("CDN retry attempt {} after {:?} backoff", attempt, backoff);
                sleep(backoff).await;
            }

            debug!("CDN request to {url} (attempt {})", attempt + 1);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    trace!("response status: {status}");

                    if status.is_success() {
                        return Ok(response.bytes().await?.to_vec());
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!("CDN returned {status} (attempt {}): will retry", attempt + 1);
                        last_error = Some(Error::fetch_failed(url, status.as_u16()));
                        continue;
                    }

                    // Client errors (including 404) are not retried
                    return Err(Error::fetch_failed(url, status.as_u16()));
                }
                Err(e) => {
                    let is_retryable = e.is_connect() || e.is_timeout() || e.is_request();
                    if is_retryable && attempt < self.max_retries {
                        warn!("CDN request failed (attempt {}): {e}, will retry", attempt + 1);
                        last_error = Some(Error::Http(e));
                    } else if e.is_timeout() {
                        return Err(Error::Timeout {
                            duration_ms: DEFAULT_REQUEST_TIMEOUT_SECS * 1000,
                        });
                    } else {
                        return Err(Error::Http(e));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::fetch_failed(url, 0)))
    }

    /// Download a config file (build config, CDN config) by hash
    pub async fn download_config(&self, cdn_host: &str, path: &str, hash: &str) -> Result<Vec<u8>> {
        let url = Self::build_url(cdn_host, path, "config", hash, "")?;
        self.fetch_bytes(&url).await
    }

    /// Download a data file (archive or loose blob) by hash
    pub async fn download_data(&self, cdn_host: &str, path: &str, hash: &str) -> Result<Vec<u8>> {
        let url = Self::build_url(cdn_host, path, "data", hash, "")?;
        self.fetch_bytes(&url).await
    }

    /// Download an archive's `.index` file by the archive hash
    pub async fn download_index(&self, cdn_host: &str, path: &str, hash: &str) -> Result<Vec<u8>> {
        let url = Self::build_url(cdn_host, path, "data", hash, ".index")?;
        self.fetch_bytes(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let url = CdnClient::build_url(
            "cdn.example.com",
            "tpr/war3",
            "data",
            "deadbeef00112233445566778899aabb",
            "",
        )
        .unwrap();
        assert_eq!(
            url,
            "http://cdn.example.com/tpr/war3/data/de/ad/deadbeef00112233445566778899aabb"
        );
    }

    #[test]
    fn test_build_index_url() {
        let url = CdnClient::build_url(
            "cdn.example.com",
            "/tpr/war3/",
            "data",
            "deadbeef00112233445566778899aabb",
            ".index",
        )
        .unwrap();
        assert_eq!(
            url,
            "http://cdn.example.com/tpr/war3/data/de/ad/deadbeef00112233445566778899aabb.index"
        );
    }

    #[test]
    fn test_build_config_url() {
        let url = CdnClient::build_url("h", "p", "config", "aabbccdd", "").unwrap();
        assert_eq!(url, "http://h/p/config/aa/bb/aabbccdd");
    }

    #[test]
    fn test_invalid_hash_rejected() {
        assert!(matches!(
            CdnClient::build_url("h", "p", "data", "xyz", ""),
            Err(Error::InvalidHash { .. })
        ));
        assert!(matches!(
            CdnClient::build_url("h", "p", "data", "ab", ""),
            Err(Error::InvalidHash { .. })
        ));
    }
}
