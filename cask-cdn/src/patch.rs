//! Patch service client.
//!
//! The patch service is the discovery endpoint of the distribution system:
//! per-product version and CDN tables served as pipe-delimited text on
//! port 1119.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::{CdnEntry, Error, Region, Result, VersionEntry, manifest};

/// Default maximum retries
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff in milliseconds
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Default maximum backoff in milliseconds
const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;

/// Default backoff multiplier
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default jitter factor (0.0 to 1.0)
const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the patch service
#[derive(Debug, Clone)]
pub struct PatchClient {
    client: reqwest::Client,
    region: Region,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
}

impl PatchClient {
    /// Create a new patch service client for the given region
    pub fn new(region: Region) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            region,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        })
    }

    /// Set the maximum number of retries for failed requests
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the jitter factor (0.0 to 1.0)
    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// The patch service base URL for the configured region
    pub fn base_url(&self) -> String {
        format!("http://{}.patch.battle.net:1119", self.region)
    }

    /// The configured region
    pub fn region(&self) -> Region {
        self.region
    }

    /// Calculate backoff duration with exponential backoff and jitter
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_backoff =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_backoff = base_backoff.min(self.max_backoff_ms as f64);

        let jitter_range = capped_backoff * self.jitter_factor;
        let jitter = rand::random::<f64>() * 2.0 * jitter_range - jitter_range;
        let final_backoff = (capped_backoff + jitter).max(0.0) as u64;

        Duration::from_millis(final_backoff)
    }

    /// Execute a GET with retry on connection errors and server errors
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.calculate_backoff(attempt - 1);
                debug!("retry attempt {} after {:?} backoff", attempt, backoff);
                sleep(backoff).await;
            }

            debug!("patch service request to {url} (attempt {})", attempt + 1);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    trace!("response status: {status}");

                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!("request returned {status} (attempt {}): will retry", attempt + 1);
                        last_error = Some(Error::fetch_failed(url, status.as_u16()));
                        continue;
                    }

                    return Err(Error::fetch_failed(url, status.as_u16()));
                }
                Err(e) => {
                    let is_retryable = e.is_connect() || e.is_timeout() || e.is_request();
                    if is_retryable && attempt < self.max_retries {
                        warn!("request failed (attempt {}): {e}, will retry", attempt + 1);
                        last_error = Some(Error::Http(e));
                    } else if e.is_timeout() {
                        return Err(Error::Timeout {
                            duration_ms: DEFAULT_TIMEOUT_SECS * 1000,
                        });
                    } else {
                        return Err(Error::Http(e));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::fetch_failed(url, 0)))
    }

    /// Fetch the raw version table for a product
    pub async fn get_versions(&self, product: &str) -> Result<String> {
        let url = format!("{}/{}/versions", self.base_url(), product);
        self.fetch_text(&url).await
    }

    /// Fetch the raw CDN table for a product
    pub async fn get_cdns(&self, product: &str) -> Result<String> {
        let url = format!("{}/{}/cdns", self.base_url(), product);
        self.fetch_text(&url).await
    }

    /// Fetch and parse the version table for a product
    pub async fn get_versions_parsed(&self, product: &str) -> Result<Vec<VersionEntry>> {
        let text = self.get_versions(product).await?;
        manifest::parse_versions(&text)
    }

    /// Fetch and parse the CDN table for a product
    pub async fn get_cdns_parsed(&self, product: &str) -> Result<Vec<CdnEntry>> {
        let text = self.get_cdns(product).await?;
        manifest::parse_cdns(&text)
    }
}
