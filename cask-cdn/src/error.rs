//! Error types for patch service and CDN operations

use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Fetch of {url} failed with status {status}")]
    FetchFailed { url: String, status: u16 },

    /// Request exceeded its deadline
    #[error("Request timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Invalid content hash format
    #[error("Invalid content hash: {hash}")]
    InvalidHash { hash: String },

    /// Pipe-delimited manifest could not be interpreted
    #[error("Invalid manifest at line {line}: {reason}")]
    InvalidManifest { line: usize, reason: String },

    /// Manifest is missing a required column
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// Unknown region name
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    /// No user cache directory is available
    #[error("Cache directory not found")]
    CacheDirectoryNotFound,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a fetch-failed error from a URL and status code
    pub fn fetch_failed(url: impl Into<String>, status: u16) -> Self {
        Self::FetchFailed {
            url: url.into(),
            status,
        }
    }

    /// Create an invalid hash error
    pub fn invalid_hash(hash: impl Into<String>) -> Self {
        Self::InvalidHash { hash: hash.into() }
    }

    /// Create an invalid manifest error with line number and reason
    pub fn invalid_manifest(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            line,
            reason: reason.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}
