//! Error types for the client crate

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The CDN table for the product was empty
    #[error("No CDN available for this product")]
    NoCdn,

    /// The version table had no entry for the requested region
    #[error("No version available for region {0}")]
    NoVersion(String),

    /// The build config carries no encoding hash
    #[error("Build config has no encoding hash")]
    NoEncodingHash,

    /// The build has no root manifest, or it was not loaded
    #[error("Root manifest not available for this build")]
    RootNotAvailable,

    /// A hex key string could not be parsed
    #[error("Invalid key text: {0}")]
    InvalidKey(String),

    /// Transport failure
    #[error(transparent)]
    Cdn(#[from] cask_cdn::Error),

    /// Table parse failure
    #[error(transparent)]
    Tact(#[from] cask_tact::Error),

    /// BLTE decode failure
    #[error(transparent)]
    Blte(#[from] cask_blte::Error),
}
