//! Error types for BLTE parsing and decompression

use thiserror::Error;

/// Result type for BLTE operations
pub type Result<T> = std::result::Result<T, Error>;

/// BLTE error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid BLTE magic bytes
    #[error("Invalid BLTE magic: expected [66, 76, 84, 69], got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Invalid header size field
    #[error("Invalid header size: {0}")]
    InvalidHeaderSize(u32),

    /// Unsupported block table format
    #[error("Unsupported block table format: {0:#04x}")]
    UnsupportedTableFormat(u8),

    /// Invalid block count
    #[error("Invalid block count: {0}")]
    InvalidBlockCount(u32),

    /// Unknown compression mode
    #[error("Unknown compression mode: {0:#04x}")]
    UnknownCompressionMode(u8),

    /// Encrypted blocks are recognized but not supported
    #[error("Encrypted BLTE blocks are not supported")]
    EncryptionNotSupported,

    /// Unsupported LZ4 chunk header version
    #[error("Unsupported LZ4 chunk version: {0}")]
    UnsupportedLz4Version(u8),

    /// Nested frame blocks exceeded the depth cap
    #[error("Frame recursion exceeded {0} levels")]
    RecursionLimit(usize),

    /// Truncated data
    #[error("Truncated data: expected {expected} bytes, got {actual}")]
    TruncatedData { expected: usize, actual: usize },

    /// Decompressed output did not match the declared size
    #[error("Decompressed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Decompression failed
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),
}
