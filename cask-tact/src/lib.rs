//! Parsers for the TACT translation tables used by online CASC storage:
//! the encoding table (CKey → EKeys), archive indices (EKey → archive
//! location), root manifests (path / fileDataID → CKey), and the key=value
//! configuration files that tie a build together.
//!
//! All parsers operate on fully materialized byte slices; BLTE decoding of
//! the downloaded blobs happens upstream.

pub mod config;
pub mod encoding;
pub mod index;
pub mod reader;
pub mod root;

mod error;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Length of every key this client handles (MD5-shaped).
pub const KEY_LENGTH: usize = 16;

/// An MD5-shaped identifier as it appears on the wire.
pub type Md5 = [u8; KEY_LENGTH];

/// Content key: fingerprint of a logical file's decompressed content.
pub type CKey = Md5;

/// Encoded key: fingerprint of one compressed encoding of a CKey.
pub type EKey = Md5;
