//! HTTP transport for the cask CASC client.
//!
//! Two services make up the read side of Blizzard's distribution system:
//!
//! * the **patch service** (`{region}.patch.battle.net:1119`), which serves
//!   pipe-delimited version and CDN tables per product, and
//! * the **content CDNs**, plain HTTP hosts serving config and data files
//!   addressed by hash fan-out paths.
//!
//! An advisory on-disk cache sits in front of the CDN fetches.

pub mod cache;
pub mod client;
pub mod error;
pub mod manifest;
pub mod patch;
pub mod region;

pub use cache::DiskCache;
pub use client::CdnClient;
pub use error::{Error, Result};
pub use manifest::{CdnEntry, VersionEntry, parse_cdns, parse_versions};
pub use patch::PatchClient;
pub use region::Region;
