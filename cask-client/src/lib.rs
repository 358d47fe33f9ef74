//! Read-only online client for Blizzard's CASC content distribution
//! system.
//!
//! Given a product and region, [`CascClient::init`] discovers the current
//! build, assembles the translation tables (encoding, archive indices, root
//! manifest), and then resolves logical files — by path or by content key —
//! to byte ranges inside CDN archives, which are fetched and BLTE-decoded.
//!
//! ```no_run
//! use cask_client::CascClient;
//! use cask_cdn::Region;
//!
//! # async fn run() -> cask_client::Result<()> {
//! let client = CascClient::init("w3", Region::EU).await?;
//! if let Some(bytes) = client.get_file_by_path("units/unitdata.slk").await? {
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod source;

pub use client::{CascClient, INDEX_FETCH_BATCH};
pub use error::{Error, Result};
pub use source::{BlobSource, CdnSource};
