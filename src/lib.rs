//! # Bundlearch Core Library
//!
//! Resolves paths inside *bundles* (named, immutable directory trees or single files)
//! and describes them as depth-bounded metadata trees, without extracting anything.
//!
//! A bundle may live on local disk, as a single archive object in remote storage
//! (`.tar.gz`, `.tar.xz`, `.tar.zst`, `.tar`, `.zip`), or as a single plain remote object.
//! Archive-backed bundles are indexed by reading entry headers only; directories the
//! archive never lists explicitly are synthesized so every implied path resolves.
//!
//! ## Key Modules
//!
//! - [`locator`]: Parses raw locators into a [`locator::BundleDescriptor`].
//! - [`index`]: Builds the [`index::ArchiveIndex`] from an archive byte stream.
//! - [`resolve`]: Maps a [`resolve::BundleTarget`] to a node of the index, object or filesystem.
//! - [`tree`]: Serializes a resolved node into a [`tree::TargetInfo`] tree.
//! - [`bundle`]: The end-to-end [`BundleResolver`] pipeline.
//! - [`storage`]: Remote object and local filesystem seams, plus cancellation.
//!
//! ## Examples
//!
//! ```no_run
//! use bundlearch::{BundleResolver, BundleTarget, ResolverConfig};
//! use bundlearch::storage::DirObjectStore;
//!
//! # fn main() -> Result<(), bundlearch::BundleError> {
//! let resolver = BundleResolver::with_remote(DirObjectStore::new("/srv/mirror"), ResolverConfig::default());
//! let target = BundleTarget::new("0x1234", Some("src"))?;
//! let info = resolver.target_info("azfs://acct/bundles/0x1234/contents.tar.gz", &target, 1)?;
//! println!("{}", serde_json::to_string(&info)?);
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod index;
pub mod locator;
pub mod resolve;
pub mod storage;
pub mod tree;

// Cross-platform filesystem wrapper
pub mod fsx;

pub use bundle::BundleResolver;
pub use config::ResolverConfig;
pub use error::BundleError;
pub use resolve::BundleTarget;
pub use tree::TargetInfo;
