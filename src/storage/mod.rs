//! # Storage Collaborators
//!
//! The engine never touches bytes or disks directly. It talks to two seams:
//!
//! - [`RemoteObjectReader`] opens a remote object as a sequential byte stream,
//!   optionally seekable (range reads).
//! - [`LocalFilesystem`] stats and lists paths of local bundles.
//!
//! Reference implementations live in the submodules: [`StdFilesystem`] over the
//! real filesystem, [`MemoryObjectStore`] for tests and embedding, and
//! [`DirObjectStore`], which serves remote locators from a local mirror directory.

use std::io::{self, Read, Seek};
use std::path::Path;

use crate::common::EntryKind;
use crate::fsx as fs;
use crate::locator::BundleDescriptor;
use crate::BundleError;

mod dir;
mod guard;
mod memory;

pub use dir::DirObjectStore;
pub use guard::{CancelToken, GuardedReader, SourceFault};
pub use memory::MemoryObjectStore;

/// Object-safe `Read + Seek`.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// An opened remote object. Dropping it releases the underlying connection.
pub trait RemoteObject: Read + Send {
    /// Byte length of the stored object.
    fn size(&self) -> u64;

    /// Random access to the same object, when the backend supports range reads.
    fn as_seekable(&mut self) -> Option<&mut dyn ReadSeek> {
        None
    }
}

/// Opens remote objects named by a [`BundleDescriptor`].
///
/// The request's [`CancelToken`] is only consulted between calls: before and after
/// `open`, and around each `read`/`seek`. A single blocking call is never interrupted,
/// so implementations backed by a network must put their own connect and socket
/// timeouts on both `open` and the returned stream, derived from
/// [`ResolverConfig::read_timeout`](crate::config::ResolverConfig::read_timeout).
pub trait RemoteObjectReader: Send + Sync {
    /// Opens `descriptor.object_locator`.
    ///
    /// A missing object should be reported as [`BundleError::NotFound`]; any other
    /// failure as [`BundleError::TransientIo`].
    fn open(&self, descriptor: &BundleDescriptor) -> Result<Box<dyn RemoteObject>, BundleError>;
}

/// Result of a local `lstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStat {
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub link_target: Option<String>,
}

/// Local filesystem primitives used to resolve targets of local bundles.
pub trait LocalFilesystem: Send + Sync {
    /// Stats `path` without following a final symlink.
    fn stat(&self, path: &Path) -> io::Result<LocalStat>;

    /// Names of the children of directory `path`, in a stable order.
    fn list(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// [`LocalFilesystem`] over the real filesystem. Listings are sorted by name so
/// output does not depend on directory hash order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl LocalFilesystem for StdFilesystem {
    fn stat(&self, path: &Path) -> io::Result<LocalStat> {
        let meta = fs::symlink_metadata(path)?;
        let ft = meta.file_type();
        let (kind, link_target) = if ft.is_symlink() {
            (EntryKind::Link, Some(fs::link_target(path)?))
        } else if ft.is_dir() {
            (EntryKind::Directory, None)
        } else {
            (EntryKind::File, None)
        };
        Ok(LocalStat { kind, size: meta.len(), mode: fs::permission_bits(&meta), link_target })
    }

    fn list(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
