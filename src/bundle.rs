//! # Bundle Resolution Pipeline
//!
//! One request is one synchronous pass:
//!
//! 1. parse the locator into a [`BundleDescriptor`],
//! 2. for archive-backed bundles, open the object and index it,
//! 3. resolve the target against the index, object or filesystem,
//! 4. serialize the resolved node to the requested depth.
//!
//! Nothing is shared between requests, so one [`BundleResolver`] can serve many
//! threads at once. Each remote stream is owned by the request that opened it and
//! is dropped before the request returns, on success and on every error path.

use crate::config::ResolverConfig;
use crate::index::{index_seekable, index_stream, ArchiveIndex};
use crate::locator::{parse_locator, BundleDescriptor, StorageKind};
use crate::resolve::{resolve_archive, resolve_local, resolve_object, ArchiveTree, BundleTarget, LocalTree, ObjectTree};
use crate::storage::{CancelToken, GuardedReader, LocalFilesystem, RemoteObject, RemoteObjectReader, StdFilesystem};
use crate::tree::{serialize, TargetInfo};
use crate::BundleError;

/// Resolves bundle targets through the given storage collaborators.
pub struct BundleResolver<R, F = StdFilesystem> {
    remote: R,
    local: F,
    config: ResolverConfig,
}

impl<R: RemoteObjectReader> BundleResolver<R, StdFilesystem> {
    /// A resolver that reads local bundles from the real filesystem.
    pub fn with_remote(remote: R, config: ResolverConfig) -> Self {
        Self::new(remote, StdFilesystem, config)
    }
}

impl<R: RemoteObjectReader, F: LocalFilesystem> BundleResolver<R, F> {
    pub fn new(remote: R, local: F, config: ResolverConfig) -> Self {
        Self { remote, local, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn parse(&self, locator: &str) -> Result<BundleDescriptor, BundleError> {
        parse_locator(locator, &self.config)
    }

    /// Metadata tree of `target` inside the bundle at `locator`, expanded `depth` levels.
    ///
    /// Remote reads are bounded by the configured read timeout.
    pub fn target_info(&self, locator: &str, target: &BundleTarget, depth: usize) -> Result<TargetInfo, BundleError> {
        let token = CancelToken::with_timeout(self.config.read_timeout);
        self.target_info_with(locator, target, depth, &token)
    }

    /// Same as [`BundleResolver::target_info`], under a caller-supplied cancellation token.
    pub fn target_info_with(
        &self,
        locator: &str,
        target: &BundleTarget,
        depth: usize,
        token: &CancelToken,
    ) -> Result<TargetInfo, BundleError> {
        let descriptor = self.parse(locator)?;
        tracing::debug!(
            locator = %descriptor,
            kind = ?descriptor.storage_kind,
            subpath = %target.subpath,
            depth,
            "resolving bundle target"
        );

        match descriptor.storage_kind {
            StorageKind::Local => {
                let resolution = resolve_local(&descriptor, target, &self.local)?;
                serialize(&LocalTree::new(&self.local), resolution, depth)
            }
            StorageKind::RemoteObject => {
                let size = self.object_size(&descriptor, token)?;
                let resolution = resolve_object(&descriptor, target, size)?;
                serialize(&ObjectTree, resolution, depth)
            }
            StorageKind::RemoteArchiveObject if target.is_root() && depth == 0 => {
                // The root's metadata comes from the object alone; skip the scan.
                let size = self.object_size(&descriptor, token)?;
                let index = ArchiveIndex::new();
                let resolution = resolve_archive(&descriptor, target, &index, size)?;
                serialize(&ArchiveTree::new(&index, &descriptor.object_locator), resolution, depth)
            }
            StorageKind::RemoteArchiveObject => {
                let (index, size) = self.index_archive(&descriptor, token)?;
                let resolution = resolve_archive(&descriptor, target, &index, size)?;
                serialize(&ArchiveTree::new(&index, &descriptor.object_locator), resolution, depth)
            }
        }
    }

    /// Opens an archive-backed bundle, indexes it and releases the stream.
    /// Returns the index and the stored object's byte length.
    pub fn index_archive(&self, descriptor: &BundleDescriptor, token: &CancelToken) -> Result<(ArchiveIndex, u64), BundleError> {
        if !descriptor.is_archive {
            return Err(BundleError::UnsupportedArchiveFormat(format!("'{}' is not an archive object", descriptor)));
        }
        let mut object = self.open_object(descriptor, token)?;
        let size = object.size();
        let hint = descriptor.archive_format;
        let result = match object.as_seekable() {
            Some(seekable) => index_seekable(GuardedReader::new(seekable, token.clone()), hint),
            None => index_stream(GuardedReader::new(&mut *object, token.clone()), hint),
        };
        drop(object);

        let index = result.map_err(|e| e.with_locator(&descriptor.object_locator))?;
        tracing::debug!(locator = %descriptor, size, entries = index.len(), "archive indexed");
        Ok((index, size))
    }

    fn object_size(&self, descriptor: &BundleDescriptor, token: &CancelToken) -> Result<u64, BundleError> {
        Ok(self.open_object(descriptor, token)?.size())
    }

    /// Opens the remote object under `token`. An open that returns after the token
    /// tripped is released and reported as transient.
    fn open_object(&self, descriptor: &BundleDescriptor, token: &CancelToken) -> Result<Box<dyn RemoteObject>, BundleError> {
        token.check().map_err(|e| transient(descriptor, e))?;
        let object = self.remote.open(descriptor)?;
        if let Err(e) = token.check() {
            drop(object);
            tracing::debug!(locator = %descriptor, "remote open finished after the request deadline");
            return Err(transient(descriptor, e));
        }
        Ok(object)
    }
}

fn transient(descriptor: &BundleDescriptor, source: std::io::Error) -> BundleError {
    BundleError::TransientIo { locator: descriptor.object_locator.clone(), source }
}
