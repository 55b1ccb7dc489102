use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{ReadSeek, RemoteObject, RemoteObjectReader};
use crate::fsx as fs;
use crate::locator::BundleDescriptor;
use crate::BundleError;

/// Serves remote locators from a local mirror laid out as
/// `<root>/<account>/<container>/<bundle-id>/<object-name>`.
#[derive(Debug, Clone)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mirror path of a remote descriptor.
    pub fn object_path(&self, descriptor: &BundleDescriptor) -> Result<PathBuf, BundleError> {
        let segments = [
            descriptor.account.as_deref(),
            descriptor.container.as_deref(),
            descriptor.bundle_id.as_deref(),
        ];
        let mut path = self.root.clone();
        for seg in segments {
            let seg = seg.ok_or_else(|| BundleError::malformed(&descriptor.object_locator, "not a remote locator"))?;
            path.push(seg);
        }
        path.push(descriptor.object_name());
        Ok(path)
    }
}

impl RemoteObjectReader for DirObjectStore {
    fn open(&self, descriptor: &BundleDescriptor) -> Result<Box<dyn RemoteObject>, BundleError> {
        let path = self.object_path(descriptor)?;
        let locator = &descriptor.object_locator;
        let file = fs::File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BundleError::not_found(locator, ""),
            _ => BundleError::TransientIo { locator: locator.clone(), source: e },
        })?;
        let size = file
            .metadata()
            .map_err(|e| BundleError::TransientIo { locator: locator.clone(), source: e })?
            .len();
        tracing::debug!(path = %path.display(), size, "opened mirrored object");
        Ok(Box::new(FileObject { file, size }))
    }
}

struct FileObject {
    file: fs::File,
    size: u64,
}

impl Read for FileObject {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FileObject {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl RemoteObject for FileObject {
    fn size(&self) -> u64 {
        self.size
    }

    fn as_seekable(&mut self) -> Option<&mut dyn ReadSeek> {
        Some(self)
    }
}
