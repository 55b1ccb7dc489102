use std::collections::HashMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::{ReadSeek, RemoteObject, RemoteObjectReader};
use crate::locator::BundleDescriptor;
use crate::BundleError;

/// In-memory object store keyed by object locator.
///
/// Counts live handles so callers can check that every opened stream was released.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
    open_handles: Arc<AtomicUsize>,
    sequential_only: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose objects refuse range reads, like a plain HTTP download.
    pub fn sequential() -> Self {
        Self { sequential_only: true, ..Self::default() }
    }

    /// Stores `bytes` under `locator` (`scheme://account/container/id/object`).
    pub fn insert(&self, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.insert(locator.into(), Arc::from(bytes));
    }

    /// Number of objects opened and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

impl RemoteObjectReader for MemoryObjectStore {
    fn open(&self, descriptor: &BundleDescriptor) -> Result<Box<dyn RemoteObject>, BundleError> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let data = objects
            .get(&descriptor.object_locator)
            .cloned()
            .ok_or_else(|| BundleError::not_found(&descriptor.object_locator, ""))?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryObject {
            cursor: Cursor::new(data),
            open_handles: Arc::clone(&self.open_handles),
            seekable: !self.sequential_only,
        }))
    }
}

struct MemoryObject {
    cursor: Cursor<Arc<[u8]>>,
    open_handles: Arc<AtomicUsize>,
    seekable: bool,
}

impl Read for MemoryObject {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryObject {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl RemoteObject for MemoryObject {
    fn size(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    fn as_seekable(&mut self) -> Option<&mut dyn ReadSeek> {
        if self.seekable {
            Some(self)
        } else {
            None
        }
    }
}

impl Drop for MemoryObject {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}
