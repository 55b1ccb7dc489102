//! # Target Resolution
//!
//! Maps a [`BundleTarget`] onto a concrete node of a bundle, whatever the
//! bundle's physical form:
//!
//! - archive-backed: a lookup in the [`ArchiveIndex`]; the empty path is the
//!   archive object itself,
//! - single remote object: only the root exists,
//! - local: a walk over the real filesystem, one exact-name segment at a time.
//!
//! Each resolution also carries the node's first level of children, so that
//! serialization does not have to list it again.

use std::path::{Path, PathBuf};

use crate::common::{normalize_path, EntryKind, ROOT_MODE};
use crate::index::{ArchiveIndex, NodeId};
use crate::locator::BundleDescriptor;
use crate::storage::{LocalFilesystem, LocalStat};
use crate::BundleError;

/// A bundle plus the relative path of one of its sub-resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleTarget {
    pub bundle_id: String,
    /// Normalized, slash separated; empty for the bundle root.
    pub subpath: String,
}

impl BundleTarget {
    /// Builds a target, normalizing `subpath`. `None` and `""` both select the root.
    pub fn new(bundle_id: impl Into<String>, subpath: Option<&str>) -> Result<Self, BundleError> {
        let raw = subpath.unwrap_or("");
        let subpath = normalize_path(raw).ok_or_else(|| BundleError::InvalidTargetPath(raw.to_string()))?;
        Ok(Self { bundle_id: bundle_id.into(), subpath })
    }

    pub fn root(bundle_id: impl Into<String>) -> Self {
        Self { bundle_id: bundle_id.into(), subpath: String::new() }
    }

    pub fn is_root(&self) -> bool {
        self.subpath.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.subpath.split('/').filter(|s| !s.is_empty())
    }
}

/// Where a [`TargetNode`] lives, so its children can be listed later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeHandle {
    /// The archive object as a whole.
    ArchiveRoot,
    ArchiveEntry(NodeId),
    Local(PathBuf),
    /// A single non-archive remote object.
    Object,
}

/// Metadata of one resolved node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNode {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub link_target: Option<String>,
    /// Diagnostic locator; not an identity key.
    pub locator: String,
    pub handle: NodeHandle,
}

/// A resolved target and, for directories, its immediate children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub node: TargetNode,
    pub children: Option<Vec<TargetNode>>,
}

/// Lists the children of resolved nodes.
pub trait TreeSource {
    /// Children of `node` in display order; empty for non-directories.
    fn children(&self, node: &TargetNode) -> Result<Vec<TargetNode>, BundleError>;
}

/// [`TreeSource`] over an archive index.
pub struct ArchiveTree<'a> {
    index: &'a ArchiveIndex,
    object_locator: &'a str,
}

impl<'a> ArchiveTree<'a> {
    pub fn new(index: &'a ArchiveIndex, object_locator: &'a str) -> Self {
        Self { index, object_locator }
    }

    fn node(&self, id: NodeId) -> Option<TargetNode> {
        let entry = self.index.entry(id)?;
        Some(TargetNode {
            name: entry.name().to_string(),
            kind: entry.kind,
            size: entry.size,
            mode: entry.mode,
            link_target: entry.link_target.clone(),
            locator: format!("{}/{}", self.object_locator, entry.path),
            handle: NodeHandle::ArchiveEntry(id),
        })
    }
}

impl TreeSource for ArchiveTree<'_> {
    fn children(&self, node: &TargetNode) -> Result<Vec<TargetNode>, BundleError> {
        let ids = match node.handle {
            NodeHandle::ArchiveRoot => self.index.root_children(),
            NodeHandle::ArchiveEntry(id) => self.index.children(id),
            _ => &[],
        };
        Ok(ids.iter().filter_map(|&id| self.node(id)).collect())
    }
}

/// [`TreeSource`] over a local filesystem.
pub struct LocalTree<'a, F: ?Sized> {
    fs: &'a F,
}

impl<'a, F: LocalFilesystem + ?Sized> LocalTree<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self { fs }
    }
}

impl<F: LocalFilesystem + ?Sized> TreeSource for LocalTree<'_, F> {
    fn children(&self, node: &TargetNode) -> Result<Vec<TargetNode>, BundleError> {
        let NodeHandle::Local(dir) = &node.handle else {
            return Ok(Vec::new());
        };
        if !node.kind.is_dir() {
            return Ok(Vec::new());
        }
        let names = self.fs.list(dir).map_err(|e| BundleError::io(e, dir))?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            match self.fs.stat(&path) {
                Ok(st) => out.push(local_node(name, st, path)),
                // Removed between list and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "entry vanished while listing");
                }
                Err(e) => return Err(BundleError::io(e, path)),
            }
        }
        Ok(out)
    }
}

/// [`TreeSource`] for single remote objects, which have no children.
pub struct ObjectTree;

impl TreeSource for ObjectTree {
    fn children(&self, _node: &TargetNode) -> Result<Vec<TargetNode>, BundleError> {
        Ok(Vec::new())
    }
}

fn with_children<S: TreeSource + ?Sized>(source: &S, node: TargetNode) -> Result<Resolution, BundleError> {
    let children = if node.kind.is_dir() { Some(source.children(&node)?) } else { None };
    Ok(Resolution { node, children })
}

fn root_name(descriptor: &BundleDescriptor, target: &BundleTarget) -> String {
    if !target.bundle_id.is_empty() {
        target.bundle_id.clone()
    } else {
        descriptor.bundle_id.clone().unwrap_or_else(|| descriptor.object_name().to_string())
    }
}

/// Resolves a target inside an archive-backed bundle.
///
/// The root is the archive object itself: a directory whose size is
/// `object_size` (the stored byte length) and whose mode is [`ROOT_MODE`].
/// Any other path must match an index entry exactly.
pub fn resolve_archive(
    descriptor: &BundleDescriptor,
    target: &BundleTarget,
    index: &ArchiveIndex,
    object_size: u64,
) -> Result<Resolution, BundleError> {
    let tree = ArchiveTree::new(index, &descriptor.object_locator);
    let node = if target.is_root() {
        TargetNode {
            name: root_name(descriptor, target),
            kind: EntryKind::Directory,
            size: object_size,
            mode: ROOT_MODE,
            link_target: None,
            locator: descriptor.object_locator.clone(),
            handle: NodeHandle::ArchiveRoot,
        }
    } else {
        index
            .lookup(&target.subpath)
            .and_then(|id| tree.node(id))
            .ok_or_else(|| BundleError::not_found(&descriptor.object_locator, &target.subpath))?
    };
    with_children(&tree, node)
}

/// Resolves a target of a bundle stored as one plain remote object.
/// Only the root exists; it is a file of `object_size` bytes.
pub fn resolve_object(descriptor: &BundleDescriptor, target: &BundleTarget, object_size: u64) -> Result<Resolution, BundleError> {
    if !target.is_root() {
        return Err(BundleError::not_found(&descriptor.object_locator, &target.subpath));
    }
    Ok(Resolution {
        node: TargetNode {
            name: root_name(descriptor, target),
            kind: EntryKind::File,
            size: object_size,
            mode: ROOT_MODE,
            link_target: None,
            locator: descriptor.object_locator.clone(),
            handle: NodeHandle::Object,
        },
        children: None,
    })
}

/// Resolves a target of a local bundle.
///
/// Each segment must appear verbatim in its parent's listing, which keeps
/// matching case-sensitive on case-insensitive filesystems. Symlinks are
/// reported, never traversed.
pub fn resolve_local<F: LocalFilesystem + ?Sized>(
    descriptor: &BundleDescriptor,
    target: &BundleTarget,
    fs: &F,
) -> Result<Resolution, BundleError> {
    let not_found = || BundleError::not_found(&descriptor.object_locator, &target.subpath);
    let stat = |path: &Path| -> Result<LocalStat, BundleError> {
        fs.stat(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => not_found(),
            _ => BundleError::io(e, path),
        })
    };

    let mut path = PathBuf::from(&descriptor.object_locator);
    let mut st = stat(&path)?;
    let mut name = descriptor.object_name().to_string();

    for seg in target.segments() {
        if !st.kind.is_dir() {
            return Err(not_found());
        }
        let names = fs.list(&path).map_err(|e| BundleError::io(e, &path))?;
        if !names.iter().any(|n| n == seg) {
            return Err(not_found());
        }
        path.push(seg);
        st = stat(&path)?;
        name = seg.to_string();
    }

    tracing::trace!(path = %path.display(), kind = ?st.kind, "resolved local target");
    with_children(&LocalTree::new(fs), local_node(name, st, path))
}

fn local_node(name: String, st: LocalStat, path: PathBuf) -> TargetNode {
    TargetNode {
        name,
        kind: st.kind,
        size: st.size,
        mode: st.mode,
        link_target: st.link_target,
        locator: path.display().to_string(),
        handle: NodeHandle::Local(path),
    }
}
