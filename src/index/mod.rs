//! # Archive Index
//!
//! Turns the flat entry stream of an archive into a connected directory tree.
//!
//! Archives list entries in write order and are free to omit directory entries
//! (`tar czf x.tgz src/main.rs` records no `src/`). The index therefore
//! synthesizes every missing ancestor directory at the moment a descendant first
//! needs it, so every path prefix implied by an entry resolves to exactly one node.
//!
//! Nodes live in an arena addressed by [`NodeId`]; parent and child links are
//! indices, and children keep first-appearance order.

use std::collections::HashMap;

use serde::Serialize;

use crate::common::{base_name, normalize_path, parent_prefixes, EntryKind, DEFAULT_MODE, PERMISSION_MASK};

mod format;
mod reader;

pub use format::{ArchiveFormat, SNIFF_LEN};
pub use reader::{index_seekable, index_stream};

/// Position of a node in the index arena.
pub type NodeId = usize;

/// A single file, directory or link recorded in (or implied by) an archive.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized archive-relative path, no leading or trailing slash.
    pub path: String,
    pub kind: EntryKind,
    /// Recorded size in bytes; always 0 for directories.
    pub size: u64,
    /// Permission bits, [`DEFAULT_MODE`] when the archive recorded none.
    pub mode: u32,
    /// Order of first physical appearance, counting synthesized directories.
    pub sequence_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    /// True for directories the archive never listed explicitly.
    pub synthesized: bool,
}

impl ArchiveEntry {
    pub fn name(&self) -> &str {
        base_name(&self.path)
    }
}

#[derive(Debug, Clone)]
struct Node {
    entry: ArchiveEntry,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Ordered, gap-free directory tree built from an archive's entries.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    nodes: Vec<Node>,
    by_path: HashMap<String, NodeId>,
    roots: Vec<NodeId>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entry(&self, id: NodeId) -> Option<&ArchiveEntry> {
        self.nodes.get(id).map(|n| &n.entry)
    }

    /// Exact, case-sensitive lookup of a normalized path.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Children of `id` in first-appearance order. Empty for files and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Top-level entries in first-appearance order.
    pub fn root_children(&self) -> &[NodeId] {
        &self.roots
    }

    /// All entries in sequence order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.nodes.iter().map(|n| &n.entry)
    }

    /// Number of synthesized directories.
    pub fn synthesized_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.entry.synthesized).count()
    }

    /// Deepest nesting level; a top-level entry has depth 1, an empty archive 0.
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.entry.path.split('/').count()).max().unwrap_or(0)
    }

    /// Records one physical archive entry.
    ///
    /// Missing ancestors are synthesized first. The archive root itself (`./`) is
    /// skipped and yields `Ok(None)`. A repeated directory is a no-op except that an
    /// explicit entry replaces the mode of a synthesized placeholder; a repeated file
    /// overrides size and mode in place. Errors describe an inconsistent archive.
    pub fn insert(
        &mut self,
        raw_path: &str,
        kind: EntryKind,
        size: u64,
        mode: Option<u32>,
        link_target: Option<String>,
    ) -> Result<Option<NodeId>, String> {
        let path = normalize_path(raw_path).ok_or_else(|| format!("entry '{}' escapes the archive root", raw_path))?;
        if path.is_empty() {
            return Ok(None);
        }

        let mut parent = None;
        for prefix in parent_prefixes(&path) {
            parent = Some(self.ensure_dir(prefix, parent)?);
        }

        let mode = mode.map(|m| m & PERMISSION_MASK).unwrap_or(DEFAULT_MODE);
        let size = if kind.is_dir() { 0 } else { size };

        if let Some(id) = self.lookup(&path) {
            let existing = &mut self.nodes[id].entry;
            match (existing.kind.is_dir(), kind.is_dir()) {
                (true, true) => {
                    if existing.synthesized {
                        existing.mode = mode;
                        existing.synthesized = false;
                    }
                }
                (false, false) => {
                    existing.kind = kind;
                    existing.size = size;
                    existing.mode = mode;
                    existing.link_target = link_target;
                }
                _ => {
                    return Err(format!(
                        "'{}' appears both as a {} and as a {}",
                        path,
                        existing.kind.as_str(),
                        kind.as_str()
                    ))
                }
            }
            return Ok(Some(id));
        }

        Ok(Some(self.push(path, kind, size, mode, link_target, false, parent)))
    }

    fn ensure_dir(&mut self, path: &str, parent: Option<NodeId>) -> Result<NodeId, String> {
        if let Some(id) = self.lookup(path) {
            let kind = self.nodes[id].entry.kind;
            if !kind.is_dir() {
                return Err(format!("'{}' is a {} but has entries below it", path, kind.as_str()));
            }
            return Ok(id);
        }
        tracing::trace!(path, "synthesizing implicit directory");
        Ok(self.push(path.to_string(), EntryKind::Directory, 0, DEFAULT_MODE, None, true, parent))
    }

    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        path: String,
        kind: EntryKind,
        size: u64,
        mode: u32,
        link_target: Option<String>,
        synthesized: bool,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.by_path.insert(path.clone(), id);
        self.nodes.push(Node {
            entry: ArchiveEntry { path, kind, size, mode, sequence_index: id, link_target, synthesized },
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}
