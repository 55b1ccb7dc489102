//! # Target Info Trees
//!
//! Renders a [`Resolution`] into the depth-bounded [`TargetInfo`] tree handed to
//! clients.
//!
//! - depth `0`: metadata only, no `contents` field for any kind of node,
//! - depth `N > 0` on a directory: its children, each child directory expanded
//!   with depth `N - 1`.
//!
//! A depth at or past the real nesting simply expands everything. Expansion uses
//! an explicit stack, so very deep trees cannot exhaust the call stack.

use serde::{Deserialize, Serialize};

use crate::common::EntryKind;
use crate::resolve::{Resolution, TargetNode, TreeSource};
use crate::BundleError;

/// Metadata tree of a bundle target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    pub perm: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<TargetInfo>>,
    /// Diagnostic locator of the requested node; only set on the top-level node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_target: Option<String>,
}

impl TargetInfo {
    fn leaf(node: &TargetNode) -> Self {
        Self {
            name: node.name.clone(),
            kind: node.kind,
            size: node.size,
            perm: node.mode,
            link: node.link_target.clone(),
            contents: None,
            resolved_target: None,
        }
    }

    /// Child named `name`, if this node was expanded and has one.
    pub fn child(&self, name: &str) -> Option<&TargetInfo> {
        self.contents.as_ref()?.iter().find(|c| c.name == name)
    }
}

struct Frame {
    info: TargetInfo,
    pending: std::vec::IntoIter<TargetNode>,
    done: Vec<TargetInfo>,
    /// Levels still available below the children of this frame.
    remaining: usize,
}

/// Serializes `resolution` down to `depth` levels, listing deeper levels from `source`.
pub fn serialize<S: TreeSource + ?Sized>(source: &S, resolution: Resolution, depth: usize) -> Result<TargetInfo, BundleError> {
    let Resolution { node, children } = resolution;
    let mut top = TargetInfo::leaf(&node);
    top.resolved_target = Some(node.locator.clone());

    if depth == 0 || !node.kind.is_dir() {
        return Ok(top);
    }

    let first_level = match children {
        Some(c) => c,
        None => source.children(&node)?,
    };
    let mut stack = vec![Frame { info: top, pending: first_level.into_iter(), done: Vec::new(), remaining: depth - 1 }];
    let mut finished = None;

    while let Some(frame) = stack.last_mut() {
        match frame.pending.next() {
            Some(child) if child.kind.is_dir() && frame.remaining > 0 => {
                let remaining = frame.remaining - 1;
                let grandchildren = source.children(&child)?;
                stack.push(Frame {
                    info: TargetInfo::leaf(&child),
                    pending: grandchildren.into_iter(),
                    done: Vec::new(),
                    remaining,
                });
            }
            Some(child) => frame.done.push(TargetInfo::leaf(&child)),
            None => {
                if let Some(mut complete) = stack.pop() {
                    complete.info.contents = Some(complete.done);
                    match stack.last_mut() {
                        Some(parent) => parent.done.push(complete.info),
                        None => finished = Some(complete.info),
                    }
                }
            }
        }
    }

    finished.ok_or_else(|| BundleError::corrupt(&node.locator, "tree expansion ended without a root"))
}
