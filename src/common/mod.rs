//! Common utilities and types module.
// Shared enums, mode constants and path helpers used by the indexer, resolver and serializer.

use serde::{Deserialize, Serialize};

/// Permission bits reported for entries whose archive header carries none.
pub const DEFAULT_MODE: u32 = 0o644;

/// Mode reported for the root of a remote bundle. Object storage has no
/// native permission bits, so the root is always full access.
pub const ROOT_MODE: u32 = 0o777;

/// Mask applied to recorded modes; strips file-type bits such as `S_IFREG`.
pub const PERMISSION_MASK: u32 = 0o7777;

/// Kind of a node in a bundle tree.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Link,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Link => "link",
        }
    }
}

/// Normalize a slash-separated relative path.
///
/// Backslashes become forward slashes, leading `./` and `/` go away, and
/// empty or `.` segments are collapsed, so `"./dir1//./dir2/file.txt"`
/// becomes `"dir1/dir2/file.txt"`. Returns `None` when a `..` segment is
/// present, since such a path could leave the bundle.
pub fn normalize_path(path: &str) -> Option<String> {
    let s = path.replace('\\', "/");
    let mut out: Vec<&str> = Vec::new();
    for seg in s.split('/') {
        match seg {
            "" | "." => continue,
            ".." => return None,
            other => out.push(other),
        }
    }
    let res = out.join("/");
    tracing::trace!(input = path, normalized = %res, "normalize_path");
    Some(res)
}

/// Last segment of a normalized path (the whole path when it has no slash).
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Every proper prefix of a normalized path, shortest first.
/// `"a/b/c"` yields `"a"` and `"a/b"`.
pub fn parent_prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}
