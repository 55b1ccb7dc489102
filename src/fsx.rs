//! Cross-platform filesystem wrapper.
//!
//! On Unix we transparently re-export std::fs and read permission bits from the
//! raw mode. Windows has no mode bits, so a plausible value is derived from the
//! read-only flag and the entry kind. The rest of the crate imports
//! `crate::fsx::*` instead of touching `std::fs` directly, keeping call-sites
//! identical across OSes.

use std::io;
use std::path::Path;

pub use std::fs::*;

use crate::common::PERMISSION_MASK;

#[cfg(unix)]
/// POSIX permission bits of an entry, file-type bits stripped.
pub fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & PERMISSION_MASK
}

#[cfg(not(unix))]
/// Synthesized permission bits: no native mode exists on this platform.
pub fn permission_bits(meta: &Metadata) -> u32 {
    let base = if meta.is_dir() { 0o755 } else { 0o644 };
    if meta.permissions().readonly() {
        base & 0o555 & PERMISSION_MASK
    } else {
        base & PERMISSION_MASK
    }
}

/// Target of a symbolic link as a display string.
pub fn link_target(path: &Path) -> io::Result<String> {
    Ok(read_link(path)?.to_string_lossy().into_owned())
}
