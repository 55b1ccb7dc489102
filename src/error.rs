use std::io;
use std::path::PathBuf;

/// The primary error type for all operations in the `bundlearch` crate.
#[derive(Debug)]
pub enum BundleError {
    /// The locator string could not be parsed into a bundle descriptor.
    MalformedLocator { locator: String, reason: String },

    /// The requested path inside a bundle is not a valid relative path
    /// (for example it tries to climb out with `..`).
    InvalidTargetPath(String),

    /// The archive object is in a format we cannot index.
    UnsupportedArchiveFormat(String),

    /// The archive was recognized but its entry stream is truncated or inconsistent.
    CorruptArchive { locator: String, reason: String },

    /// Indexing or stat succeeded, but nothing matches the requested path.
    NotFound { locator: String, subpath: String },

    /// Opening or reading remote bytes failed, or the read was cancelled.
    /// Callers may retry these with backoff.
    TransientIo { locator: String, source: io::Error },

    /// An I/O error on the local filesystem.
    /// Includes the path where the error happened.
    Io { source: io::Error, path: PathBuf },

    /// An error while encoding the output tree.
    SerdeJson(serde_json::Error),
}

impl BundleError {
    /// True for the kinds a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, BundleError::TransientIo { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BundleError::NotFound { .. })
    }

    pub(crate) fn malformed(locator: &str, reason: impl Into<String>) -> Self {
        BundleError::MalformedLocator { locator: locator.to_string(), reason: reason.into() }
    }

    pub(crate) fn corrupt(locator: &str, reason: impl Into<String>) -> Self {
        BundleError::CorruptArchive { locator: locator.to_string(), reason: reason.into() }
    }

    pub(crate) fn not_found(locator: &str, subpath: &str) -> Self {
        BundleError::NotFound { locator: locator.to_string(), subpath: subpath.to_string() }
    }

    pub(crate) fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        BundleError::Io { source, path: path.into() }
    }

    /// Replaces an empty locator (as produced by the indexer, which only sees bytes)
    /// with the locator of the object that was being indexed.
    pub(crate) fn with_locator(self, locator: &str) -> Self {
        match self {
            BundleError::CorruptArchive { locator: l, reason } if l.is_empty() => {
                BundleError::CorruptArchive { locator: locator.to_string(), reason }
            }
            BundleError::TransientIo { locator: l, source } if l.is_empty() => {
                BundleError::TransientIo { locator: locator.to_string(), source }
            }
            other => other,
        }
    }
}

impl std::fmt::Display for BundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundleError::MalformedLocator { locator, reason } => write!(f, "Malformed bundle locator '{}': {}", locator, reason),
            BundleError::InvalidTargetPath(path) => write!(f, "Invalid target path '{}'", path),
            BundleError::UnsupportedArchiveFormat(what) => write!(f, "Unsupported archive format: {}", what),
            BundleError::CorruptArchive { locator, reason } => write!(f, "Corrupt archive '{}': {}", locator, reason),
            BundleError::NotFound { locator, subpath } => {
                if subpath.is_empty() {
                    write!(f, "Bundle '{}' not found", locator)
                } else {
                    write!(f, "Path '{}' not found in bundle '{}'", subpath, locator)
                }
            }
            BundleError::TransientIo { locator, source } => write!(f, "I/O error reading '{}': {}", locator, source),
            BundleError::Io { source, path } => write!(f, "I/O error on path '{}': {}", path.display(), source),
            BundleError::SerdeJson(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for BundleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BundleError::TransientIo { source, .. } => Some(source),
            BundleError::Io { source, .. } => Some(source),
            BundleError::SerdeJson(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        BundleError::SerdeJson(err)
    }
}

// Generic IO error conversion that doesn't require a path
impl From<io::Error> for BundleError {
    fn from(err: io::Error) -> Self {
        BundleError::Io { source: err, path: PathBuf::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_distinct_from_not_found() {
        let t = BundleError::TransientIo {
            locator: "azfs://a/b/c/d.zip".into(),
            source: io::Error::new(io::ErrorKind::TimedOut, "deadline"),
        };
        let n = BundleError::not_found("azfs://a/b/c/d.zip", "x");
        assert!(t.is_transient() && !t.is_not_found());
        assert!(n.is_not_found() && !n.is_transient());
    }

    #[test]
    fn with_locator_fills_only_empty_locators() {
        let e = BundleError::corrupt("", "truncated").with_locator("azfs://a/b/c/d.tar");
        assert_eq!(e.to_string(), "Corrupt archive 'azfs://a/b/c/d.tar': truncated");

        let e = BundleError::corrupt("first", "x").with_locator("second");
        assert!(e.to_string().contains("'first'"));
    }
}
