//! # Bundle Locators
//!
//! Parses the raw locator strings that name a bundle's physical storage into a
//! [`BundleDescriptor`].
//!
//! Two shapes are accepted:
//!
//! - **Local**: any filesystem path without a scheme, e.g. `/data/bundles/0x1234`.
//! - **Remote**: `<scheme>://<account>/<container>/<bundle-id>/<object-name>[/<internal-path>]`,
//!   e.g. `azfs://storageclwsdev0/bundles/0x1234/contents.tar.gz/src/main.rs`.
//!   When `<object-name>` carries a known archive suffix the bundle is archive-backed and
//!   the trailing `<internal-path>` is kept as a non-authoritative hint.

use serde::Serialize;

use crate::common::normalize_path;
use crate::config::ResolverConfig;
use crate::index::ArchiveFormat;
use crate::BundleError;

/// Physical medium a bundle lives on.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// A real directory tree (or single file) on local disk.
    Local,
    /// A single archive object in remote storage holding the whole bundle.
    RemoteArchiveObject,
    /// A single, non-archive object in remote storage.
    RemoteObject,
}

/// Structured form of a bundle locator.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BundleDescriptor {
    pub storage_kind: StorageKind,
    /// The path (local) or `scheme://account/container/bundle-id/object` (remote) of the stored bundle.
    pub object_locator: String,
    pub is_archive: bool,
    pub archive_format: Option<ArchiveFormat>,
    /// Opaque bundle id; `None` for local bundles.
    pub bundle_id: Option<String>,
    /// Path after the archive object name in the raw locator. Only a hint: the
    /// authoritative target path is the one passed to the resolver.
    pub archive_subpath: Option<String>,
    pub scheme: Option<String>,
    pub account: Option<String>,
    pub container: Option<String>,
}

impl BundleDescriptor {
    /// Last segment of the object locator: the archive/object name for remote
    /// bundles, the file or directory name for local ones.
    pub fn object_name(&self) -> &str {
        let trimmed = self.object_locator.trim_end_matches(['/', '\\']);
        trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
    }

    pub fn is_remote(&self) -> bool {
        self.storage_kind != StorageKind::Local
    }
}

impl std::fmt::Display for BundleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.object_locator)
    }
}

/// Parses a raw locator into a [`BundleDescriptor`].
///
/// Fails with [`BundleError::MalformedLocator`] when a remote locator lacks one of the
/// account, container, bundle-id or object segments, or names a scheme that is
/// not configured as remote storage.
pub fn parse_locator(raw: &str, config: &ResolverConfig) -> Result<BundleDescriptor, BundleError> {
    if raw.trim().is_empty() {
        return Err(BundleError::malformed(raw, "empty locator"));
    }

    let Some((scheme, rest)) = raw.split_once("://") else {
        tracing::debug!(locator = raw, "classified as local bundle");
        return Ok(BundleDescriptor {
            storage_kind: StorageKind::Local,
            object_locator: raw.to_string(),
            is_archive: false,
            archive_format: None,
            bundle_id: None,
            archive_subpath: None,
            scheme: None,
            account: None,
            container: None,
        });
    };

    // Anything with a scheme is remote-shaped; an unconfigured one is an error, never a local path.
    if !config.is_remote_scheme(scheme) {
        return Err(BundleError::malformed(raw, format!("unrecognized scheme '{}'", scheme)));
    }

    let mut parts = rest.splitn(5, '/');
    let mut segment = |what: &str| -> Result<String, BundleError> {
        match parts.next() {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(BundleError::malformed(raw, format!("missing {} segment", what))),
        }
    };
    let account = segment("account")?;
    let container = segment("container")?;
    let bundle_id = segment("bundle id")?;
    let object = segment("object")?;
    let remainder = parts.next();

    let archive_format = ArchiveFormat::from_name(&object);
    let is_archive = archive_format.is_some();
    let archive_subpath = match remainder {
        Some(r) if is_archive => {
            let normalized = normalize_path(r)
                .ok_or_else(|| BundleError::malformed(raw, "internal path escapes the archive"))?;
            (!normalized.is_empty()).then_some(normalized)
        }
        _ => None,
    };

    let object_locator = format!("{}://{}/{}/{}/{}", scheme, account, container, bundle_id, object);
    let storage_kind = if is_archive { StorageKind::RemoteArchiveObject } else { StorageKind::RemoteObject };
    tracing::debug!(locator = raw, kind = ?storage_kind, format = ?archive_format, "classified remote bundle");

    Ok(BundleDescriptor {
        storage_kind,
        object_locator,
        is_archive,
        archive_format,
        bundle_id: Some(bundle_id),
        archive_subpath,
        scheme: Some(scheme.to_string()),
        account: Some(account),
        container: Some(container),
    })
}
