//! Archive format detection by name suffix and by magic bytes.

use serde::Serialize;

/// Number of leading bytes needed to sniff every supported format (tar's `ustar` sits at 257).
pub const SNIFF_LEN: usize = 262;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

/// Archive containers the indexer understands.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// Randomly seekable zip with a central directory.
    Zip,
    /// Uncompressed sequential tar.
    Tar,
    TarGz,
    TarXz,
    TarZst,
}

/// Suffix table, longest suffixes first so `.tar.gz` wins over `.gz`-style partial matches.
const SUFFIXES: &[(&str, ArchiveFormat)] = &[
    (".tar.gz", ArchiveFormat::TarGz),
    (".tar.xz", ArchiveFormat::TarXz),
    (".tar.zst", ArchiveFormat::TarZst),
    (".tgz", ArchiveFormat::TarGz),
    (".txz", ArchiveFormat::TarXz),
    (".tzst", ArchiveFormat::TarZst),
    (".tar", ArchiveFormat::Tar),
    (".zip", ArchiveFormat::Zip),
];

impl ArchiveFormat {
    /// Infers the format from an object name's suffix (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix) && lower.len() > suffix.len())
            .map(|&(_, fmt)| fmt)
    }

    /// Identifies the format from the leading bytes of a stream.
    ///
    /// A plain tar is only recognized when `head` reaches past the `ustar` marker;
    /// pre-POSIX tars carry no magic and must be identified by name.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.starts_with(ZIP_MAGIC) || head.starts_with(ZIP_EMPTY_MAGIC) {
            Some(ArchiveFormat::Zip)
        } else if head.starts_with(GZIP_MAGIC) {
            Some(ArchiveFormat::TarGz)
        } else if head.starts_with(XZ_MAGIC) {
            Some(ArchiveFormat::TarXz)
        } else if head.starts_with(ZSTD_MAGIC) {
            Some(ArchiveFormat::TarZst)
        } else if head.len() >= TAR_MAGIC_OFFSET + TAR_MAGIC.len()
            && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()] == TAR_MAGIC
        {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }

    /// Chooses the decoder for a stream given the suffix-derived hint and the sniffed head.
    ///
    /// Sniffed magic wins. A hint of plain `Tar` is trusted without magic. Anything
    /// else that cannot be confirmed is rejected.
    pub fn detect(hint: Option<Self>, head: &[u8]) -> Result<Self, String> {
        match (Self::sniff(head), hint) {
            (Some(sniffed), _) => Ok(sniffed),
            (None, Some(ArchiveFormat::Tar)) => Ok(ArchiveFormat::Tar),
            (None, Some(hinted)) => Err(format!("content does not match the {} format", hinted)),
            (None, None) => Err("unrecognized archive signature".to_string()),
        }
    }

    pub fn is_tar(self) -> bool {
        self != ArchiveFormat::Zip
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarXz => "tar.xz",
            ArchiveFormat::TarZst => "tar.zst",
        };
        f.write_str(s)
    }
}
