//! Decoding archive byte streams into an [`ArchiveIndex`].
//!
//! Tar-family archives are walked as a stream through the matching decoder; only
//! headers are interpreted and entry bodies are skipped. Zip needs its central
//! directory at the end of the file, so a source that cannot seek is spooled to
//! an anonymous temporary file first.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use tar::EntryType;
use zip::result::ZipError;

use super::{ArchiveFormat, ArchiveIndex, SNIFF_LEN};
use crate::common::EntryKind;
use crate::storage::{GuardedReader, SourceFault};
use crate::BundleError;

/// Indexes an archive from a sequential stream.
///
/// `hint` is the format implied by the object name; the leading bytes decide when
/// they carry a recognizable signature.
pub fn index_stream<R: Read>(mut source: GuardedReader<R>, hint: Option<ArchiveFormat>) -> Result<ArchiveIndex, BundleError> {
    let fault = source.fault();
    let head = read_head(&mut source, &fault)?;
    let format = ArchiveFormat::detect(hint, &head).map_err(BundleError::UnsupportedArchiveFormat)?;
    let stream = Cursor::new(head).chain(source);

    if format == ArchiveFormat::Zip {
        let mut spool = tempfile::tempfile().map_err(|e| BundleError::io(e, std::env::temp_dir()))?;
        let mut stream = stream;
        let copied = io::copy(&mut stream, &mut spool).map_err(|e| {
            if fault.is_set() {
                transient(e)
            } else {
                BundleError::io(e, std::env::temp_dir())
            }
        })?;
        drop(stream);
        tracing::debug!(bytes = copied, "spooled zip stream for random access");
        spool.seek(SeekFrom::Start(0))?;
        // The spool is local; its read errors are not transport faults.
        return index_zip(spool, &SourceFault::default());
    }

    index_tar_family(stream, format, &fault)
}

/// Indexes an archive from a source that supports range reads.
pub fn index_seekable<R: Read + Seek>(mut source: GuardedReader<R>, hint: Option<ArchiveFormat>) -> Result<ArchiveIndex, BundleError> {
    let fault = source.fault();
    let head = read_head(&mut source, &fault)?;
    let format = ArchiveFormat::detect(hint, &head).map_err(BundleError::UnsupportedArchiveFormat)?;
    source.seek(SeekFrom::Start(0)).map_err(|e| classify(e, &fault))?;

    if format == ArchiveFormat::Zip {
        index_zip(source, &fault)
    } else {
        index_tar_family(source, format, &fault)
    }
}

fn read_head<R: Read>(source: &mut R, fault: &SourceFault) -> Result<Vec<u8>, BundleError> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    source
        .by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| classify(e, fault))?;
    Ok(head)
}

fn index_tar_family<R: Read>(reader: R, format: ArchiveFormat, fault: &SourceFault) -> Result<ArchiveIndex, BundleError> {
    let index = match format {
        ArchiveFormat::Tar => index_tar(reader, fault)?,
        ArchiveFormat::TarGz => index_tar(flate2::read::MultiGzDecoder::new(reader), fault)?,
        ArchiveFormat::TarXz => index_tar(xz2::read::XzDecoder::new(reader), fault)?,
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(reader).map_err(|e| classify(e, fault))?;
            index_tar(decoder, fault)?
        }
        ArchiveFormat::Zip => return Err(BundleError::UnsupportedArchiveFormat("zip is not a tar stream".into())),
    };
    tracing::debug!(
        %format,
        entries = index.len(),
        synthesized = index.synthesized_count(),
        "indexed tar archive"
    );
    Ok(index)
}

fn index_tar<R: Read>(reader: R, fault: &SourceFault) -> Result<ArchiveIndex, BundleError> {
    let mut archive = tar::Archive::new(reader);
    let mut index = ArchiveIndex::new();

    for entry in archive.entries().map_err(|e| classify(e, fault))? {
        let entry = entry.map_err(|e| classify(e, fault))?;
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let header = entry.header();

        let kind = match header.entry_type() {
            EntryType::Directory => EntryKind::Directory,
            // Pre-POSIX archives mark directories only by a trailing slash.
            EntryType::Regular if path.ends_with('/') => EntryKind::Directory,
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => EntryKind::File,
            EntryType::Symlink | EntryType::Link => EntryKind::Link,
            other => {
                tracing::debug!(path = %path, entry_type = ?other, "skipping special tar entry");
                continue;
            }
        };
        let link_target = if kind == EntryKind::Link {
            entry.link_name_bytes().map(|b| String::from_utf8_lossy(&b).into_owned())
        } else {
            None
        };
        let mode = header.mode().ok();
        let size = entry.size();

        index
            .insert(&path, kind, size, mode, link_target)
            .map_err(|reason| BundleError::corrupt("", reason))?;
    }
    Ok(index)
}

struct ZipRecord {
    name: String,
    is_dir: bool,
    size: u64,
    central_header: u64,
}

fn index_zip<R: Read + Seek>(reader: R, fault: &SourceFault) -> Result<ArchiveIndex, BundleError> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| zip_failure(e, fault))?;
    let mut records = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i).map_err(|e| zip_failure(e, fault))?;
        records.push(ZipRecord {
            name: file.name().to_string(),
            is_dir: file.is_dir(),
            size: file.size(),
            central_header: file.central_header_start(),
        });
    }

    let mut reader = archive.into_inner();
    let mut index = ArchiveIndex::new();
    for record in records {
        let mode = recorded_unix_mode(&mut reader, record.central_header).map_err(|e| classify(e, fault))?;
        let kind = if record.is_dir {
            EntryKind::Directory
        } else if mode.map_or(false, |m| m & S_IFMT == S_IFLNK) {
            EntryKind::Link
        } else {
            EntryKind::File
        };
        index
            .insert(&record.name, kind, record.size, mode, None)
            .map_err(|reason| BundleError::corrupt("", reason))?;
    }
    tracing::debug!(entries = index.len(), synthesized = index.synthesized_count(), "indexed zip archive");
    Ok(index)
}

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

const CENTRAL_HEADER_SIGNATURE: [u8; 4] = *b"PK\x01\x02";
/// Bytes of a central directory record up to and including the external attributes.
const CENTRAL_HEADER_PREFIX: usize = 42;
const HOST_UNIX: u8 = 3;

/// Permission bits stored in a zip central directory record.
///
/// Only entries made on a Unix host carry real mode bits, in the upper half of the
/// external attributes. Anything else (DOS attribute bytes, a zero upper half) has no
/// recorded mode. `ZipFile::unix_mode` cannot be used here: it invents `0o664`/`0o775`
/// for DOS-made entries.
fn recorded_unix_mode<R: Read + Seek>(reader: &mut R, central_header: u64) -> io::Result<Option<u32>> {
    let mut header = [0u8; CENTRAL_HEADER_PREFIX];
    reader.seek(SeekFrom::Start(central_header))?;
    reader.read_exact(&mut header)?;
    if header[..4] != CENTRAL_HEADER_SIGNATURE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad central directory record signature"));
    }
    let host = header[5];
    let external = u32::from_le_bytes([header[38], header[39], header[40], header[41]]);
    let mode = external >> 16;
    Ok((host == HOST_UNIX && mode != 0).then_some(mode))
}

/// Source faults (including cancellation) are transient; anything else came from
/// decoding the bytes and means the archive itself is bad.
fn classify(err: io::Error, fault: &SourceFault) -> BundleError {
    if fault.is_set() {
        transient(err)
    } else {
        BundleError::corrupt("", err.to_string())
    }
}

fn transient(err: io::Error) -> BundleError {
    BundleError::TransientIo { locator: String::new(), source: err }
}

fn zip_failure(err: ZipError, fault: &SourceFault) -> BundleError {
    match err {
        ZipError::Io(e) => classify(e, fault),
        ZipError::InvalidArchive(msg) => BundleError::corrupt("", msg),
        ZipError::UnsupportedArchive(msg) => BundleError::UnsupportedArchiveFormat(msg.to_string()),
        ZipError::FileNotFound => BundleError::corrupt("", "central directory names a missing entry"),
    }
}
