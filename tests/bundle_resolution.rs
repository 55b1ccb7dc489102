//! End-to-end resolution of archive-backed, object-backed and local bundles.

use bundlearch::storage::{CancelToken, MemoryObjectStore, RemoteObject, RemoteObjectReader};
use bundlearch::locator::BundleDescriptor;
use bundlearch::{BundleError, BundleResolver, BundleTarget, ResolverConfig, TargetInfo};
use serde_json::json;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

const TGZ: &str = "azfs://storageclwsdev0/bundles/0x1234/contents.tar.gz";

enum Item<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
}

fn tar_of(items: &[Item]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for item in items {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o644);
        match item {
            Item::Dir(path) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                builder.append_data(&mut header, path, io::empty()).unwrap();
            }
            Item::File(path, data) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(data.len() as u64);
                builder.append_data(&mut header, path, *data).unwrap();
            }
        }
    }
    builder.into_inner().unwrap()
}

fn gz(bytes: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

fn sample_archive() -> Vec<u8> {
    gz(&tar_of(&[
        Item::File("./README.md", b"hello world"),
        Item::Dir("./src"),
        Item::File("./src/test.sh", b"echo hi"),
        Item::Dir("./dist"),
        Item::Dir("./dist/a"),
        Item::Dir("./dist/a/b"),
        Item::File("./dist/a/b/test2.sh", b"echo two"),
    ]))
}

fn without_locator(info: &TargetInfo) -> serde_json::Value {
    let mut v = serde_json::to_value(info).unwrap();
    v.as_object_mut().unwrap().remove("resolved_target");
    v
}

#[test]
fn archive_bundle_scenarios() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = sample_archive();
    let size = bytes.len() as u64;
    let store = MemoryObjectStore::new();
    store.insert(TGZ, bytes);
    let resolver = BundleResolver::with_remote(store.clone(), ResolverConfig::default());

    let root = resolver.target_info(TGZ, &BundleTarget::root("0x1234"), 0)?;
    assert_eq!(without_locator(&root), json!({"name": "0x1234", "type": "directory", "size": size, "perm": 511}));

    let root = resolver.target_info(TGZ, &BundleTarget::root("0x1234"), 1)?;
    assert_eq!(
        without_locator(&root),
        json!({
            "name": "0x1234", "type": "directory", "size": size, "perm": 511,
            "contents": [
                {"name": "README.md", "type": "file", "size": 11, "perm": 420},
                {"name": "src", "type": "directory", "size": 0, "perm": 420},
                {"name": "dist", "type": "directory", "size": 0, "perm": 420},
            ]
        })
    );

    let src = resolver.target_info(TGZ, &BundleTarget::new("0x1234", Some("/src"))?, 1)?;
    assert_eq!(
        without_locator(&src),
        json!({
            "name": "src", "type": "directory", "size": 0, "perm": 420,
            "contents": [{"name": "test.sh", "type": "file", "size": 7, "perm": 420}]
        })
    );
    assert_eq!(src.resolved_target.as_deref(), Some(&*format!("{}/src", TGZ)));

    let leaf = resolver.target_info(TGZ, &BundleTarget::new("0x1234", Some("dist/a/b/test2.sh"))?, 3)?;
    assert_eq!(without_locator(&leaf), json!({"name": "test2.sh", "type": "file", "size": 8, "perm": 420}));

    let a = resolver.target_info(TGZ, &BundleTarget::new("0x1234", Some("dist/a"))?, 999)?;
    assert_eq!(
        without_locator(&a),
        json!({
            "name": "a", "type": "directory", "size": 0, "perm": 420,
            "contents": [{
                "name": "b", "type": "directory", "size": 0, "perm": 420,
                "contents": [{"name": "test2.sh", "type": "file", "size": 8, "perm": 420}]
            }]
        })
    );

    let err = resolver
        .target_info(TGZ, &BundleTarget::new("0x1234", Some("src/missing"))?, 0)
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert_eq!(store.open_handles(), 0);
    Ok(())
}

#[test]
fn archive_without_directory_entries() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryObjectStore::sequential();
    store.insert(
        TGZ,
        gz(&tar_of(&[Item::File("dist/a/b/test2.sh", b"echo two"), Item::File("top.txt", b"t")])),
    );
    let resolver = BundleResolver::with_remote(store, ResolverConfig::default());

    let root = resolver.target_info(TGZ, &BundleTarget::root("0x1234"), usize::MAX)?;
    let names: Vec<_> = root.contents.as_ref().unwrap().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["dist", "top.txt"]);

    let b = root.child("dist").and_then(|d| d.child("a")).and_then(|a| a.child("b")).unwrap();
    assert_eq!(b.perm, 0o644);
    assert_eq!(b.size, 0);
    assert_eq!(b.child("test2.sh").map(|f| f.size), Some(8));

    let implied = resolver.target_info(TGZ, &BundleTarget::new("0x1234", Some("dist/a"))?, 0)?;
    assert_eq!(implied.kind.as_str(), "directory");
    assert!(implied.contents.is_none());
    Ok(())
}

#[test]
fn zip_bundles_index_from_streams_and_range_reads() -> Result<(), Box<dyn std::error::Error>> {
    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = zip::write::FileOptions::default().unix_permissions(0o600);
    zw.start_file("data/train.csv", opts)?;
    zw.write_all(b"a,b\n1,2\n")?;
    let bytes = zw.finish()?.into_inner();

    let locator = "azfs://acct/bundles/0xzip/contents.zip";
    for store in [MemoryObjectStore::new(), MemoryObjectStore::sequential()] {
        store.insert(locator, bytes.clone());
        let resolver = BundleResolver::with_remote(store.clone(), ResolverConfig::default());
        let info = resolver.target_info(locator, &BundleTarget::new("0xzip", Some("data"))?, 1)?;
        assert_eq!(
            without_locator(&info),
            json!({
                "name": "data", "type": "directory", "size": 0, "perm": 420,
                "contents": [{"name": "train.csv", "type": "file", "size": 8, "perm": 384}]
            })
        );
        assert_eq!(store.open_handles(), 0);
    }
    Ok(())
}

#[test]
fn zip_made_on_windows_reports_default_perm() -> Result<(), Box<dyn std::error::Error>> {
    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zw.start_file("docs/guide.txt", zip::write::FileOptions::default())?;
    zw.write_all(b"guide")?;
    let mut bytes = zw.finish()?.into_inner();

    // Mark the central record as DOS-made with only the archive attribute set.
    let rec = bytes.windows(4).position(|w| w == b"PK\x01\x02").ok_or("no central record")?;
    bytes[rec + 5] = 0;
    bytes[rec + 38..rec + 42].copy_from_slice(&0x20u32.to_le_bytes());

    let locator = "azfs://acct/bundles/0xwin/contents.zip";
    let store = MemoryObjectStore::new();
    store.insert(locator, bytes);
    let resolver = BundleResolver::with_remote(store, ResolverConfig::default());

    let guide = resolver.target_info(locator, &BundleTarget::new("0xwin", Some("docs/guide.txt"))?, 0)?;
    assert_eq!(guide.perm, 0o644);
    let docs = resolver.target_info(locator, &BundleTarget::new("0xwin", Some("docs"))?, 0)?;
    assert_eq!(docs.perm, 0o644);
    Ok(())
}

#[test]
fn single_object_bundle_is_one_file()-> Result<(), Box<dyn std::error::Error>> {
    let locator = "azfs://acct/bundles/0xobj/contents";
    let store = MemoryObjectStore::new();
    store.insert(locator, b"plain bytes".to_vec());
    let resolver = BundleResolver::with_remote(store, ResolverConfig::default());

    for depth in [0, 4] {
        let info = resolver.target_info(locator, &BundleTarget::root("0xobj"), depth)?;
        assert_eq!(without_locator(&info), json!({"name": "0xobj", "type": "file", "size": 11, "perm": 511}));
    }
    let err = resolver.target_info(locator, &BundleTarget::new("0xobj", Some("inner"))?, 0).unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[test]
fn missing_remote_object_is_not_found() {
    let resolver = BundleResolver::with_remote(MemoryObjectStore::new(), ResolverConfig::default());
    let err = resolver.target_info(TGZ, &BundleTarget::root("0x1234"), 1).unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

/// Serves the wrapped bytes, then fails every read past `fail_after` bytes.
struct FlakyStore {
    bytes: Arc<[u8]>,
    fail_after: usize,
    open: Arc<AtomicUsize>,
}

struct FlakyObject {
    data: Cursor<Arc<[u8]>>,
    fail_after: usize,
    open: Arc<AtomicUsize>,
}

impl RemoteObjectReader for FlakyStore {
    fn open(&self, _descriptor: &BundleDescriptor) -> Result<Box<dyn RemoteObject>, BundleError> {
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FlakyObject {
            data: Cursor::new(Arc::clone(&self.bytes)),
            fail_after: self.fail_after,
            open: Arc::clone(&self.open),
        }))
    }
}

impl Read for FlakyObject {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.data.position() as usize >= self.fail_after {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
        }
        let room = self.fail_after - self.data.position() as usize;
        let n = buf.len().min(room);
        self.data.read(&mut buf[..n])
    }
}

impl RemoteObject for FlakyObject {
    fn size(&self) -> u64 {
        self.data.get_ref().len() as u64
    }
}

impl Drop for FlakyObject {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[test]
fn interrupted_source_is_transient_and_released() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = gz(&tar_of(&[Item::File("big.bin", &[42u8; 64 * 1024]), Item::File("after.txt", b"x")]));
    let open = Arc::new(AtomicUsize::new(0));
    let store = FlakyStore { fail_after: bytes.len() / 3, bytes: bytes.into(), open: Arc::clone(&open) };
    let resolver = BundleResolver::with_remote(store, ResolverConfig::default());

    let err = resolver
        .target_info(TGZ, &BundleTarget::new("0x1234", Some("after.txt"))?, 0)
        .unwrap_err();
    assert!(err.is_transient(), "{err}");
    assert!(!err.is_not_found());
    assert!(err.to_string().contains(TGZ), "{err}");
    assert_eq!(open.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn cancelled_request_is_transient() -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryObjectStore::new();
    store.insert(TGZ, sample_archive());
    let resolver = BundleResolver::with_remote(store.clone(), ResolverConfig::default());
    let token = CancelToken::new();
    token.cancel();

    let err = resolver
        .target_info_with(TGZ, &BundleTarget::new("0x1234", Some("src"))?, 1, &token)
        .unwrap_err();
    assert!(err.is_transient(), "{err}");
    assert_eq!(store.open_handles(), 0);
    Ok(())
}

#[test]
fn local_bundle_tree() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let bundle = dir.path().join("0xlocal");
    fs::create_dir_all(bundle.join("src/nested"))?;
    fs::write(bundle.join("README.md"), b"hello world")?;
    fs::write(bundle.join("src/main.rs"), b"fn main() {}")?;

    let resolver = BundleResolver::with_remote(MemoryObjectStore::new(), ResolverConfig::default());
    let locator = bundle.to_string_lossy().into_owned();

    let root = resolver.target_info(&locator, &BundleTarget::root("0xlocal"), 2)?;
    assert_eq!(root.name, "0xlocal");
    let names: Vec<_> = root.contents.as_ref().unwrap().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["README.md", "src"]);
    let src = root.child("src").unwrap();
    assert_eq!(src.child("main.rs").map(|f| f.size), Some(12));
    assert!(src.child("nested").unwrap().contents.is_none());

    let file = resolver.target_info(&locator, &BundleTarget::new("0xlocal", Some("src/main.rs"))?, 3)?;
    assert_eq!((file.name.as_str(), file.size, file.contents.is_none()), ("main.rs", 12, true));

    let err = resolver
        .target_info(&locator, &BundleTarget::new("0xlocal", Some("SRC/main.rs"))?, 0)
        .unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[test]
fn escaping_target_paths_are_rejected() {
    let err = BundleTarget::new("0x1234", Some("src/../../etc/passwd")).unwrap_err();
    assert!(matches!(err, BundleError::InvalidTargetPath(_)));
}
