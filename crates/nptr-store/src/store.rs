use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::hasher::HashAlgorithm;
use crate::key::ObjectKey;
use crate::spool::{Spooled, Spooler, SPOOL_PREFIX};

/// Content type served when the extension says nothing.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Result of publishing an upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutOutcome {
    /// Key the object is stored under.
    pub key: ObjectKey,
    /// Absolute location of the object file.
    pub location: PathBuf,
    /// `false` when an object with this key already existed (dedup hit).
    pub created: bool,
    /// Size of the stored object in bytes. On a dedup hit this is the size of
    /// the object already on disk, not of the discarded upload.
    pub size: u64,
}

impl PutOutcome {
    /// Path component of the object's public URL.
    pub fn public_path(&self) -> String {
        format!("/{}", self.key)
    }
}

/// An open stored object, ready to be streamed.
#[derive(Debug)]
pub struct BlobHandle {
    key: ObjectKey,
    file: File,
    size: u64,
    content_type: &'static str,
}

impl BlobHandle {
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// The whole object, read from offset 0.
    pub fn into_file(self) -> File {
        self.file
    }

    /// A reader over `len` bytes starting at `start`.
    pub async fn into_range(mut self, start: u64, len: u64) -> StoreResult<Take<File>> {
        self.file.seek(SeekFrom::Start(start)).await?;
        Ok(self.file.take(len))
    }
}

/// Flat, content-addressed blob store rooted at one local directory.
///
/// Every object is a single file named by its key directly under the root.
/// Uploads are spooled to hidden temporary files in the same directory and
/// published with an atomic no-clobber rename, so:
///
/// - readers only ever see complete objects;
/// - two uploads racing for the same key both succeed, one of them as a
///   dedup hit;
/// - an abandoned upload leaves nothing visible behind.
///
/// The store keeps no in-process state besides the root path and is safe to
/// share across any number of tasks.
#[derive(Clone, Debug)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open the store. The root must already exist and be a directory.
    ///
    /// Leftover spool files from a previous run are removed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        match std::fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(StoreError::MissingRoot(root.to_path_buf())),
        }
        let store = Self {
            root: root.to_path_buf(),
        };
        let swept = store.sweep_spools()?;
        if swept > 0 {
            warn!(root = %root.display(), count = swept, "removed stale upload spools");
        }
        info!(root = %root.display(), "opened blob store");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the object for `key` lives (whether or not it exists).
    pub fn object_path(&self, key: &ObjectKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Start spooling an upload of at most `limit` bytes.
    pub async fn spool(&self, algorithm: HashAlgorithm, limit: u64) -> StoreResult<Spooler> {
        Spooler::create(&self.root, algorithm, limit).await
    }

    /// Whether anything is stored under `key`.
    pub async fn contains(&self, key: &ObjectKey) -> StoreResult<bool> {
        Ok(self.stored_size(key).await?.is_some())
    }

    /// Publish a spooled upload under `key`.
    ///
    /// If the key is already taken the spool is discarded and the existing
    /// object is reported with `created: false`. The same happens when a
    /// concurrent upload publishes the key between the check and the rename.
    pub async fn put(&self, spooled: Spooled, key: &ObjectKey) -> StoreResult<PutOutcome> {
        let location = self.object_path(key);
        let size = spooled.len();

        if let Some(stored) = self.stored_size(key).await? {
            debug!(key = %key, "object already stored");
            return Ok(self.existing(key, stored));
        }

        let temp = spooled.into_temp_path();
        let dest = location.clone();
        let published = tokio::task::spawn_blocking(move || {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o644))?;
            }
            match temp.persist_noclobber(&dest) {
                Ok(()) => Ok(true),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(e.error),
            }
        })
        .await
        .map_err(io::Error::other)??;

        if !published {
            debug!(key = %key, "lost publish race; object already stored");
            let stored = self.stored_size(key).await?.unwrap_or(size);
            return Ok(self.existing(key, stored));
        }

        info!(key = %key, size, "stored new object");
        Ok(PutOutcome {
            key: key.clone(),
            location,
            created: true,
            size,
        })
    }

    fn existing(&self, key: &ObjectKey, size: u64) -> PutOutcome {
        PutOutcome {
            key: key.clone(),
            location: self.object_path(key),
            created: false,
            size,
        }
    }

    async fn stored_size(&self, key: &ObjectKey) -> StoreResult<Option<u64>> {
        match tokio::fs::symlink_metadata(self.object_path(key)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Open the object stored under `key`.
    pub async fn get(&self, key: &ObjectKey) -> StoreResult<BlobHandle> {
        let path = self.object_path(key);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(BlobHandle {
            key: key.clone(),
            file,
            size: meta.len(),
            content_type: content_type_for(key),
        })
    }

    fn sweep_spools(&self) -> StoreResult<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(SPOOL_PREFIX) {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// MIME type for a key, from its extension.
pub fn content_type_for(key: &ObjectKey) -> &'static str {
    let Some(ext) = key.extension() else {
        return DEFAULT_CONTENT_TYPE;
    };
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "log" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{NamingScheme, ObjectNamer};
    use std::sync::Arc;

    async fn spool_bytes(store: &BlobStore, data: &[u8]) -> Spooled {
        let mut spooler = store.spool(HashAlgorithm::Crc32, u64::MAX).await.unwrap();
        spooler.write(data).await.unwrap();
        spooler.finish().await.unwrap()
    }

    async fn upload(store: &BlobStore, data: &[u8], filename: &str) -> PutOutcome {
        let spooled = spool_bytes(store, data).await;
        let key = ObjectNamer::new(NamingScheme::Crc32).name(spooled.digest(), filename);
        store.put(spooled, &key).await.unwrap()
    }

    fn visible_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn read_all(handle: BlobHandle) -> Vec<u8> {
        let mut out = Vec::new();
        handle.into_file().read_to_end(&mut out).await.unwrap();
        out
    }

    // -----------------------------------------------------------------------
    // Opening
    // -----------------------------------------------------------------------

    #[test]
    fn open_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = BlobStore::open(&missing).unwrap_err();
        assert!(matches!(err, StoreError::MissingRoot(p) if p == missing));
    }

    #[test]
    fn open_file_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            BlobStore::open(&file).unwrap_err(),
            StoreError::MissingRoot(_)
        ));
    }

    #[test]
    fn open_sweeps_stale_spools() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{SPOOL_PREFIX}abc")), b"junk").unwrap();
        std::fs::write(dir.path().join("0d4a1185.txt"), b"hello world").unwrap();

        BlobStore::open(dir.path()).unwrap();
        assert_eq!(visible_files(dir.path()), vec!["0d4a1185.txt"]);
    }

    // -----------------------------------------------------------------------
    // Put / Get
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        let outcome = upload(&store, b"hello world", "hello.txt").await;
        assert!(outcome.created);
        assert_eq!(outcome.key.as_str(), "0d4a1185.txt");
        assert_eq!(outcome.public_path(), "/0d4a1185.txt");
        assert_eq!(outcome.location, dir.path().join("0d4a1185.txt"));
        assert_eq!(outcome.size, 11);

        let handle = store.get(&outcome.key).await.unwrap();
        assert_eq!(handle.size(), 11);
        assert_eq!(handle.content_type(), "text/plain");
        assert_eq!(read_all(handle).await, b"hello world");
    }

    #[tokio::test]
    async fn identical_upload_is_a_dedup_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();

        let first = upload(&store, b"same bytes", "a.bin").await;
        let second = upload(&store, b"same bytes", "b.bin").await;
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.key, second.key);
        assert_eq!(visible_files(dir.path()), vec![first.key.to_string()]);
    }

    #[tokio::test]
    async fn dedup_hit_keeps_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let key = ObjectKey::parse("fixed.txt").unwrap();

        let first = spool_bytes(&store, b"first").await;
        assert!(store.put(first, &key).await.unwrap().created);
        let second = spool_bytes(&store, b"second").await;
        let outcome = store.put(second, &key).await.unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.size, 5);

        let handle = store.get(&key).await.unwrap();
        assert_eq!(read_all(handle).await, b"first");
        assert_eq!(visible_files(dir.path()), vec!["fixed.txt"]);
    }

    #[tokio::test]
    async fn concurrent_puts_for_same_key_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BlobStore::open(dir.path()).unwrap());
        let key = ObjectKey::parse("race.bin").unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let spooled = spool_bytes(&store, b"racing content").await;
            let store = Arc::clone(&store);
            let key = key.clone();
            tasks.push(tokio::spawn(async move { store.put(spooled, &key).await }));
        }

        let mut created = 0;
        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            assert_eq!(outcome.key, key);
            if outcome.created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(visible_files(dir.path()), vec!["race.bin"]);
    }

    #[tokio::test]
    async fn get_unknown_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let key = ObjectKey::parse("deadbeef.png").unwrap();
        assert!(!store.contains(&key).await.unwrap());
        assert!(matches!(
            store.get(&key).await.unwrap_err(),
            StoreError::NotFound(k) if k == "deadbeef.png"
        ));
    }

    #[tokio::test]
    async fn get_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let key = ObjectKey::parse("subdir").unwrap();
        assert!(matches!(
            store.get(&key).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn range_reader_returns_slice() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let outcome = upload(&store, &data, "blob").await;

        let handle = store.get(&outcome.key).await.unwrap();
        assert_eq!(handle.content_type(), DEFAULT_CONTENT_TYPE);
        let mut slice = Vec::new();
        handle
            .into_range(1000, 500)
            .await
            .unwrap()
            .read_to_end(&mut slice)
            .await
            .unwrap();
        assert_eq!(slice, &data[1000..1500]);
    }

    #[tokio::test]
    async fn published_spool_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        upload(&store, b"one", "1.txt").await;
        upload(&store, b"one", "1.txt").await;
        upload(&store, b"two", "2.txt").await;
        let names = visible_files(dir.path());
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.starts_with('.')));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn published_objects_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let outcome = upload(&store, b"perm", "p.txt").await;
        let mode = std::fs::metadata(&outcome.location).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    // -----------------------------------------------------------------------
    // Content types
    // -----------------------------------------------------------------------

    #[test]
    fn content_type_from_extension() {
        let ct = |raw: &str| content_type_for(&ObjectKey::parse(raw).unwrap());
        assert_eq!(ct("a.txt"), "text/plain");
        assert_eq!(ct("a.png"), "image/png");
        assert_eq!(ct("a.json"), "application/json");
        assert_eq!(ct("a.JPG"), "image/jpeg");
        assert_eq!(ct("a"), DEFAULT_CONTENT_TYPE);
        assert_eq!(ct("a.zzzunknown"), DEFAULT_CONTENT_TYPE);
    }
}
