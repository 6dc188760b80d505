use std::io;
use std::path::Path;

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{StoreError, StoreResult};
use crate::hasher::{ContentHasher, Digest, HashAlgorithm};

/// Filename prefix of in-flight uploads inside the storage root.
///
/// Keys can never start with `.`, so these files are unreachable through
/// [`BlobStore::get`](crate::BlobStore::get).
pub const SPOOL_PREFIX: &str = ".nptr-upload-";

/// Writes an incoming upload to a hidden temporary file while hashing it.
///
/// The temporary file lives in the storage root so that publishing it is a
/// same-filesystem rename. Dropping a `Spooler` (or the [`Spooled`] it
/// produces) without publishing removes the file.
pub struct Spooler {
    file: File,
    path: TempPath,
    hasher: ContentHasher,
    written: u64,
    limit: u64,
}

impl Spooler {
    pub(crate) async fn create(
        root: &Path,
        algorithm: HashAlgorithm,
        limit: u64,
    ) -> StoreResult<Self> {
        let root = root.to_path_buf();
        let named = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(SPOOL_PREFIX)
                .tempfile_in(root)
        })
        .await
        .map_err(io::Error::other)??;
        let (file, path) = named.into_parts();
        Ok(Self {
            file: File::from_std(file),
            path,
            hasher: ContentHasher::new(algorithm),
            written: 0,
            limit,
        })
    }

    /// Append a chunk of the upload.
    ///
    /// Fails with [`StoreError::TooLarge`] before writing anything once the
    /// total would exceed the limit.
    pub async fn write(&mut self, chunk: &[u8]) -> StoreResult<()> {
        let total = self.written + chunk.len() as u64;
        if total > self.limit {
            return Err(StoreError::TooLarge { limit: self.limit });
        }
        self.hasher.update(chunk);
        self.file.write_all(chunk).await?;
        self.written = total;
        Ok(())
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush the file to disk and freeze the digest.
    pub async fn finish(mut self) -> StoreResult<Spooled> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);
        Ok(Spooled {
            path: self.path,
            digest: self.hasher.finalize(),
            len: self.written,
        })
    }
}

impl std::fmt::Debug for Spooler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spooler")
            .field("path", &self.path.to_path_buf())
            .field("written", &self.written)
            .field("limit", &self.limit)
            .finish()
    }
}

/// A fully spooled upload whose digest is known.
pub struct Spooled {
    path: TempPath,
    digest: Digest,
    len: u64,
}

impl Spooled {
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn into_temp_path(self) -> TempPath {
        self.path
    }
}

impl std::fmt::Debug for Spooled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spooled")
            .field("path", &self.path.to_path_buf())
            .field("digest", &self.digest)
            .field("len", &self.len)
            .finish()
    }
}
