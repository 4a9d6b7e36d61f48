//! Local filesystem cache backend.
//!
//! Each bucket is a directory below the configured root, each entry a file
//! named after its key. Access goes through `tokio::fs` for async I/O.

use crate::backend::{ArtifactCache, Bucket, KeyStream};
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;

/// Local filesystem cache backend ("standalone" mode).
///
/// # Examples
///
/// ```no_run
/// use vigil_cache::backend::LocalBackend;
///
/// let backend = LocalBackend::new("/var/cache/vigil/artifacts").unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// Root directory of the blob store
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns [`Storage`](ErrorKind::Storage) if the path is not absolute,
    /// is not a directory, cannot be created, or is not writable.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::Storage(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::Storage(root));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).or_raise(|| ErrorKind::Storage(root.clone()))?;
        }
        // Probe: a read-only directory would otherwise only fail on the first put.
        NamedTempFile::new_in(&root).or_raise(|| ErrorKind::Storage(root.clone()))?;
        let name = format!("fs:{}", root.display());
        Ok(Self { name, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: Bucket) -> PathBuf {
        self.root.join(bucket.as_str())
    }

    fn entry_path(&self, bucket: Bucket, key: &str) -> Result<PathBuf> {
        Ok(self.bucket_dir(bucket).join(validate_key(key)?))
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl ArtifactCache for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, bucket: Bucket, key: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(bucket, key)?;
        let dir = self.bucket_dir(bucket);
        let data = data.to_vec();
        // Write next to the destination then rename, so a reader never sees
        // a half-written entry.
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            sync_create_dir(&dir)?;
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .or_raise(|| ErrorKind::Backend("blocking write task failed".to_string()))?
        .map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn get(&self, bucket: Bucket, key: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(bucket, key)?;
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool> {
        let path = self.entry_path(bucket, key)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<()> {
        let path = self.entry_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(ErrorKind::Io(e).into()),
            _ => Ok(()),
        }
    }

    fn list_stream<'a>(&'a self, bucket: Bucket) -> KeyStream<'a> {
        let dir = self.bucket_dir(bucket);
        Box::pin(stream! {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // A bucket that was never written to is simply empty.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
                Err(e) => {
                    yield Err(exn::Exn::from(ErrorKind::Io(e)));
                    return;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => { yield Err(exn::Exn::from(ErrorKind::Io(e))); continue; },
                };
                // Skip in-flight temp files and anything that isn't a valid key.
                let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
                if name.starts_with(".tmp") || validate_key(&name).is_err() {
                    continue;
                }
                match entry.file_type().await {
                    Ok(t) if t.is_file() => yield Ok(name),
                    Ok(_) => {},
                    Err(e) => yield Err(exn::Exn::from(ErrorKind::Io(e))),
                }
            }
        })
    }

    async fn clear(&self) -> Result<()> {
        tracing::debug!(root = %self.root.display(), "Truncating local blob store");
        match fs::remove_dir_all(&self.root).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                return Err(e).or_raise(|| ErrorKind::Storage(self.root.clone()));
            },
            _ => {},
        }
        fs::create_dir_all(&self.root).await.or_raise(|| ErrorKind::Storage(self.root.clone()))
    }
}
