//! The local metadata root: everything vigil keeps on disk besides the blob
//! store (resource databases, policy bundles and their metadata files).

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A directory tree that can be removed as a whole.
#[async_trait]
pub trait MetadataRoot: Send + Sync {
    fn path(&self) -> &Path;

    /// Recursively remove the root. A root that does not exist is already
    /// removed.
    async fn remove(&self) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct LocalMetadataRoot {
    path: PathBuf,
}
impl LocalMetadataRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetadataRoot for LocalMetadataRoot {
    fn path(&self) -> &Path {
        &self.path
    }

    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                tracing::debug!("Metadata root removed");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).or_raise(|| ErrorKind::Storage(self.path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_recursively() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("cache");
        std::fs::create_dir_all(root.join("db")).unwrap();
        std::fs::write(root.join("db/metadata.json"), b"{}").unwrap();
        let metadata = LocalMetadataRoot::new(&root);
        metadata.remove().await.unwrap();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let metadata = LocalMetadataRoot::new(temp_dir.path().join("never-created"));
        metadata.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_file_is_storage_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, b"data").unwrap();
        let err = LocalMetadataRoot::new(&file).remove().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Storage(path) if *path == file));
    }
}
