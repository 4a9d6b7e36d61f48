//! Resource metadata and the `metadata.json` file it is persisted in.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;

pub const METADATA_FILE: &str = "metadata.json";

/// The managed resources vigil keeps up to date.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    #[display("vulnerability database")]
    Database,
    #[display("policy bundle")]
    PolicyBundle,
}

/// Version and timestamps of a local resource copy.
///
/// Created by the first successful download, replaced by every later one, and
/// otherwise only ever read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceMetadata {
    /// Schema or content version of the resource.
    pub version: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub next_update: OffsetDateTime,
    /// Set locally when the download lands; publishers leave it out.
    #[serde(with = "time::serde::rfc3339", default = "never")]
    pub downloaded_at: OffsetDateTime,
    /// BLAKE3 digest of the downloaded payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

fn never() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// `metadata.json` inside a resource directory.
#[derive(Debug, Clone)]
pub struct MetadataFile {
    path: PathBuf,
}
impl MetadataFile {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(METADATA_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the metadata.
    ///
    /// A missing file is `Ok(None)`: the resource was never downloaded. A file
    /// that exists but cannot be read or parsed is an error.
    pub async fn load(&self) -> Result<Option<ResourceMetadata>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(self.path.clone())),
        };
        let metadata = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Metadata(self.path.clone()))?;
        Ok(Some(metadata))
    }

    pub async fn store(&self, metadata: &ResourceMetadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata).or_raise(|| ErrorKind::Metadata(self.path.clone()))?;
        fs::write(&self.path, json).await.or_raise(|| ErrorKind::Io(self.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> ResourceMetadata {
        ResourceMetadata {
            version: 2,
            updated_at: datetime!(2026-10-18 06:00 UTC),
            next_update: datetime!(2026-10-19 06:00 UTC),
            downloaded_at: datetime!(2026-10-18 07:12:30 UTC),
            digest: Some("af1349b9f5f9a1a6a0404dea36dcc949".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(MetadataFile::in_dir(temp_dir.path()).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = MetadataFile::in_dir(temp_dir.path());
        file.store(&sample()).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_publisher_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = MetadataFile::in_dir(temp_dir.path());
        std::fs::write(
            file.path(),
            r#"{"Version":2,"UpdatedAt":"2026-10-18T06:00:00Z","NextUpdate":"2026-10-19T06:00:00Z"}"#,
        )
        .unwrap();
        let metadata = file.load().await.unwrap().unwrap();
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.downloaded_at, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(metadata.digest, None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = MetadataFile::in_dir(temp_dir.path());
        std::fs::write(file.path(), b"{\"Version\":").unwrap();
        let err = file.load().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Metadata(_)));
    }
}
