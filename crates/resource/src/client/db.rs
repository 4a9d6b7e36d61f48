//! The vulnerability database.

use super::archive::{digest_file, unpack};
use super::stage::Staging;
use super::{FetcherHandle, ResourceClient, ensure_not_cancelled, fetch_cancellable};
use crate::error::{ErrorKind, Result};
use crate::metadata::{MetadataFile, ResourceKind, ResourceMetadata};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;

/// Database file inside the database directory (and the archive).
pub const DB_FILE: &str = "vigil.db";

/// A verified local copy of the vulnerability database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub path: PathBuf,
    pub metadata: ResourceMetadata,
    pub size: u64,
}

/// Client for the vulnerability database, kept in `<cache>/db`.
///
/// The published archive is a `.tar.gz` holding [`DB_FILE`] and the
/// publisher's `metadata.json`; the download records when it landed and the
/// BLAKE3 digest of the database, which [`load()`](ResourceClient::load)
/// checks again.
pub struct DbClient {
    root: PathBuf,
    url: String,
    fetcher: FetcherHandle,
}

impl DbClient {
    /// Schema version this build of vigil reads.
    pub const SCHEMA_VERSION: u32 = 2;
    pub const DIR: &'static str = "db";

    pub fn new(cache_dir: impl AsRef<Path>, url: impl Into<String>, fetcher: FetcherHandle) -> Self {
        Self {
            root: cache_dir.as_ref().join(Self::DIR),
            url: url.into(),
            fetcher,
        }
    }
}

#[async_trait]
impl ResourceClient for DbClient {
    type Loaded = Database;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    fn root(&self) -> &Path {
        &self.root
    }

    /// The publisher rebuilds the database every few hours; fetching it more
    /// than once an hour is pointless.
    fn min_interval(&self) -> Duration {
        Duration::HOUR
    }

    #[tracing::instrument(skip_all, fields(url = %self.url))]
    async fn download(&self, cancel: &CancellationToken) -> Result<()> {
        tracing::info!("Downloading vulnerability database");
        let archive = fetch_cancellable(self.fetcher.as_ref(), &self.url, cancel).await?;

        let staging = Staging::new(&self.root)?;
        let staged = staging.path().to_path_buf();
        let digest = tokio::task::spawn_blocking(move || -> Result<String> {
            unpack(&archive, &staged)?;
            let db = staged.join(DB_FILE);
            if !db.is_file() {
                exn::bail!(ErrorKind::InvalidData(format!("archive has no {DB_FILE}")));
            }
            digest_file(&db)
        })
        .await
        .or_raise(|| ErrorKind::Io(self.root.clone()))??;

        let file = MetadataFile::in_dir(staging.path());
        let mut metadata = file
            .load()
            .await?
            .ok_or_raise(|| ErrorKind::InvalidData("archive has no metadata.json".to_string()))?;
        metadata.downloaded_at = OffsetDateTime::now_utc();
        metadata.digest = Some(digest);
        file.store(&metadata).await?;

        ensure_not_cancelled(cancel)?;
        staging.commit().await?;
        tracing::info!(version = metadata.version, updated_at = %metadata.updated_at, "Vulnerability database updated");
        Ok(())
    }

    async fn load(&self) -> Result<Database> {
        let metadata = MetadataFile::in_dir(&self.root)
            .load()
            .await?
            .ok_or_raise(|| ErrorKind::InvalidData("no database metadata".to_string()))?;
        let path = self.root.join(DB_FILE);
        let digest = tokio::task::spawn_blocking({
            let path = path.clone();
            move || digest_file(&path)
        })
        .await
        .or_raise(|| ErrorKind::Io(path.clone()))??;
        if metadata.digest.as_deref() != Some(digest.as_str()) {
            exn::bail!(ErrorKind::InvalidData(format!("{} does not match its recorded digest", path.display())));
        }
        let size = tokio::fs::metadata(&path).await.or_raise(|| ErrorKind::Io(path.clone()))?.len();
        Ok(Database { path, metadata, size })
    }
}
