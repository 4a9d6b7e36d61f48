//! The built-in policy bundle.

use super::archive::unpack;
use super::stage::Staging;
use super::{FetcherHandle, ResourceClient, ensure_not_cancelled, fetch_cancellable};
use crate::error::{ErrorKind, Result};
use crate::metadata::{MetadataFile, ResourceKind, ResourceMetadata};
use async_trait::async_trait;
use exn::ResultExt;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;

/// Directory the bundle is unpacked into, below the policy directory.
pub const CONTENT_DIR: &str = "content";
pub const MANIFEST_FILE: &str = ".manifest";

/// Bundle manifest. Only the fields needed to enumerate the bundle are read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub revision: String,
    /// Top-level paths the bundle owns. Absent or empty means the whole
    /// bundle is a single root.
    #[serde(default)]
    pub roots: Vec<String>,
}
impl Manifest {
    async fn read(content: &Path) -> Result<Self> {
        let path = content.join(MANIFEST_FILE);
        let bytes = tokio::fs::read(&path).await.or_raise(|| ErrorKind::Io(path.clone()))?;
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidData(format!("malformed {}", path.display())))
    }

    /// Directories of the bundle roots below `content`.
    pub fn root_paths(&self, content: &Path) -> Result<Vec<PathBuf>> {
        let roots: Vec<&str> = self.roots.iter().map(String::as_str).filter(|root| !root.is_empty()).collect();
        if roots.is_empty() {
            return Ok(vec![content.to_path_buf()]);
        }
        roots
            .into_iter()
            .map(|root| {
                let relative = Path::new(root);
                if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
                    exn::bail!(ErrorKind::InvalidData(format!("bundle root {root:?} escapes the bundle")));
                }
                Ok(content.join(relative))
            })
            .collect()
    }
}

/// Client for the policy bundle, kept in `<cache>/policy`.
///
/// Bundles carry no publisher metadata: a download is considered fresh for a
/// day, and the recorded digest is that of the whole archive.
pub struct PolicyClient {
    root: PathBuf,
    url: String,
    fetcher: FetcherHandle,
}

impl PolicyClient {
    /// Metadata layout version of the bundle.
    pub const BUNDLE_VERSION: u32 = 0;
    pub const DIR: &'static str = "policy";
    pub const UPDATE_INTERVAL: Duration = Duration::DAY;

    pub fn new(cache_dir: impl AsRef<Path>, url: impl Into<String>, fetcher: FetcherHandle) -> Self {
        Self {
            root: cache_dir.as_ref().join(Self::DIR),
            url: url.into(),
            fetcher,
        }
    }

    fn content_dir(&self) -> PathBuf {
        self.root.join(CONTENT_DIR)
    }
}

#[async_trait]
impl ResourceClient for PolicyClient {
    type Loaded = Vec<PathBuf>;

    fn kind(&self) -> ResourceKind {
        ResourceKind::PolicyBundle
    }

    fn root(&self) -> &Path {
        &self.root
    }

    #[tracing::instrument(skip_all, fields(url = %self.url))]
    async fn download(&self, cancel: &CancellationToken) -> Result<()> {
        tracing::info!("Downloading the built-in policies");
        let archive = fetch_cancellable(self.fetcher.as_ref(), &self.url, cancel).await?;
        let digest = blake3::hash(&archive).to_hex().to_string();

        let staging = Staging::new(&self.root)?;
        let content = staging.path().join(CONTENT_DIR);
        tokio::task::spawn_blocking({
            let content = content.clone();
            move || -> Result<()> {
                std::fs::create_dir_all(&content).or_raise(|| ErrorKind::Io(content.clone()))?;
                unpack(&archive, &content)
            }
        })
        .await
        .or_raise(|| ErrorKind::Io(self.root.clone()))??;
        let manifest = Manifest::read(&content).await?;
        // Reject bundles that could never be loaded before they replace a good one.
        manifest.root_paths(&content)?;

        let now = OffsetDateTime::now_utc();
        let metadata = ResourceMetadata {
            version: Self::BUNDLE_VERSION,
            updated_at: now,
            next_update: now + Self::UPDATE_INTERVAL,
            downloaded_at: now,
            digest: Some(digest),
        };
        MetadataFile::in_dir(staging.path()).store(&metadata).await?;

        ensure_not_cancelled(cancel)?;
        staging.commit().await?;
        tracing::info!(revision = %manifest.revision, "Built-in policies updated");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<PathBuf>> {
        let content = self.content_dir();
        let manifest = Manifest::read(&content).await?;
        let paths = manifest.root_paths(&content)?;
        tracing::debug!(revision = %manifest.revision, roots = paths.len(), "Loaded built-in policies");
        Ok(paths)
    }

    /// Without updates, no policies at all is acceptable.
    fn fallback(&self) -> Option<Vec<PathBuf>> {
        Some(Vec::new())
    }
}
