//! Resource clients: the per-resource half of an update cycle.
//!
//! The [`Updater`](crate::Updater) drives any [`ResourceClient`]; this module
//! provides the two vigil ships with, [`DbClient`] and [`PolicyClient`], and
//! the [`Fetcher`] they download through.

mod archive;
mod db;
mod fetch;
mod policy;
mod stage;
#[cfg(test)]
pub(crate) mod testing;

pub use self::db::{DB_FILE, Database, DbClient};
pub use self::fetch::{Fetcher, FetcherHandle, HttpFetcher};
pub use self::policy::{CONTENT_DIR, MANIFEST_FILE, Manifest, PolicyClient};
use crate::error::{ErrorKind, Result};
use crate::freshness;
use crate::metadata::{MetadataFile, ResourceKind};
use async_trait::async_trait;
use std::path::Path;
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;

/// Check, download and load operations for one kind of resource.
///
/// The resource lives in [`root()`](Self::root), next to its `metadata.json`.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// In-memory form of the loaded resource.
    type Loaded: Send;

    fn kind(&self) -> ResourceKind;

    fn root(&self) -> &Path;

    /// Copies younger than this are never re-downloaded, stale or not.
    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Whether a fresh copy has to be downloaded.
    ///
    /// With `skip` set the metadata is not even read.
    async fn needs_update(&self, required_version: u32, skip: bool) -> Result<bool> {
        if skip {
            return Ok(false);
        }
        let metadata = MetadataFile::in_dir(self.root()).load().await?;
        Ok(freshness::needs_update(
            metadata.as_ref(),
            required_version,
            skip,
            OffsetDateTime::now_utc(),
            self.min_interval(),
        ))
    }

    /// Download the resource and atomically replace the local copy and its
    /// metadata.
    ///
    /// Returns [`Cancelled`](ErrorKind::Cancelled) if `cancel` fires before the
    /// replacement is committed, leaving the previous copy untouched.
    async fn download(&self, cancel: &CancellationToken) -> Result<()>;

    /// Load the local copy.
    async fn load(&self) -> Result<Self::Loaded>;

    /// Result to hand out when loading fails but updates were skipped.
    /// `None` makes such a failure fatal.
    fn fallback(&self) -> Option<Self::Loaded> {
        None
    }
}

/// Race `fetch` against `cancel`.
pub(crate) async fn fetch_cancellable(fetcher: &dyn Fetcher, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
        archive = fetcher.fetch(url) => archive,
    }
}

/// Fail if `cancel` fired. Checked right before committing a download.
pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        exn::bail!(ErrorKind::Cancelled);
    }
    Ok(())
}
