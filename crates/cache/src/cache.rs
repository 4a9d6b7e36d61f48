//! The cache facade.

use crate::backend::ArtifactCache;
use crate::config::CacheConfig;
use crate::error::{ErrorKind, Result};
use crate::metadata::LocalMetadataRoot;
use crate::{CacheHandle, MetadataHandle, select};
use exn::ResultExt;
use std::ops::Deref;
use std::sync::Arc;

/// The process-wide cache: one backend, chosen once, plus the local metadata
/// root.
///
/// Dereferences to the backend, so the whole [`ArtifactCache`] capability set
/// is available directly on a `Cache`. Construct it once at startup and pass
/// it (or a clone; clones share the same backend) to whatever needs it.
#[derive(Clone)]
pub struct Cache {
    backend: CacheHandle,
    metadata: MetadataHandle,
}

impl Cache {
    pub fn new(backend: CacheHandle, metadata: MetadataHandle) -> Self {
        Self { backend, metadata }
    }

    /// Select the backend for `config` and root the metadata store at the
    /// configured cache directory.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend = select::backend(config)?;
        let metadata = Arc::new(LocalMetadataRoot::new(config.cache_dir()));
        Ok(Self::new(backend, metadata))
    }

    pub fn backend(&self) -> &CacheHandle {
        &self.backend
    }

    pub fn metadata(&self) -> &MetadataHandle {
        &self.metadata
    }

    /// Remove the entire local metadata root.
    pub async fn clear_metadata(&self) -> Result<()> {
        tracing::info!(path = %self.metadata.path().display(), "Removing cache metadata");
        self.metadata.remove().await
    }

    /// Remove every cached artifact and blob from the backend.
    pub async fn clear_artifacts(&self) -> Result<()> {
        tracing::info!(backend = self.backend.name(), "Removing cached artifacts");
        self.backend.clear().await.or_raise(|| ErrorKind::Cache("clear"))
    }

    /// [`clear_metadata()`](Self::clear_metadata) then
    /// [`clear_artifacts()`](Self::clear_artifacts). Stops at the first error.
    pub async fn reset(&self) -> Result<()> {
        self.clear_metadata().await?;
        self.clear_artifacts().await
    }
}

impl Deref for Cache {
    type Target = dyn ArtifactCache;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}
