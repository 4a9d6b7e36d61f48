//! Artifact cache trait and implementations.
//!
//! This module defines the `ArtifactCache` trait, which provides a unified
//! interface for cache operations across different backends (local filesystem,
//! Redis-compatible servers, etc.).
//!

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod redis;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
pub use self::redis::RedisBackend;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::pin::Pin;

pub type KeyStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// The two keyspaces of the artifact cache.
///
/// An artifact (an image, a filesystem, a repository) references the blobs
/// (layers) it was assembled from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bucket {
    Artifact,
    Blob,
}
impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Artifact, Bucket::Blob];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Artifact => "artifact",
            Bucket::Blob => "blob",
        }
    }
}
impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Result of [`ArtifactCache::missing_blobs()`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Missing {
    /// The artifact entry itself is absent.
    pub artifact: bool,
    /// Blob keys (in request order) that have no entry.
    pub blobs: Vec<String>,
}

/// Unified interface for artifact cache backends.
///
/// Entries are opaque byte blobs; their serialization belongs to whoever
/// produces them. Keys are validated with [`validate_key`](crate::validate_key)
/// by every implementation.
///
/// # Examples
///
/// ```
/// use vigil_cache::{backend::{ArtifactCache, Bucket}, error::Result};
///
/// async fn cached_or_empty(cache: &dyn ArtifactCache, key: &str) -> Result<Vec<u8>> {
///     if cache.exists(Bucket::Blob, key).await? {
///         cache.get(Bucket::Blob, key).await
///     } else {
///         Ok(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    /// Human readable description of the backend (used for logging only).
    fn name(&self) -> &str;

    /// Store an entry, replacing any previous value under the same key.
    async fn put(&self, bucket: Bucket, key: &str, data: &[u8]) -> Result<()>;

    /// Fetch an entry.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if there is no
    /// entry under `key`.
    async fn get(&self, bucket: Bucket, key: &str) -> Result<Vec<u8>>;

    /// Check if an entry exists.
    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool>;

    /// Delete an entry. Deleting an absent entry is not an error.
    async fn delete(&self, bucket: Bucket, key: &str) -> Result<()>;

    /// Stream the keys stored in a bucket, in no particular order.
    fn list_stream<'a>(&'a self, bucket: Bucket) -> KeyStream<'a>;

    /// Collect [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, bucket: Bucket) -> Result<Vec<String>> {
        self.list_stream(bucket).try_collect().await
    }

    /// Determine which of an artifact's blobs still have to be produced.
    ///
    /// Default implementation issues one [`exists()`](Self::exists) per key.
    async fn missing_blobs(&self, artifact: &str, blobs: &[String]) -> Result<Missing> {
        let mut missing = Missing {
            artifact: !self.exists(Bucket::Artifact, artifact).await?,
            blobs: Vec::new(),
        };
        for blob in blobs {
            if !self.exists(Bucket::Blob, blob).await? {
                missing.blobs.push(blob.clone());
            }
        }
        Ok(missing)
    }

    /// Remove every entry from every bucket.
    async fn clear(&self) -> Result<()>;
}
