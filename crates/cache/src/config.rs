//! Cache configuration, as read once at startup.

use crate::tls::TlsPaths;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Locator selecting the filesystem backend.
pub const FILESYSTEM: &str = "fs";
/// Name of the blob store directory below the cache directory.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Where cached artifacts live and how to reach them.
///
/// `backend` is a `redis://`/`rediss://` URL, a local directory for the blob
/// store, or [`FILESYSTEM`] for the blob store below `dir`. TLS
/// paths only apply to the Redis backend; they must be given all together or
/// not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: String,
    pub dir: Option<PathBuf>,
    pub tls: TlsPaths,
    /// Lifetime of Redis entries, in seconds. Entries never expire if unset.
    pub ttl: Option<u64>,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: FILESYSTEM.to_string(),
            dir: None,
            tls: TlsPaths::default(),
            ttl: None,
        }
    }
}
impl CacheConfig {
    /// The local cache directory: metadata root and home of the filesystem
    /// blob store.
    pub fn cache_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl.filter(|ttl| *ttl > 0).map(Duration::from_secs)
    }
}

/// Platform user cache directory for vigil (`~/.cache/vigil` on Linux),
/// or a directory below the system temp dir when there is no home directory.
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "vigil")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("vigil"))
}
