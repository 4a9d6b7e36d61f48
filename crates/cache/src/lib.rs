//! Artifact cache for vigil.
//!
//! A [`Cache`] wraps one of two interchangeable backends behind the
//! [`ArtifactCache`](backend::ArtifactCache) trait:
//!
//! - the filesystem ("standalone") backend, a directory of files below the
//!   local cache directory;
//! - a Redis-compatible server, optionally over TLS with client certificate
//!   authentication.
//!
//! The backend is chosen once from a [`CacheConfig`] by [`select::backend()`]
//! and held for the lifetime of the process.
//!
//! ```no_run
//! use vigil_cache::{Cache, CacheConfig, backend::Bucket};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache = Cache::from_config(&CacheConfig::default()).unwrap();
//! cache.put(Bucket::Blob, "sha256:9f86d081", b"{}").await.unwrap();
//! cache.reset().await.unwrap();
//! # }
//! ```

pub mod backend;
mod cache;
mod config;
pub mod error;
mod key;
pub mod metadata;
pub mod select;
pub mod tls;

pub use crate::backend::ArtifactCache;
pub use crate::cache::Cache;
pub use crate::config::{ARTIFACTS_DIR, CacheConfig, FILESYSTEM, default_cache_dir};
pub use crate::key::validate as validate_key;
pub use crate::metadata::{LocalMetadataRoot, MetadataRoot};
pub use crate::tls::{TlsMaterial, TlsPaths};
use std::sync::Arc;

pub type CacheHandle = Arc<dyn ArtifactCache>;
pub type MetadataHandle = Arc<dyn MetadataRoot>;
