//! In-memory cache backend for testing.

use super::{ArtifactCache, Bucket, KeyStream};
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory cache backend for testing.
///
/// Entries are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Counts calls to
/// [`clear()`](ArtifactCache::clear) and can be told to fail them, which is
/// what facade tests need to observe.
///
/// # Examples
///
/// ```
/// use vigil_cache::backend::{ArtifactCache, Bucket, MockBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let backend = MockBackend::with_entries([(Bucket::Blob, "sha256:1", b"{}")]);
/// assert!(backend.exists(Bucket::Blob, "sha256:1").await.unwrap());
/// # }
/// ```
#[derive(Default)]
pub struct MockBackend {
    storage: RwLock<HashMap<(Bucket, String), Vec<u8>>>,
    clear_calls: AtomicUsize,
    fail_clear: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with entries.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_entries(
        entries: impl IntoIterator<Item = (Bucket, impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let mut map = HashMap::new();
        for (bucket, key, data) in entries {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                panic!("MockBackend::with_entries: invalid key {key:?}");
            };
            map.insert((bucket, validated), data.into());
        }
        Self {
            storage: RwLock::new(map),
            ..Default::default()
        }
    }

    /// Make every subsequent [`clear()`](ArtifactCache::clear) fail.
    pub fn failing_clear(self) -> Self {
        self.fail_clear.store(true, Ordering::SeqCst);
        self
    }

    /// Number of times [`clear()`](ArtifactCache::clear) has been invoked.
    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactCache for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn put(&self, bucket: Bucket, key: &str, data: &[u8]) -> Result<()> {
        let key = validate_key(key)?;
        self.storage.write().await.insert((bucket, key), data.to_vec());
        Ok(())
    }

    async fn get(&self, bucket: Bucket, key: &str) -> Result<Vec<u8>> {
        let key = validate_key(key)?;
        self.storage
            .read()
            .await
            .get(&(bucket, key.clone()))
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key)))
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        Ok(self.storage.read().await.contains_key(&(bucket, key)))
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<()> {
        let key = validate_key(key)?;
        self.storage.write().await.remove(&(bucket, key));
        Ok(())
    }

    fn list_stream<'a>(&'a self, bucket: Bucket) -> KeyStream<'a> {
        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding to
            // avoid holding the lock across yield points.
            let keys: Vec<String> = {
                let guard = self.storage.read().await;
                guard.keys().filter(|(b, _)| *b == bucket).map(|(_, k)| k.clone()).collect()
            };
            for key in keys {
                yield Ok(key);
            }
        })
    }

    async fn clear(&self) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Backend("mock clear failure".to_string()));
        }
        self.storage.write().await.clear();
        Ok(())
    }
}
