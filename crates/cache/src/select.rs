//! Backend selection: one configuration in, one cache handle out.

use crate::backend::{ArtifactCache, LocalBackend, RedisBackend};
use crate::config::{ARTIFACTS_DIR, CacheConfig, FILESYSTEM};
use crate::error::{ErrorKind, Result};
use crate::tls::{self, TlsMaterial, TlsSettings};
use crate::CacheHandle;
use std::path::Path;
use std::sync::Arc;

/// Parsed form of [`CacheConfig::backend`].
///
/// A value without a `scheme://` prefix is a local directory; [`FILESYSTEM`]
/// or an empty value stands for the configured cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    Filesystem(Option<&'a Path>),
    Redis(&'a str),
}
impl<'a> Locator<'a> {
    pub fn parse(backend: &'a str) -> Result<Self> {
        let backend = backend.trim();
        if backend.is_empty() || backend == FILESYSTEM {
            return Ok(Self::Filesystem(None));
        }
        match backend.split_once("://") {
            Some(("redis" | "rediss", _)) => Ok(Self::Redis(backend)),
            Some(_) => exn::bail!(ErrorKind::Configuration(format!("unsupported cache backend {backend:?}"))),
            None => Ok(Self::Filesystem(Some(Path::new(backend)))),
        }
    }
}

/// Build the cache backend described by `config`.
///
/// TLS material is validated for every backend; it is only read and turned
/// into a TLS configuration when a Redis backend is selected.
pub fn backend(config: &CacheConfig) -> Result<CacheHandle> {
    select_with(config, tls::load)
}

fn select_with<F>(config: &CacheConfig, build_tls: F) -> Result<CacheHandle>
where
    F: FnOnce(&TlsMaterial) -> Result<TlsSettings>,
{
    let material = config.tls.resolve()?;
    match Locator::parse(&config.backend)? {
        Locator::Redis(url) => {
            let tls = material.as_ref().map(build_tls).transpose()?;
            if tls.is_some() {
                // The Redis client builds its own connector from the default
                // process-wide provider.
                let _ = rustls::crypto::ring::default_provider().install_default();
            }
            let backend = RedisBackend::new(url, tls.as_ref(), config.ttl())?;
            tracing::info!(backend = backend.name(), tls = tls.is_some(), "Using Redis cache backend");
            Ok(Arc::new(backend))
        },
        Locator::Filesystem(dir) => {
            if material.is_some() {
                tracing::warn!("TLS material only applies to the Redis cache backend, ignoring");
            }
            let root = dir.map_or_else(|| config.cache_dir(), Path::to_path_buf).join(ARTIFACTS_DIR);
            let backend = LocalBackend::new(&root)?;
            tracing::info!(root = %root.display(), "Using standalone cache backend");
            Ok(Arc::new(backend))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TlsPaths;
    use rstest::rstest;
    use std::path::PathBuf;

    fn never_build_tls(_: &TlsMaterial) -> Result<TlsSettings> {
        panic!("TLS configuration built without TLS material");
    }

    fn full_tls() -> TlsPaths {
        TlsPaths {
            ca_cert: Some(PathBuf::from("/etc/vigil/ca.pem")),
            cert: Some(PathBuf::from("/etc/vigil/cert.pem")),
            key: Some(PathBuf::from("/etc/vigil/key.pem")),
        }
    }

    #[rstest]
    #[case("fs", Locator::Filesystem(None))]
    #[case("", Locator::Filesystem(None))]
    #[case("/var/cache/vigil", Locator::Filesystem(Some(Path::new("/var/cache/vigil"))))]
    #[case(" /srv/vigil ", Locator::Filesystem(Some(Path::new("/srv/vigil"))))]
    #[case("redis://localhost:6379", Locator::Redis("redis://localhost:6379"))]
    #[case("rediss://cache.internal:6380/1", Locator::Redis("rediss://cache.internal:6380/1"))]
    fn test_locator_parse(#[case] backend: &str, #[case] expected: Locator) {
        assert_eq!(Locator::parse(backend).unwrap(), expected);
    }

    #[rstest]
    #[case("memcached://localhost:11211")]
    #[case("http://cache.internal:6379")]
    fn test_locator_rejects_unknown_scheme(#[case] backend: &str) {
        let err = Locator::parse(backend).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }

    #[test]
    fn test_filesystem_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let backend = select_with(&config, never_build_tls).unwrap();
        assert!(backend.name().starts_with("fs:"));
        assert!(temp_dir.path().join("artifacts").is_dir());
    }

    #[test]
    fn test_filesystem_backend_at_locator_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = temp_dir.path().join("store");
        let config = CacheConfig {
            backend: store.display().to_string(),
            dir: Some(temp_dir.path().join("metadata")),
            ..Default::default()
        };
        let backend = select_with(&config, never_build_tls).unwrap();
        assert_eq!(backend.name(), format!("fs:{}", store.join("artifacts").display()));
        assert!(store.join("artifacts").is_dir());
        assert!(!temp_dir.path().join("metadata").exists());
    }

    #[test]
    fn test_filesystem_backend_relative_locator() {
        let config = CacheConfig {
            backend: "relative/cache".to_string(),
            ..Default::default()
        };
        let err = select_with(&config, never_build_tls).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Storage(_)));
    }

    #[test]
    fn test_filesystem_backend_ignores_tls() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            dir: Some(temp_dir.path().to_path_buf()),
            tls: full_tls(),
            ..Default::default()
        };
        select_with(&config, never_build_tls).unwrap();
    }

    #[test]
    fn test_filesystem_backend_unwritable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"data").unwrap();
        let config = CacheConfig {
            dir: Some(file),
            ..Default::default()
        };
        let err = select_with(&config, never_build_tls).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Storage(_)));
    }

    #[rstest]
    #[case("redis://localhost:6379")]
    #[case("rediss://cache.internal:6380/0")]
    #[case("redis://:password@localhost:6379/2")]
    fn test_redis_without_tls_never_builds_tls(#[case] url: &str) {
        let config = CacheConfig {
            backend: url.to_string(),
            ..Default::default()
        };
        let backend = select_with(&config, never_build_tls).unwrap();
        assert!(backend.name().starts_with("redis:"));
        assert!(!backend.name().contains("password"));
    }

    #[test]
    fn test_redis_malformed_url() {
        let config = CacheConfig {
            backend: "redis://[::1".to_string(),
            ..Default::default()
        };
        let err = select_with(&config, never_build_tls).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }

    #[rstest]
    #[case(true, false, false)]
    #[case(false, true, true)]
    #[case(true, true, false)]
    fn test_partial_tls_is_rejected(#[case] ca: bool, #[case] cert: bool, #[case] key: bool, #[values("fs", "redis://localhost:6379")] backend: &str) {
        let full = full_tls();
        let config = CacheConfig {
            backend: backend.to_string(),
            tls: TlsPaths {
                ca_cert: full.ca_cert.filter(|_| ca),
                cert: full.cert.filter(|_| cert),
                key: full.key.filter(|_| key),
            },
            ..Default::default()
        };
        let err = select_with(&config, never_build_tls).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }

    #[test]
    fn test_redis_tls_failure_is_propagated() {
        let config = CacheConfig {
            backend: "redis://localhost:6379".to_string(),
            tls: full_tls(),
            ..Default::default()
        };
        let mut calls = 0;
        let err = select_with(&config, |material| {
            calls += 1;
            assert_eq!(material.ca_cert, PathBuf::from("/etc/vigil/ca.pem"));
            exn::bail!(ErrorKind::Configuration("unreadable CA".to_string()))
        })
        .err()
        .unwrap();
        assert_eq!(calls, 1);
        assert!(matches!(&*err, ErrorKind::Configuration(_)));
    }

    #[test]
    fn test_redis_tls_real_loader_reports_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            backend: "redis://localhost:6379".to_string(),
            tls: TlsPaths {
                ca_cert: Some(temp_dir.path().join("ca.pem")),
                cert: Some(temp_dir.path().join("cert.pem")),
                key: Some(temp_dir.path().join("key.pem")),
            },
            ..Default::default()
        };
        let err = backend(&config).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Configuration(msg) if msg.contains("ca.pem")));
    }
}
