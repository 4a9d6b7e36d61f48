//! Layered configuration for vigil.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. built-in defaults,
//! 2. an optional configuration file (TOML, YAML or JSON, by extension),
//! 3. `VIGIL_` environment variables, with `__` separating nested keys
//!    (`VIGIL_CACHE__BACKEND=redis://localhost:6379`).
//!
//! Command line flags are applied by the binary on top of the result.

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
pub use vigil_cache::CacheConfig;

pub const ENV_PREFIX: &str = "VIGIL_";
pub const DEFAULT_DB_REPOSITORY: &str = "https://downloads.vigil.dev/db/v2/vigil-db.tar.gz";
pub const DEFAULT_POLICY_BUNDLE: &str = "https://downloads.vigil.dev/policy/v0/bundle.tar.gz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub db: DbConfig,
    pub policy: PolicyConfig,
    /// Download timeout, in seconds.
    pub timeout: u64,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            db: DbConfig::default(),
            policy: PolicyConfig::default(),
            timeout: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// URL of the database archive.
    pub repository: String,
    pub skip_update: bool,
}
impl Default for DbConfig {
    fn default() -> Self {
        Self {
            repository: DEFAULT_DB_REPOSITORY.to_string(),
            skip_update: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// URL of the policy bundle archive.
    pub bundle: String,
    pub skip_update: bool,
}
impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            bundle: DEFAULT_POLICY_BUNDLE.to_string(),
            skip_update: false,
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            exn::bail!(ErrorKind::Invalid("timeout must be at least one second".to_string()));
        }
        if self.db.repository.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("db.repository is empty".to_string()));
        }
        if self.policy.bundle.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("policy.bundle is empty".to_string()));
        }
        vigil_cache::select::Locator::parse(&self.cache.backend)
            .or_raise(|| ErrorKind::Invalid("cache.backend".to_string()))?;
        self.cache.tls.resolve().or_raise(|| ErrorKind::Invalid("cache.tls".to_string()))?;
        Ok(())
    }
}

/// Defaults, then the file at `path` (if any), then the environment.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Extract and validate a [`Config`].
pub fn from_figment(figment: &Figment) -> Result<Config> {
    let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration. An explicitly given file must exist.
pub fn load(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.is_file() {
            exn::bail!(ErrorKind::Invalid(format!("configuration file {} does not exist", path.display())));
        }
        tracing::debug!(path = %path.display(), "Loading configuration file");
    }
    from_figment(&figment(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    /// Tests reading the environment run jailed, so they never observe the
    /// variables another test sets.
    fn jailed(test: impl FnOnce()) {
        figment::Jail::expect_with(|_| {
            test();
            Ok(())
        });
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = from_figment(&Figment::from(Serialized::defaults(Config::default()))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache.backend, "fs");
        assert_eq!(config.timeout(), Duration::from_secs(300));
    }

    #[rstest]
    #[case("vigil.toml", "timeout = 60\n[cache]\nbackend = \"redis://localhost:6379\"\n[db]\nskip_update = true\n")]
    #[case("vigil.yaml", "timeout: 60\ncache:\n  backend: redis://localhost:6379\ndb:\n  skip_update: true\n")]
    #[case("vigil.json", r#"{"timeout": 60, "cache": {"backend": "redis://localhost:6379"}, "db": {"skip_update": true}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write(temp_dir.path(), name, contents);
        jailed(|| {
            let config = from_figment(&figment(Some(&path))).unwrap();
            assert_eq!(config.timeout, 60);
            assert_eq!(config.cache.backend, "redis://localhost:6379");
            assert!(config.db.skip_update);
            assert!(!config.policy.skip_update);
            assert_eq!(config.policy.bundle, DEFAULT_POLICY_BUNDLE);
        });
    }

    #[test]
    fn test_local_directory_backend() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write(temp_dir.path(), "vigil.toml", "[cache]\nbackend = \"/var/cache/vigil\"\n");
        jailed(|| {
            let config = from_figment(&figment(Some(&path))).unwrap();
            assert_eq!(config.cache.backend, "/var/cache/vigil");
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = load(Some(&temp_dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write(temp_dir.path(), "vigil.toml", "timeout = \"soon\"\n");
        jailed(|| {
            let err = from_figment(&figment(Some(&path))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
        });
    }

    #[rstest]
    #[case("timeout = 0\n")]
    #[case("[db]\nrepository = \"\"\n")]
    #[case("[cache]\nbackend = \"memcached://localhost\"\n")]
    #[case("[cache]\nbackend = \"https://cache.internal\"\n")]
    #[case("[cache.tls]\nca_cert = \"/etc/vigil/ca.pem\"\n")]
    fn test_invalid_values(#[case] contents: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write(temp_dir.path(), "vigil.toml", contents);
        jailed(|| {
            let err = from_figment(&figment(Some(&path))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("vigil.toml", "timeout = 60\n[cache]\nbackend = \"fs\"\n")?;
            jail.set_env("VIGIL_CACHE__BACKEND", "rediss://cache.internal:6380");
            jail.set_env("VIGIL_POLICY__SKIP_UPDATE", "true");
            let config = from_figment(&figment(Some(Path::new("vigil.toml")))).unwrap();
            assert_eq!(config.timeout, 60);
            assert_eq!(config.cache.backend, "rediss://cache.internal:6380");
            assert!(config.policy.skip_update);
            Ok(())
        });
    }
}
