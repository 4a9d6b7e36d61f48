use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vigil_config::Config;

#[derive(Parser, Debug)]
#[command(name = "vigil", about = "Artifact cache and security resource management", version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "VIGIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache backend: "fs", a local directory, or a redis:// / rediss:// URL
    #[arg(long, global = true)]
    pub cache_backend: Option<String>,

    /// Local cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// CA certificate for the Redis cache backend
    #[arg(long, global = true, requires_all = ["redis_cert", "redis_key"])]
    pub redis_ca: Option<PathBuf>,

    /// Client certificate for the Redis cache backend
    #[arg(long, global = true, requires_all = ["redis_ca", "redis_key"])]
    pub redis_cert: Option<PathBuf>,

    /// Client key for the Redis cache backend
    #[arg(long, global = true, requires_all = ["redis_ca", "redis_cert"])]
    pub redis_key: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Remove the local cache directory and every cached artifact
    Reset,
    /// Remove every cached artifact
    ClearCache,
    /// Remove the local cache directory (databases, policies, metadata)
    ClearDb,
    /// Update and load the vulnerability database
    Db {
        /// Use the local copy as is
        #[arg(long)]
        skip_update: bool,
    },
    /// Update and load the built-in policy bundle
    Policy {
        /// Use the local copy as is
        #[arg(long)]
        skip_update: bool,
    },
    /// Show the cache backend and resource metadata
    Info,
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(backend) = &self.cache_backend {
            config.cache.backend = backend.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        if self.redis_ca.is_some() {
            config.cache.tls.ca_cert = self.redis_ca.clone();
            config.cache.tls.cert = self.redis_cert.clone();
            config.cache.tls.key = self.redis_key.clone();
        }
    }
}
