use crate::cli::Command;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vigil_cache::Cache;
use vigil_config::Config;
use vigil_resource::client::{DbClient, FetcherHandle, HttpFetcher, PolicyClient, ResourceClient};
use vigil_resource::{Status, Updater, inspect};

pub async fn execute(command: Command, config: &Config, cancel: &CancellationToken) -> Result<()> {
    match command {
        Command::Reset => cache(config)?.reset().await.or_raise(|| ErrorKind::Cache),
        Command::ClearCache => cache(config)?.clear_artifacts().await.or_raise(|| ErrorKind::Cache),
        Command::ClearDb => cache(config)?.clear_metadata().await.or_raise(|| ErrorKind::Cache),
        Command::Db { skip_update } => db(config, skip_update || config.db.skip_update, cancel).await,
        Command::Policy { skip_update } => policy(config, skip_update || config.policy.skip_update, cancel).await,
        Command::Info => info(config).await,
    }
}

fn cache(config: &Config) -> Result<Cache> {
    Cache::from_config(&config.cache).or_raise(|| ErrorKind::Cache)
}

fn fetcher(config: &Config) -> Result<FetcherHandle> {
    Ok(Arc::new(HttpFetcher::new(config.timeout()).or_raise(|| ErrorKind::Resource)?))
}

fn describe_status(status: Status) -> &'static str {
    match status {
        Status::UpToDate => "up to date",
        Status::Skipped => "update skipped",
        Status::Downloaded => "downloaded",
        Status::Degraded => "unavailable",
    }
}

async fn db(config: &Config, skip: bool, cancel: &CancellationToken) -> Result<()> {
    let client = DbClient::new(config.cache.cache_dir(), &config.db.repository, fetcher(config)?);
    let update = Updater::new(client)
        .run(DbClient::SCHEMA_VERSION, skip, cancel)
        .await
        .or_raise(|| ErrorKind::Resource)?;
    let db = update.resource;
    println!(
        "Vulnerability database {} ({}): schema {}, {} bytes, updated {}",
        describe_status(update.status),
        db.path.display(),
        db.metadata.version,
        db.size,
        db.metadata.updated_at,
    );
    Ok(())
}

async fn policy(config: &Config, skip: bool, cancel: &CancellationToken) -> Result<()> {
    let client = PolicyClient::new(config.cache.cache_dir(), &config.policy.bundle, fetcher(config)?);
    let update = Updater::new(client)
        .run(PolicyClient::BUNDLE_VERSION, skip, cancel)
        .await
        .or_raise(|| ErrorKind::Resource)?;
    println!("Built-in policies {}", describe_status(update.status));
    for path in update.resource {
        println!("  {}", path.display());
    }
    Ok(())
}

async fn info(config: &Config) -> Result<()> {
    let cache = cache(config)?;
    let cache_dir = config.cache.cache_dir();
    println!("Cache backend: {}", cache.name());
    println!("Cache directory: {}", cache_dir.display());
    let fetcher = fetcher(config)?;
    let db = DbClient::new(&cache_dir, &config.db.repository, fetcher.clone());
    let policy = PolicyClient::new(&cache_dir, &config.policy.bundle, fetcher);
    show_metadata("Vulnerability database", db.root()).await;
    show_metadata("Built-in policies", policy.root()).await;
    Ok(())
}

async fn show_metadata(label: &str, root: &Path) {
    match inspect::describe(root).await {
        Ok(metadata) => println!(
            "{label}: version {}, updated {}, next update {}, downloaded {}",
            metadata.version, metadata.updated_at, metadata.next_update, metadata.downloaded_at
        ),
        Err(e) => {
            tracing::debug!(error = ?e, "No metadata");
            println!("{label}: not downloaded");
        },
    }
}
