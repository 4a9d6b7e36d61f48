//! The check, download, load cycle shared by every resource.

use crate::client::ResourceClient;
use crate::error::{ErrorKind, Result};
use crate::inspect;
use exn::ResultExt;
use tokio_util::sync::CancellationToken;

/// How an update cycle ended up with its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The local copy was fresh.
    UpToDate,
    /// Updates were skipped; the local copy was used as is.
    Skipped,
    /// A new copy was downloaded.
    Downloaded,
    /// Updates were skipped and the local copy was unusable; the resource is
    /// the client's fallback.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update<T> {
    pub status: Status,
    pub resource: T,
}

/// Drives a [`ResourceClient`] through one update cycle.
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use vigil_resource::client::{DbClient, HttpFetcher};
/// use vigil_resource::Updater;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(60)).unwrap());
/// let client = DbClient::new("/var/cache/vigil", "https://example.com/vigil-db.tar.gz", fetcher);
/// let update = Updater::new(client)
///     .run(DbClient::SCHEMA_VERSION, false, &CancellationToken::new())
///     .await
///     .unwrap();
/// println!("{}", update.resource.path.display());
/// # }
/// ```
pub struct Updater<C> {
    client: C,
}

impl<C: ResourceClient> Updater<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Check freshness, download if needed, then load the local copy.
    ///
    /// Each stage fails with its own error kind: [`Check`](ErrorKind::Check),
    /// [`Update`](ErrorKind::Update) (previous copy untouched) or
    /// [`Load`](ErrorKind::Load). A load failure is tolerated only when
    /// `skip` is set and the client has a fallback.
    #[tracing::instrument(skip_all, fields(kind = %self.client.kind()))]
    pub async fn run(&self, required_version: u32, skip: bool, cancel: &CancellationToken) -> Result<Update<C::Loaded>> {
        let kind = self.client.kind();
        let needs_update =
            self.client.needs_update(required_version, skip).await.or_raise(|| ErrorKind::Check(kind))?;

        let status = if needs_update {
            tracing::info!("Need to update the {kind}");
            self.client.download(cancel).await.or_raise(|| ErrorKind::Update(kind))?;
            Status::Downloaded
        } else if skip {
            Status::Skipped
        } else {
            Status::UpToDate
        };

        inspect::report(kind, self.client.root()).await;

        match self.client.load().await {
            Ok(resource) => Ok(Update { status, resource }),
            Err(e) => match self.client.fallback().filter(|_| skip) {
                Some(resource) => {
                    tracing::info!(error = ?e, "No {kind} was loaded");
                    Ok(Update {
                        status: Status::Degraded,
                        resource,
                    })
                },
                None => Err(e).or_raise(|| ErrorKind::Load(kind)),
            },
        }
    }
}
