//! Fetching resource archives.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

pub type FetcherHandle = Arc<dyn Fetcher>;

/// Upper bound on the buffer reserved from an advertised `Content-Length`;
/// larger bodies grow the buffer as chunks arrive.
const MAX_PREALLOCATION: u64 = 64 << 20;

/// Retrieves the full payload at a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Fetcher`] over HTTP(S).
///
/// One attempt per call; retrying is left to whoever drives the update.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}
impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Fetch("HTTP client configuration".to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .or_raise(|| ErrorKind::Fetch(url.to_string()))?;
        let reserve = response.content_length().unwrap_or(0).min(MAX_PREALLOCATION);
        let mut body = Vec::with_capacity(reserve as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.or_raise(|| ErrorKind::Fetch(url.to_string()))?);
        }
        tracing::debug!(bytes = body.len(), "Download complete");
        Ok(body)
    }
}
