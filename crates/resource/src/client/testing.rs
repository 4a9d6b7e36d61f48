//! Fixtures shared by the client and updater tests.

use super::Fetcher;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Build a `.tar.gz` archive from `(path, contents)` pairs.
pub(crate) fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// What a [`StubFetcher`] does when called.
pub(crate) enum Behaviour {
    Respond(Vec<u8>),
    Fail,
    /// Cancel the token, then never complete.
    CancelAndHang(CancellationToken),
    /// Cancel the token, then respond anyway.
    CancelAndRespond(CancellationToken, Vec<u8>),
}

pub(crate) struct StubFetcher {
    behaviour: Behaviour,
    calls: AtomicUsize,
}
impl StubFetcher {
    pub(crate) fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Respond(body) => Ok(body.clone()),
            Behaviour::Fail => exn::bail!(ErrorKind::Fetch(url.to_string())),
            Behaviour::CancelAndHang(token) => {
                token.cancel();
                std::future::pending().await
            },
            Behaviour::CancelAndRespond(token, body) => {
                token.cancel();
                Ok(body.clone())
            },
        }
    }
}
