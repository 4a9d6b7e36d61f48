//! Redis-compatible cache backend ("client/server" mode).
//!
//! Entries live under `vigil::<bucket>::<key>`. Everything the backend owns
//! shares the `vigil::` prefix, which is what [`clear()`](ArtifactCache::clear)
//! scans for; other data on the same server is left alone.

use crate::backend::{ArtifactCache, Bucket, KeyStream};
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::tls::TlsSettings;
use async_stream::stream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ClientTlsConfig, ConnectionAddr, IntoConnectionInfo, TlsCertificates};
use std::time::Duration;
use tokio::sync::OnceCell;

const KEY_PREFIX: &str = "vigil";
const SCAN_COUNT: usize = 1000;

/// Cache backend talking to a Redis-compatible server.
///
/// The connection is established lazily on first use and then shared: a
/// [`MultiplexedConnection`] is cheap to clone and pipelines concurrent
/// requests over a single socket.
pub struct RedisBackend {
    name: String,
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
    ttl: Option<Duration>,
}

impl RedisBackend {
    /// Create a backend for `url` (`redis://` or `rediss://`).
    ///
    /// With `tls`, a plain `redis://` address is upgraded to TLS and the
    /// connection authenticates with the client certificate. Entries written
    /// with a `ttl` expire on the server.
    ///
    /// # Errors
    ///
    /// Returns [`Configuration`](ErrorKind::Configuration) if the URL cannot
    /// be parsed or the client cannot be built from it. No connection is
    /// attempted here.
    pub fn new(url: &str, tls: Option<&TlsSettings>, ttl: Option<Duration>) -> Result<Self> {
        let mut info = url
            .into_connection_info()
            .or_raise(|| ErrorKind::Configuration("malformed Redis URL".to_string()))?;
        let client = match tls {
            None => Client::open(info.clone()),
            Some(tls) => {
                info.addr = upgrade_to_tls(info.addr);
                let certificates = TlsCertificates {
                    client_tls: Some(ClientTlsConfig {
                        client_cert: tls.cert_pem.clone(),
                        client_key: tls.key_pem.clone(),
                    }),
                    root_cert: Some(tls.ca_pem.clone()),
                };
                Client::build_with_tls(info.clone(), certificates)
            },
        }
        .or_raise(|| ErrorKind::Configuration(format!("unable to build Redis client for {}", info.addr)))?;
        // Display of the address never includes credentials.
        let name = format!("redis:{}", info.addr);
        Ok(Self {
            name,
            client,
            connection: OnceCell::new(),
            ttl,
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                tracing::debug!(backend = %self.name, "Connecting to Redis");
                self.client.get_multiplexed_async_connection().await
            })
            .await
            .or_raise(|| ErrorKind::Network(format!("unable to connect to {}", self.name)))?;
        Ok(connection.clone())
    }

    fn backend_error(&self, operation: &str) -> ErrorKind {
        ErrorKind::Backend(format!("{operation} failed on {}", self.name))
    }
}

fn entry_key(bucket: Bucket, key: &str) -> Result<String> {
    Ok(format!("{KEY_PREFIX}::{bucket}::{}", validate_key(key)?))
}

fn upgrade_to_tls(addr: ConnectionAddr) -> ConnectionAddr {
    match addr {
        ConnectionAddr::Tcp(host, port) => ConnectionAddr::TcpTls {
            host,
            port,
            insecure: false,
            tls_params: None,
        },
        other => other,
    }
}

#[async_trait]
impl ArtifactCache for RedisBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, bucket: Bucket, key: &str, data: &[u8]) -> Result<()> {
        let entry = entry_key(bucket, key)?;
        let mut connection = self.connection().await?;
        match self.ttl {
            Some(ttl) => connection.set_ex::<_, _, ()>(&entry, data, ttl.as_secs().max(1)).await,
            None => connection.set::<_, _, ()>(&entry, data).await,
        }
        .or_raise(|| self.backend_error("SET"))
    }

    async fn get(&self, bucket: Bucket, key: &str) -> Result<Vec<u8>> {
        let entry = entry_key(bucket, key)?;
        let mut connection = self.connection().await?;
        let value: Option<Vec<u8>> = connection.get(&entry).await.or_raise(|| self.backend_error("GET"))?;
        value.ok_or_raise(|| ErrorKind::NotFound(key.to_string()))
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool> {
        let entry = entry_key(bucket, key)?;
        let mut connection = self.connection().await?;
        connection.exists(&entry).await.or_raise(|| self.backend_error("EXISTS"))
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<()> {
        let entry = entry_key(bucket, key)?;
        let mut connection = self.connection().await?;
        connection.del::<_, ()>(&entry).await.or_raise(|| self.backend_error("DEL"))
    }

    fn list_stream<'a>(&'a self, bucket: Bucket) -> KeyStream<'a> {
        Box::pin(stream! {
            let mut connection = match self.connection().await {
                Ok(connection) => connection,
                Err(e) => { yield Err(e); return; },
            };
            let prefix = format!("{KEY_PREFIX}::{bucket}::");
            let pattern = format!("{prefix}*");
            let mut cursor: u64 = 0;
            loop {
                let page: redis::RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_COUNT)
                    .query_async(&mut connection)
                    .await;
                let (next, keys) = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err::<String, _>(e).or_raise(|| self.backend_error("SCAN"));
                        return;
                    },
                };
                for key in keys {
                    if let Some(key) = key.strip_prefix(&prefix) {
                        yield Ok(key.to_string());
                    }
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }
        })
    }

    async fn clear(&self) -> Result<()> {
        tracing::debug!(backend = %self.name, "Removing all cache entries from Redis");
        let mut connection = self.connection().await?;
        let pattern = format!("{KEY_PREFIX}::*");
        let mut cursor: u64 = 0;
        let mut removed = 0usize;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut connection)
                .await
                .or_raise(|| self.backend_error("SCAN"))?;
            if !keys.is_empty() {
                removed += keys.len();
                connection.del::<_, ()>(keys).await.or_raise(|| self.backend_error("DEL"))?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        tracing::debug!(backend = %self.name, removed, "Redis cache cleared");
        Ok(())
    }
}
