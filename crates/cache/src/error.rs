//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Backend locator or TLS material is unusable. Fatal: fix the
    /// configuration before trying again.
    #[display("invalid cache configuration: {_0}")]
    Configuration(#[error(not(source))] String),
    /// Local filesystem failure on the cache or metadata directory.
    #[display("storage error: {}", _0.display())]
    Storage(#[error(not(source))] PathBuf),
    /// A backend operation failed; the name identifies the operation.
    #[display("failed to {_0} the artifact cache")]
    Cache(#[error(not(source))] &'static str),
    /// Entry does not exist.
    #[display("cache entry not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Key contains path separators, NUL bytes, or is otherwise unusable.
    #[display("invalid cache key: {_0:?}")]
    InvalidKey(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (Redis connection, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    Backend(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::Backend(_))
    }
}
