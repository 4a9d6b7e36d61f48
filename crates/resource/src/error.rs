//! Resource Error Types
//!
//! Errors are layered: the outermost [`ErrorKind`] names the stage of the
//! update cycle that failed ([`Check`](ErrorKind::Check),
//! [`Update`](ErrorKind::Update), [`Load`](ErrorKind::Load) or
//! [`Inspection`](ErrorKind::Inspection)), the inner ones the cause.

use crate::metadata::ResourceKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A resource error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The local metadata could not be read, so freshness is unknown.
    #[display("unable to check whether the {_0} needs an update")]
    Check(#[error(not(source))] ResourceKind),
    /// Download or persistence failed. The previous local copy is untouched.
    #[display("failed to update the {_0}")]
    Update(#[error(not(source))] ResourceKind),
    /// The local copy is unusable.
    #[display("failed to load the {_0}")]
    Load(#[error(not(source))] ResourceKind),
    /// Diagnostic read of the metadata failed. Never fatal.
    #[display("unable to inspect resource metadata in {}", _0.display())]
    Inspection(#[error(not(source))] PathBuf),
    #[display("download cancelled")]
    Cancelled,
    #[display("failed to fetch {_0}")]
    Fetch(#[error(not(source))] String),
    #[display("invalid resource data: {_0}")]
    InvalidData(#[error(not(source))] String),
    #[display("I/O error on {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    #[display("unreadable metadata file {}", _0.display())]
    Metadata(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Cancelled)
    }
}
