//! Decides whether a resource must be downloaded again.

use crate::metadata::ResourceMetadata;
use time::{Duration, OffsetDateTime};

/// Returns `true` when a fresh copy of the resource has to be fetched.
///
/// In order:
///
/// 1. `skip` always wins: the caller opted out of updates.
/// 2. No local metadata means the resource was never downloaded.
/// 3. A version other than `required_version` is incompatible, whatever the
///    timestamps say.
/// 4. A copy downloaded less than `min_interval` ago is kept.
/// 5. Otherwise the copy is stale once `next_update` has passed.
pub fn needs_update(
    metadata: Option<&ResourceMetadata>,
    required_version: u32,
    skip: bool,
    now: OffsetDateTime,
    min_interval: Duration,
) -> bool {
    if skip {
        tracing::debug!("Skipping update check");
        return false;
    }
    let Some(metadata) = metadata else {
        tracing::debug!("No local metadata, first download");
        return true;
    };
    if metadata.version != required_version {
        tracing::debug!(local = metadata.version, required = required_version, "Incompatible version");
        return true;
    }
    if now - metadata.downloaded_at < min_interval {
        tracing::debug!(downloaded_at = %metadata.downloaded_at, "Downloaded recently");
        return false;
    }
    now >= metadata.next_update
}
