//! Diagnostic read of resource metadata after an update cycle.

use crate::error::{ErrorKind, Result};
use crate::metadata::{MetadataFile, ResourceKind, ResourceMetadata};
use exn::{OptionExt, ResultExt};
use std::path::Path;

/// Read the metadata stored in the resource directory `root`.
pub async fn describe(root: &Path) -> Result<ResourceMetadata> {
    MetadataFile::in_dir(root)
        .load()
        .await
        .or_raise(|| ErrorKind::Inspection(root.to_path_buf()))?
        .ok_or_raise(|| ErrorKind::Inspection(root.to_path_buf()))
}

/// Log what [`describe()`] finds. Failures are logged too, never returned.
pub async fn report(kind: ResourceKind, root: &Path) {
    match describe(root).await {
        Ok(metadata) => tracing::debug!(
            %kind,
            version = metadata.version,
            updated_at = %metadata.updated_at,
            next_update = %metadata.next_update,
            downloaded_at = %metadata.downloaded_at,
            "Resource metadata",
        ),
        Err(e) => tracing::warn!(%kind, error = ?e, "Unable to inspect resource metadata"),
    }
}
