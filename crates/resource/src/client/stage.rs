//! Staging directory and atomic directory replacement.
//!
//! A resource is assembled in a hidden temp directory next to its final
//! location, then swapped in with renames. Until [`Staging::commit()`] the live
//! directory is never touched; dropping a `Staging` removes everything staged.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct Staging {
    dir: TempDir,
    target: PathBuf,
}

impl Staging {
    /// Stage a replacement for the directory `target`.
    pub(crate) fn new(target: &Path) -> Result<Self> {
        let parent = target.parent().ok_or_raise(|| ErrorKind::Io(target.to_path_buf()))?;
        fs::create_dir_all(parent).or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        let dir = tempfile::Builder::new()
            .prefix(".vigil-staging-")
            .tempdir_in(parent)
            .or_raise(|| ErrorKind::Io(parent.to_path_buf()))?;
        Ok(Self {
            dir,
            target: target.to_path_buf(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Replace the target directory with the staged one.
    pub(crate) async fn commit(self) -> Result<()> {
        let target = self.target.clone();
        let staged = self.dir.keep();
        tokio::task::spawn_blocking({
            let target = target.clone();
            move || swap(&staged, &target)
        })
        .await
        .or_raise(|| ErrorKind::Io(target.clone()))?
        .or_raise(|| ErrorKind::Io(target.clone()))?;
        tracing::debug!(path = %target.display(), "Committed staged directory");
        Ok(())
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    target.with_file_name(format!(".{name}.previous"))
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != IoErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Move `target` aside, move `staged` into its place, then drop the old copy.
/// Any failure puts the previous directory back.
fn swap(staged: &Path, target: &Path) -> std::io::Result<()> {
    let backup = backup_path(target);
    let result = (|| -> std::io::Result<bool> {
        // Left over by a crash between the two renames of an earlier swap.
        remove_if_exists(&backup)?;
        let had_previous = match fs::rename(target, &backup) {
            Ok(()) => true,
            Err(e) if e.kind() == IoErrorKind::NotFound => false,
            Err(e) => return Err(e),
        };
        if let Err(e) = fs::rename(staged, target) {
            if had_previous && let Err(restore) = fs::rename(&backup, target) {
                tracing::error!(
                    path = %backup.display(),
                    target = %target.display(),
                    error = %restore,
                    "Unable to restore previous copy"
                );
            }
            return Err(e);
        }
        Ok(had_previous)
    })();
    match result {
        Ok(had_previous) => {
            if had_previous && let Err(e) = remove_if_exists(&backup) {
                tracing::warn!(path = %backup.display(), error = %e, "Unable to remove previous copy");
            }
            Ok(())
        },
        Err(e) => {
            let _ = remove_if_exists(staged);
            Err(e)
        },
    }
}
