//! Gzip-compressed tar archives and content digests.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::Path;

/// Unpack a `.tar.gz` payload into `dest`.
///
/// Entries that would land outside of `dest` (absolute paths, `..`) reject the
/// whole archive. Blocking; run it on a blocking thread.
pub(crate) fn unpack(archive: &[u8], dest: &Path) -> Result<()> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let entries = tar.entries().or_raise(|| ErrorKind::InvalidData("unreadable archive".to_string()))?;
    for entry in entries {
        let mut entry = entry.or_raise(|| ErrorKind::InvalidData("corrupt archive entry".to_string()))?;
        let name = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
        let unpacked = entry.unpack_in(dest).or_raise(|| ErrorKind::Io(dest.join(&name)))?;
        if !unpacked {
            exn::bail!(ErrorKind::InvalidData(format!("archive entry {name:?} escapes the destination")));
        }
    }
    Ok(())
}

/// BLAKE3 digest of a file, hex encoded.
pub(crate) fn digest_file(path: &Path) -> Result<String> {
    let file = File::open(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(file).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    Ok(hasher.finalize().to_hex().to_string())
}
