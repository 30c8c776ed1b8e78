//! Crash-safe file primitives for the blob store.
//!
//! Writes go to a scratch file first, are fsynced, then renamed into place:
//! 1. Copy or write into the temp path
//! 2. `sync_all` so the data reaches disk before the rename
//! 3. Atomic rename to the final path
//!
//! A crash before step 3 leaves only the temp file behind. When the rename
//! would cross filesystems, the copy is staged beside the destination and
//! renamed from there instead.

use crate::config::StorageConfig;
use crate::hashing::{hash_file, to_hex};
use crate::{CatalogError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Copy `source` into a freshly truncated `dest` and fsync it.
///
/// Returns the number of bytes copied.
pub fn copy_synced(source: &Path, dest: &Path) -> Result<u64> {
    let mut input = File::open(source).map_err(|e| CatalogError::io_with_path(e, source))?;
    let mut output = create_truncated(dest)?;

    let mut buffer = vec![0u8; StorageConfig::COPY_CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let bytes_read = input
            .read(&mut buffer)
            .map_err(|e| CatalogError::io_with_path(e, source))?;
        if bytes_read == 0 {
            break;
        }
        output
            .write_all(&buffer[..bytes_read])
            .map_err(|e| CatalogError::filesystem("copy", dest, e))?;
        copied += bytes_read as u64;
    }

    sync(&mut output, dest)?;
    Ok(copied)
}

/// Write `bytes` into a freshly truncated `dest` and fsync it.
pub fn write_synced(dest: &Path, bytes: &[u8]) -> Result<()> {
    let mut output = create_truncated(dest)?;
    output
        .write_all(bytes)
        .map_err(|e| CatalogError::filesystem("write", dest, e))?;
    sync(&mut output, dest)
}

/// Suffix for the same-filesystem staging copy used when a rename crosses devices.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Move a verified temp file to its final path.
///
/// Within one filesystem this is a single rename. If the rename crosses
/// devices, falls back to [`commit_by_copy`].
pub fn commit(temp: &Path, dest: &Path, expected_hash: &str) -> Result<()> {
    match fs::rename(temp, dest) {
        Ok(()) => {
            debug!("Renamed {} -> {}", temp.display(), dest.display());
            Ok(())
        }
        Err(e) if is_cross_device(&e) => {
            warn!(
                "Rename across filesystems from {} to {}, copying instead",
                temp.display(),
                dest.display()
            );
            commit_by_copy(temp, dest, expected_hash)
        }
        Err(e) => Err(CatalogError::filesystem("rename", dest, e)),
    }
}

/// Copy `temp` next to `dest`, verify it, then rename it into place.
///
/// The copy lands under a hidden `.partial` name in the destination directory
/// so the final rename stays on one filesystem and `dest` only ever appears
/// complete. The staging file is removed on any failure; `temp` is removed
/// only on success.
pub fn commit_by_copy(temp: &Path, dest: &Path, expected_hash: &str) -> Result<()> {
    let staging = staging_path(dest)?;

    let result = copy_synced(temp, &staging)
        .and_then(|_| hash_file(&staging))
        .and_then(|value| {
            let actual = to_hex(value);
            if actual != expected_hash {
                return Err(CatalogError::HashMismatch {
                    expected: expected_hash.to_string(),
                    actual,
                });
            }
            fs::rename(&staging, dest).map_err(|e| CatalogError::filesystem("rename", dest, e))
        });

    if result.is_err() {
        remove_quietly(&staging);
        return result;
    }

    remove_quietly(temp);
    debug!("Copied {} -> {}", temp.display(), dest.display());
    Ok(())
}

/// Whether `path` is a staging copy left by an interrupted [`commit_by_copy`].
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(PARTIAL_SUFFIX))
}

fn staging_path(dest: &Path) -> Result<PathBuf> {
    match (dest.parent(), dest.file_name()) {
        (Some(parent), Some(name)) => Ok(parent.join(format!(
            ".{}{}",
            name.to_string_lossy(),
            PARTIAL_SUFFIX
        ))),
        _ => Err(CatalogError::filesystem(
            "commit",
            dest,
            "destination has no file name",
        )),
    }
}

/// Best-effort removal. Missing files are fine, anything else is logged.
pub fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Whether a rename failed because source and destination are on different devices.
pub fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }

    #[cfg(windows)]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

fn create_truncated(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| CatalogError::filesystem("create", path, e))
}

fn sync(file: &mut File, path: &Path) -> Result<()> {
    file.flush()
        .map_err(|e| CatalogError::filesystem("flush", path, e))?;
    file.sync_all()
        .map_err(|e| CatalogError::filesystem("sync", path, e))
}
