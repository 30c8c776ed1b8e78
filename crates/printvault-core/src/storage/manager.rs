//! Blob store manager.

use super::atomic;
use crate::config::StorageConfig;
use crate::hashing::{hash_file, to_hex};
use crate::{CatalogError, Result};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Aggregate size of the committed blobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub blob_count: u64,
    pub total_bytes: u64,
}

/// Content-addressable store rooted at a directory.
///
/// Paths are a pure function of `(hash, extension)`. Writes go through
/// `root/.tmp/` and are renamed into place after the copy has been re-hashed,
/// so a partially written file never appears under its final name.
///
/// The check-then-write in [`store_file`](Self::store_file) is not locked: two
/// processes storing the same hash at once race benignly because equal hashes
/// are assumed to mean equal content.
#[derive(Debug, Clone)]
pub struct StorageManager {
    root: PathBuf,
}

impl StorageManager {
    /// Create a manager for `root`. Does not touch the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory for in-flight writes.
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(StorageConfig::TEMP_DIR_NAME)
    }

    /// Compute where a blob lives. No I/O.
    ///
    /// Returns an empty path if the hash is too short to shard or if either
    /// part contains characters that could escape the store.
    pub fn blob_path(&self, hash: &str, ext: &str) -> PathBuf {
        let Some((hash, ext)) = normalize_key(hash, ext) else {
            return PathBuf::new();
        };

        let width = StorageConfig::SHARD_WIDTH;
        self.root
            .join(&hash[..width])
            .join(&hash[width..width * 2])
            .join(blob_file_name(&hash, &ext))
    }

    /// Copy `source` into the store under `hash`.
    ///
    /// Returns the existing path without touching `source` if the blob is
    /// already present. Otherwise copies into the scratch directory, verifies
    /// the copy hashes to `hash`, and renames it into place.
    pub fn store_file(&self, source: &Path, hash: &str, ext: &str) -> Result<PathBuf> {
        self.store_with(hash, ext, |temp| {
            atomic::copy_synced(source, temp)?;
            Ok(())
        })
    }

    /// Same protocol as [`store_file`](Self::store_file) from an in-memory buffer.
    pub fn store_bytes(&self, bytes: &[u8], hash: &str, ext: &str) -> Result<PathBuf> {
        self.store_with(hash, ext, |temp| atomic::write_synced(temp, bytes))
    }

    /// Store `source`, then delete it.
    ///
    /// Failing to delete the source is logged and ignored; the blob is already
    /// committed at that point.
    pub fn move_file(&self, source: &Path, hash: &str, ext: &str) -> Result<PathBuf> {
        let dest = self.store_file(source, hash, ext)?;

        if source != dest {
            if let Err(e) = fs::remove_file(source) {
                warn!(
                    "Stored {} but could not delete source: {}",
                    source.display(),
                    e
                );
            }
        }

        Ok(dest)
    }

    pub fn exists(&self, hash: &str, ext: &str) -> bool {
        let path = self.blob_path(hash, ext);
        !path.as_os_str().is_empty() && path.is_file()
    }

    /// Remove a blob. Removing a blob that is not there counts as success.
    pub fn remove(&self, hash: &str, ext: &str) -> bool {
        let path = self.blob_path(hash, ext);
        if path.as_os_str().is_empty() {
            return false;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed blob {}", path.display());
                self.prune_empty_shards(&path);
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to remove blob {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Delete everything in the scratch directory.
    ///
    /// Meant to run once at startup, before any import, to reclaim temp files
    /// left by a crash between copy and rename. A missing scratch directory
    /// yields 0.
    pub fn cleanup_orphaned_temp_files(&self) -> usize {
        let temp_dir = self.temp_dir();
        let entries = match fs::read_dir(&temp_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Cannot read scratch dir {}: {}", temp_dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove orphan {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Removed {} orphaned temp files from {}", removed, temp_dir.display());
        }
        removed
    }

    /// Count committed blobs and their total size.
    pub fn stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats::default();
        if !self.root.exists() {
            return Ok(stats);
        }

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.file_name() != StorageConfig::TEMP_DIR_NAME);

        for entry in walker {
            let entry = entry.map_err(|e| CatalogError::Io {
                message: e.to_string(),
                path: e.path().map(Path::to_path_buf),
                source: None,
            })?;
            if !entry.file_type().is_file() || atomic::is_partial(entry.path()) {
                continue;
            }
            stats.blob_count += 1;
            stats.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }

        Ok(stats)
    }

    // ========================================
    // Internal Methods
    // ========================================

    fn store_with(
        &self,
        hash: &str,
        ext: &str,
        fill: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<PathBuf> {
        let Some((hash, ext)) = normalize_key(hash, ext) else {
            return Err(CatalogError::filesystem(
                "address",
                &self.root,
                format!("'{}' is not a usable blob hash", hash),
            ));
        };

        let dest = self.blob_path(&hash, &ext);
        if dest.exists() {
            debug!("Blob {} already stored", hash);
            return Ok(dest);
        }

        let temp_dir = self.temp_dir();
        fs::create_dir_all(&temp_dir)
            .map_err(|e| CatalogError::filesystem("create_dir", &temp_dir, e))?;

        let temp = temp_dir.join(format!(
            "{}{}",
            StorageConfig::TEMP_FILE_PREFIX,
            blob_file_name(&hash, &ext)
        ));

        let result = fill(&temp).and_then(|()| Self::verify_and_commit(&temp, &dest, &hash));
        if result.is_err() {
            atomic::remove_quietly(&temp);
        }
        result?;

        info!("Stored blob {}", dest.display());
        Ok(dest)
    }

    fn verify_and_commit(temp: &Path, dest: &Path, hash: &str) -> Result<()> {
        let actual = to_hex(hash_file(temp)?);
        if actual != hash {
            return Err(CatalogError::HashMismatch {
                expected: hash.to_string(),
                actual,
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CatalogError::filesystem("create_dir", parent, e))?;
        }

        atomic::commit(temp, dest, hash)
    }

    /// Drop shard directories left empty by a removal.
    fn prune_empty_shards(&self, blob: &Path) {
        for dir in blob.ancestors().skip(1).take(2) {
            if dir == self.root || fs::remove_dir(dir).is_err() {
                break;
            }
        }
    }
}

/// Lowercase the key parts and reject anything that is not a plain name.
fn normalize_key(hash: &str, ext: &str) -> Option<(String, String)> {
    if hash.len() < StorageConfig::MIN_HASH_LEN
        || !hash.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }

    let ext = ext.strip_prefix('.').unwrap_or(ext);
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some((hash.to_ascii_lowercase(), ext.to_ascii_lowercase()))
}

fn blob_file_name(hash: &str, ext: &str) -> String {
    if ext.is_empty() {
        hash.to_string()
    } else {
        format!("{}.{}", hash, ext)
    }
}
