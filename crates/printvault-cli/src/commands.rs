//! Subcommand implementations.

use anyhow::{Context, Result};
use printvault_core::config::{ImportConfig, PathsConfig};
use printvault_core::{BasicParser, ImportQueue, ImportTask, SqliteCatalog, StorageManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Blob store and catalog under one library root.
struct Library {
    storage: StorageManager,
    catalog: Arc<SqliteCatalog>,
}

impl Library {
    /// Open the library, reclaiming temp files from any interrupted run first.
    fn open(root: &Path) -> Result<Self> {
        let storage = StorageManager::new(root.join(PathsConfig::BLOBS_DIR_NAME));
        storage.cleanup_orphaned_temp_files();

        let db_path = root.join(PathsConfig::CATALOG_DB_NAME);
        let catalog = SqliteCatalog::open(&db_path)
            .with_context(|| format!("Failed to open catalog at {}", db_path.display()))?;

        Ok(Self {
            storage,
            catalog: Arc::new(catalog),
        })
    }

    /// Delete an imported task's source now that its blob is committed.
    fn release_source(&self, task: &ImportTask) {
        match self
            .storage
            .move_file(task.source_path(), task.hash(), task.extension())
        {
            Ok(blob) => debug!("Moved {} to {}", task.source_path().display(), blob.display()),
            Err(e) => warn!("Could not move {}: {}", task.source_path().display(), e),
        }
    }
}

pub async fn import(root: &Path, paths: &[PathBuf], move_sources: bool) -> Result<()> {
    let library = Library::open(root)?;

    let files = collect_files(paths);
    if files.is_empty() {
        warn!("No importable files found");
        return Ok(());
    }

    let queue = ImportQueue::with_storage(
        Arc::new(BasicParser),
        library.catalog.clone(),
        library.storage.clone(),
    );
    queue.enqueue(files)?;

    let mut ticker = tokio::time::interval(ImportConfig::PROGRESS_POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut ctrl_c, if !interrupted => {
                result?;
                warn!("Interrupted, stopping after the current file");
                queue.cancel();
                interrupted = true;
            }
        }

        // Read progress before draining so nothing completes unseen after
        // the batch goes idle.
        let progress = queue.progress();
        for task in queue.poll_completed() {
            info!("Imported {} ({})", task.display_name(), task.hash());
            if move_sources {
                library.release_source(&task);
            }
        }

        if !progress.active {
            break;
        }
        info!(
            "[{}/{}] {}: {}",
            progress.completed_files,
            progress.total_files,
            progress.current_stage,
            progress.current_file_name
        );
    }

    tokio::task::block_in_place(|| queue.wait());

    let progress = queue.progress();
    println!(
        "Imported {} of {} files ({} failed)",
        progress.succeeded_files(),
        progress.total_files,
        progress.failed_files
    );
    Ok(())
}

pub fn stats(root: &Path) -> Result<()> {
    let library = Library::open(root)?;
    let models = library.catalog.count()?;
    let blobs = library.storage.stats()?;

    println!("Models: {}", models);
    println!("Blobs:  {} ({} bytes)", blobs.blob_count, blobs.total_bytes);
    Ok(())
}

pub fn cleanup(root: &Path) -> Result<()> {
    let storage = StorageManager::new(root.join(PathsConfig::BLOBS_DIR_NAME));
    let removed = storage.cleanup_orphaned_temp_files();
    println!("Removed {} orphaned temp files", removed);
    Ok(())
}

/// Expand directories into the supported files beneath them.
///
/// Explicit file arguments are kept as given so unsupported ones show up as
/// failures instead of vanishing.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_supported(p))
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(BasicParser::supports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_expands_directories() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("prints").join("calibration");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join("prints").join("benchy.STL"), b"x").unwrap();
        std::fs::write(nested.join("cube.gcode"), b"x").unwrap();
        std::fs::write(nested.join("notes.txt"), b"x").unwrap();

        let files = collect_files(&[temp_dir.path().join("prints")]);

        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.ends_with("benchy.STL")));
        assert!(files.iter().any(|p| p.ends_with("cube.gcode")));
    }

    #[test]
    fn test_collect_files_keeps_explicit_files() {
        let explicit = PathBuf::from("/somewhere/readme.txt");
        assert_eq!(collect_files(&[explicit.clone()]), vec![explicit]);
    }

    #[test]
    fn test_cleanup_on_fresh_root() {
        let temp_dir = TempDir::new().unwrap();
        assert!(cleanup(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_stats_creates_empty_library() {
        let temp_dir = TempDir::new().unwrap();
        stats(temp_dir.path()).unwrap();
        assert!(temp_dir.path().join(PathsConfig::CATALOG_DB_NAME).exists());
    }
}
