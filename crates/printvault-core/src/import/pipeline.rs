//! Per-task stage pipeline.
//!
//! Drives one [`ImportTask`] through Reading -> Hashing -> CheckingDuplicate ->
//! Parsing -> Inserting -> WaitingForThumbnail, stopping at the first error.

use super::progress::ImportProgress;
use super::types::{ImportStage, ImportTask};
use crate::catalog::{CatalogId, CatalogRecord, CatalogRepository, ContentParser};
use crate::hashing::{compute_bytes, to_hex};
use crate::storage::StorageManager;
use crate::{CatalogError, Result};
use tracing::{debug, info, warn};

/// Borrowed collaborators for running tasks.
pub(super) struct TaskPipeline<'a> {
    pub parser: &'a dyn ContentParser,
    pub repository: &'a dyn CatalogRepository,
    pub storage: Option<&'a StorageManager>,
    pub progress: &'a ImportProgress,
}

impl TaskPipeline<'_> {
    /// Run every stage. On failure the task is left in `Failed` with its
    /// error recorded and `None` is returned.
    pub fn process(&self, task: &mut ImportTask) -> Option<CatalogId> {
        match self.run_stages(task) {
            Ok(id) => {
                info!(
                    "Imported {} as catalog id {} ({})",
                    task.source_path().display(),
                    id,
                    task.hash()
                );
                Some(id)
            }
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    "Import of {} failed: {}",
                    task.source_path().display(),
                    e
                );
                task.fail(&e);
                self.progress.set_stage(ImportStage::Failed);
                None
            }
        }
    }

    fn run_stages(&self, task: &mut ImportTask) -> Result<CatalogId> {
        self.progress.set_stage(ImportStage::Reading);
        self.read(task)?;

        self.enter(task, ImportStage::Hashing)?;
        self.hash(task)?;

        self.enter(task, ImportStage::CheckingDuplicate)?;
        self.check_duplicate(task)?;

        self.enter(task, ImportStage::Parsing)?;
        self.parse(task)?;

        self.enter(task, ImportStage::Inserting)?;
        let id = self.insert(task)?;

        self.enter(task, ImportStage::WaitingForThumbnail)?;
        Ok(id)
    }

    fn enter(&self, task: &mut ImportTask, stage: ImportStage) -> Result<()> {
        task.transition(stage)?;
        self.progress.set_stage(stage);
        Ok(())
    }

    fn read(&self, task: &mut ImportTask) -> Result<()> {
        let path = task.source_path();
        let data = std::fs::read(path).map_err(|e| CatalogError::Io {
            message: format!("failed to read file: {}", e),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;

        task.file_size = data.len() as u64;
        task.data = Some(data);
        Ok(())
    }

    fn hash(&self, task: &mut ImportTask) -> Result<()> {
        let data = task.data.as_deref().unwrap_or_default();
        if data.is_empty() {
            return Err(CatalogError::Io {
                message: "empty file has no content identity".to_string(),
                path: Some(task.source_path().to_path_buf()),
                source: None,
            });
        }

        task.hash = to_hex(compute_bytes(data));
        debug!("{} hashed to {}", task.source_path().display(), task.hash);
        Ok(())
    }

    fn check_duplicate(&self, task: &ImportTask) -> Result<()> {
        let existing = self
            .repository
            .find_by_hash(task.hash())
            .map_err(into_persistence)?;

        match existing {
            Some(record) => Err(CatalogError::Duplicate {
                hash: task.hash().to_string(),
                existing_name: record.name,
            }),
            None => Ok(()),
        }
    }

    fn parse(&self, task: &mut ImportTask) -> Result<()> {
        let data = task.data.take().unwrap_or_default();

        let asset = self
            .parser
            .parse(&data, task.extension())
            .map_err(|e| match e {
                CatalogError::Parse { .. } => e,
                other => CatalogError::parse(task.extension(), other.to_string()),
            })?;

        // The parsed asset is what we keep; the raw bytes go now.
        drop(data);
        task.asset = Some(asset);
        Ok(())
    }

    fn insert(&self, task: &mut ImportTask) -> Result<CatalogId> {
        if let Some(storage) = self.storage {
            let blob = storage.store_file(task.source_path(), task.hash(), task.extension())?;
            task.blob_path = Some(blob);
        }

        let record = CatalogRecord {
            id: None,
            hash: task.hash().to_string(),
            name: task.display_name(),
            source_path: task.source_path().display().to_string(),
            extension: task.extension().to_string(),
            file_size: task.file_size(),
            summary: task.asset().map(|a| a.summary()).unwrap_or_default(),
            blob_path: task.blob_path().map(|p| p.display().to_string()),
            added_at: chrono::Utc::now().to_rfc3339(),
        };

        let id = self.repository.insert(&record).map_err(into_persistence)?;
        task.catalog_id = Some(id);
        Ok(id)
    }
}

fn into_persistence(err: CatalogError) -> CatalogError {
    match err {
        CatalogError::Persistence { .. } => err,
        other => CatalogError::Persistence {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ParsedAsset, SqliteCatalog};
    use crate::parser::BasicParser;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const TRIANGLE_OBJ: &[u8] = b"v 0 0 0\nv 10 0 0\nv 0 10 0\nf 1 2 3\n";

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    struct FailingParser;

    impl ContentParser for FailingParser {
        fn parse(&self, _bytes: &[u8], _extension: &str) -> Result<ParsedAsset> {
            Err(CatalogError::Other("decoder crashed".into()))
        }
    }

    #[test]
    fn test_successful_task_reaches_waiting_for_thumbnail() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_file(temp_dir.path(), "triangle.obj", TRIANGLE_OBJ);
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let progress = ImportProgress::new();
        let pipeline = TaskPipeline {
            parser: &BasicParser,
            repository: &catalog,
            storage: None,
            progress: &progress,
        };

        let mut task = ImportTask::new(&source);
        let id = pipeline.process(&mut task).unwrap();

        assert_eq!(task.stage(), ImportStage::WaitingForThumbnail);
        assert_eq!(task.catalog_id(), Some(id));
        assert_eq!(task.buffered_bytes(), 0);
        assert_eq!(task.file_size(), TRIANGLE_OBJ.len() as u64);
        assert_eq!(task.asset().unwrap().vertex_count, 3);

        let record = catalog.get(id).unwrap().unwrap();
        assert_eq!(record.name, "triangle");
        assert_eq!(record.hash, task.hash());
        assert_eq!(record.summary.dimensions, Some([10.0, 10.0, 0.0]));
        assert_eq!(progress.current_stage(), ImportStage::WaitingForThumbnail);
    }

    #[test]
    fn test_unreadable_file_fails_in_reading() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let progress = ImportProgress::new();
        let pipeline = TaskPipeline {
            parser: &BasicParser,
            repository: &catalog,
            storage: None,
            progress: &progress,
        };

        let mut task = ImportTask::new("/nonexistent/model.stl");
        assert!(pipeline.process(&mut task).is_none());

        assert_eq!(task.stage(), ImportStage::Failed);
        assert!(task.error().unwrap().contains("failed to read file"));
        assert!(task.hash().is_empty());
    }

    #[test]
    fn test_empty_file_fails_without_parsing() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_file(temp_dir.path(), "empty.stl", b"");
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let progress = ImportProgress::new();
        let pipeline = TaskPipeline {
            parser: &BasicParser,
            repository: &catalog,
            storage: None,
            progress: &progress,
        };

        let mut task = ImportTask::new(&source);
        assert!(pipeline.process(&mut task).is_none());

        let error = task.error().unwrap();
        assert!(error.contains("empty file has no content identity"));
        assert!(!error.contains("Failed to parse"));
        assert!(task.hash().is_empty());
    }

    #[test]
    fn test_non_parse_errors_are_reported_as_parse() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_file(temp_dir.path(), "triangle.obj", TRIANGLE_OBJ);
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let progress = ImportProgress::new();
        let pipeline = TaskPipeline {
            parser: &FailingParser,
            repository: &catalog,
            storage: None,
            progress: &progress,
        };

        let mut task = ImportTask::new(&source);
        assert!(pipeline.process(&mut task).is_none());

        let error = task.error().unwrap();
        assert!(error.contains("Failed to parse .obj"));
        assert!(error.contains("decoder crashed"));
        assert_eq!(catalog.count().unwrap(), 0);
    }

    #[test]
    fn test_storage_commits_blob_before_insert() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_file(temp_dir.path(), "triangle.obj", TRIANGLE_OBJ);
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let storage = StorageManager::new(temp_dir.path().join("blobs"));
        let progress = ImportProgress::new();
        let pipeline = TaskPipeline {
            parser: &BasicParser,
            repository: &catalog,
            storage: Some(&storage),
            progress: &progress,
        };

        let mut task = ImportTask::new(&source);
        let id = pipeline.process(&mut task).unwrap();

        let blob = storage.blob_path(task.hash(), "obj");
        assert_eq!(task.blob_path(), Some(blob.as_path()));
        assert_eq!(std::fs::read(&blob).unwrap(), TRIANGLE_OBJ);

        let record = catalog.get(id).unwrap().unwrap();
        assert_eq!(record.blob_path, Some(blob.display().to_string()));
    }
}
