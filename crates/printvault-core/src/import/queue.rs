//! Background import queue.
//!
//! One worker thread drains a FIFO of [`ImportTask`]s. The worker is started
//! lazily by `enqueue`, exits when the list is empty, and is joined before a
//! replacement is spawned, so there is never more than one.

use super::pipeline::TaskPipeline;
use super::progress::{ImportProgress, ProgressSnapshot};
use super::types::ImportTask;
use crate::cancel::CancellationToken;
use crate::catalog::{CatalogId, CatalogRepository, ContentParser};
use crate::config::ImportConfig;
use crate::storage::StorageManager;
use crate::{CatalogError, Result};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

type CompletionCallback = Arc<dyn Fn(CatalogId) + Send + Sync>;

/// Pending tasks plus whether a worker is committed to draining them.
///
/// Both live under one lock so the worker's "empty, exiting" decision and
/// `enqueue`'s append cannot interleave and strand a task.
#[derive(Default)]
struct PendingState {
    tasks: VecDeque<ImportTask>,
    worker_alive: bool,
}

struct QueueShared {
    pending: Mutex<PendingState>,
    completed: Mutex<Vec<ImportTask>>,
    progress: ImportProgress,
    cancel: CancellationToken,
    parser: Arc<dyn ContentParser>,
    repository: Arc<dyn CatalogRepository>,
    storage: Option<StorageManager>,
    on_complete: RwLock<Option<CompletionCallback>>,
}

/// Import queue with a single background worker.
///
/// # Example
///
/// ```rust,ignore
/// use printvault_core::{BasicParser, ImportQueue, SqliteCatalog};
/// use std::sync::Arc;
///
/// let catalog = Arc::new(SqliteCatalog::open("catalog.db")?);
/// let queue = ImportQueue::new(Arc::new(BasicParser), catalog);
///
/// queue.enqueue(["benchy.stl", "bracket.gcode"])?;
/// queue.wait();
///
/// for task in queue.poll_completed() {
///     println!("{} -> {:?}", task.display_name(), task.catalog_id());
/// }
/// ```
pub struct ImportQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ImportQueue {
    /// Queue that catalogues files in place.
    pub fn new(parser: Arc<dyn ContentParser>, repository: Arc<dyn CatalogRepository>) -> Self {
        Self::build(parser, repository, None)
    }

    /// Queue that also copies each file into `storage` before cataloguing it.
    pub fn with_storage(
        parser: Arc<dyn ContentParser>,
        repository: Arc<dyn CatalogRepository>,
        storage: StorageManager,
    ) -> Self {
        Self::build(parser, repository, Some(storage))
    }

    fn build(
        parser: Arc<dyn ContentParser>,
        repository: Arc<dyn CatalogRepository>,
        storage: Option<StorageManager>,
    ) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                pending: Mutex::new(PendingState::default()),
                completed: Mutex::new(Vec::new()),
                progress: ImportProgress::new(),
                cancel: CancellationToken::new(),
                parser,
                repository,
                storage,
                on_complete: RwLock::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> Option<&StorageManager> {
        self.shared.storage.as_ref()
    }

    /// Queue one task per path and make sure a worker is draining them.
    ///
    /// If a batch is already running the paths join it and its counters keep
    /// accumulating; otherwise the counters start over. Clears any pending
    /// cancellation. Fails only if the worker thread cannot be spawned, in
    /// which case the queued tasks are counted as failed.
    pub fn enqueue<I, P>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let tasks: Vec<ImportTask> = paths.into_iter().map(ImportTask::new).collect();
        if tasks.is_empty() {
            return Ok(());
        }
        let count = tasks.len();
        let progress = &self.shared.progress;

        let needs_worker = {
            let mut pending = lock(&self.shared.pending);
            if !pending.worker_alive {
                progress.reset();
            }
            pending.tasks.extend(tasks);
            progress.add_total(count);
            progress.set_active(true);
            self.shared.cancel.reset();

            let needs_worker = !pending.worker_alive;
            pending.worker_alive = true;
            needs_worker
        };

        info!("Queued {} files for import", count);

        if needs_worker {
            self.spawn_worker()?;
        }
        Ok(())
    }

    /// Ask the worker to stop. The task in flight finishes normally; every
    /// task after it is failed with "Cancelled" without being read.
    pub fn cancel(&self) {
        info!("Import cancellation requested");
        self.shared.cancel.cancel();
    }

    /// Whether a batch is in flight.
    pub fn is_active(&self) -> bool {
        self.shared.progress.is_active()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.progress.snapshot()
    }

    /// Take every task that reached `WaitingForThumbnail` since the last call.
    ///
    /// Failed tasks never show up here; they are only counted.
    pub fn poll_completed(&self) -> Vec<ImportTask> {
        std::mem::take(&mut *lock(&self.shared.completed))
    }

    /// Register a handler called with each new catalog id.
    ///
    /// Runs on the worker thread.
    pub fn set_on_complete(&self, callback: impl Fn(CatalogId) + Send + Sync + 'static) {
        let mut slot = self
            .shared
            .on_complete
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(callback));
    }

    /// Block until the current worker, if any, has drained the queue and exited.
    pub fn wait(&self) {
        let mut worker = lock(&self.worker);
        if let Some(handle) = worker.take() {
            join_worker(handle);
        }
    }

    fn spawn_worker(&self) -> Result<()> {
        let mut worker = lock(&self.worker);

        // The previous worker has already given up the queue; reap it.
        if let Some(previous) = worker.take() {
            join_worker(previous);
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(ImportConfig::WORKER_THREAD_NAME.to_string())
            .spawn(move || shared.run_worker());

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start import worker: {}", e);
                self.shared.abandon_pending(&CatalogError::Other(format!(
                    "import worker could not start: {}",
                    e
                )));
                Err(CatalogError::Io {
                    message: format!("failed to spawn import worker: {}", e),
                    path: None,
                    source: Some(e),
                })
            }
        }
    }
}

impl Drop for ImportQueue {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        self.wait();
    }
}

impl QueueShared {
    fn run_worker(&self) {
        debug!("Import worker started");
        let pipeline = TaskPipeline {
            parser: self.parser.as_ref(),
            repository: self.repository.as_ref(),
            storage: self.storage.as_ref(),
            progress: &self.progress,
        };

        let _exit_guard = WorkerExitGuard { shared: self };

        while let Some(mut task) = self.next_task() {
            if self.cancel.is_cancelled() {
                task.fail(&CatalogError::Cancelled);
                self.progress.record_finished(true);
                continue;
            }

            self.progress.set_current_file(&task.display_name());

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| pipeline.process(&mut task)));
            let id = match outcome {
                Ok(id) => id,
                Err(_) => {
                    error!("Import of {} panicked", task.source_path().display());
                    task.fail(&CatalogError::Other("import task panicked".to_string()));
                    None
                }
            };

            match id {
                Some(id) => {
                    lock(&self.completed).push(task);
                    self.progress.record_finished(false);
                    self.notify_complete(id);
                }
                None => self.progress.record_finished(true),
            }
        }

        debug!("Import worker stopped");
    }

    /// Pop the next task, or mark the worker gone and the batch inactive.
    fn next_task(&self) -> Option<ImportTask> {
        let mut pending = lock(&self.pending);
        let task = pending.tasks.pop_front();
        if task.is_none() {
            pending.worker_alive = false;
            self.progress.set_active(false);
        }
        task
    }

    fn notify_complete(&self, id: CatalogId) {
        let callback = self
            .on_complete
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(callback) = callback else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| callback(id))).is_err() {
            error!("Completion handler panicked for catalog id {}", id);
        }
    }

    /// Fail everything still pending. Used when no worker will run.
    fn abandon_pending(&self, err: &CatalogError) {
        let mut pending = lock(&self.pending);
        for mut task in pending.tasks.drain(..) {
            task.fail(err);
            self.progress.record_finished(true);
        }
        pending.worker_alive = false;
        self.progress.set_active(false);
    }
}

/// Releases the queue if the worker unwinds outside a task, so the next
/// `enqueue` spawns a fresh worker.
struct WorkerExitGuard<'a> {
    shared: &'a QueueShared,
}

impl Drop for WorkerExitGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Import worker stopped unexpectedly");
            self.shared.abandon_pending(&CatalogError::Other(
                "import worker stopped unexpectedly".to_string(),
            ));
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("Import worker thread panicked");
    }
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRecord, ParsedAsset};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullParser;

    impl ContentParser for NullParser {
        fn parse(&self, _bytes: &[u8], _extension: &str) -> Result<ParsedAsset> {
            Ok(ParsedAsset {
                vertex_count: 0,
                element_count: 0,
                bounds: None,
            })
        }
    }

    #[derive(Default)]
    struct CountingRepository {
        inserts: AtomicUsize,
    }

    impl CatalogRepository for CountingRepository {
        fn find_by_hash(&self, _hash: &str) -> Result<Option<CatalogRecord>> {
            Ok(None)
        }

        fn insert(&self, _record: &CatalogRecord) -> Result<CatalogId> {
            Ok(self.inserts.fetch_add(1, Ordering::SeqCst) as CatalogId + 1)
        }
    }

    fn queue() -> ImportQueue {
        ImportQueue::new(Arc::new(NullParser), Arc::new(CountingRepository::default()))
    }

    #[test]
    fn test_idle_queue() {
        let queue = queue();
        assert!(!queue.is_active());
        assert!(queue.poll_completed().is_empty());
        assert_eq!(queue.progress().total_files, 0);
        queue.wait();
    }

    #[test]
    fn test_empty_enqueue_is_noop() {
        let queue = queue();
        queue.enqueue(Vec::<PathBuf>::new()).unwrap();
        assert!(!queue.is_active());
        assert!(lock(&queue.worker).is_none());
    }

    #[test]
    fn test_missing_files_are_counted_not_returned() {
        let queue = queue();
        queue
            .enqueue(["/nonexistent/a.stl", "/nonexistent/b.stl"])
            .unwrap();
        queue.wait();

        let progress = queue.progress();
        assert_eq!(progress.total_files, 2);
        assert_eq!(progress.completed_files, 2);
        assert_eq!(progress.failed_files, 2);
        assert!(!progress.active);
        assert!(queue.poll_completed().is_empty());
    }

    #[test]
    fn test_new_batch_resets_counters() {
        let queue = queue();
        queue.enqueue(["/nonexistent/a.stl"]).unwrap();
        queue.wait();
        queue.enqueue(["/nonexistent/b.stl"]).unwrap();
        queue.wait();

        let progress = queue.progress();
        assert_eq!(progress.total_files, 1);
        assert_eq!(progress.completed_files, 1);
    }

    #[test]
    fn test_worker_panic_is_isolated() {
        struct PanickingParser;

        impl ContentParser for PanickingParser {
            fn parse(&self, _bytes: &[u8], _extension: &str) -> Result<ParsedAsset> {
                panic!("parser bug");
            }
        }

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("boom.stl");
        std::fs::write(&path, b"solid boom").unwrap();

        let queue = ImportQueue::new(
            Arc::new(PanickingParser),
            Arc::new(CountingRepository::default()),
        );
        queue.enqueue([path.clone(), path]).unwrap();
        queue.wait();

        let progress = queue.progress();
        assert_eq!(progress.completed_files, 2);
        assert_eq!(progress.failed_files, 2);
        assert!(!queue.is_active());
    }

    #[test]
    fn test_exit_guard_releases_queue_on_unwind() {
        let queue = queue();
        {
            let mut pending = lock(&queue.shared.pending);
            pending.tasks.push_back(ImportTask::new("/nonexistent/a.stl"));
            pending.tasks.push_back(ImportTask::new("/nonexistent/b.stl"));
            pending.worker_alive = true;
        }
        queue.shared.progress.add_total(2);
        queue.shared.progress.set_active(true);

        let shared = Arc::clone(&queue.shared);
        let result = thread::spawn(move || {
            let _guard = WorkerExitGuard { shared: &shared };
            panic!("worker bug");
        })
        .join();
        assert!(result.is_err());

        let pending = lock(&queue.shared.pending);
        assert!(pending.tasks.is_empty());
        assert!(!pending.worker_alive);
        drop(pending);

        let progress = queue.progress();
        assert!(!progress.active);
        assert_eq!(progress.completed_files, 2);
        assert_eq!(progress.failed_files, 2);
    }

    #[test]
    fn test_exit_guard_is_inert_on_normal_exit() {
        let queue = queue();
        lock(&queue.shared.pending).worker_alive = true;

        drop(WorkerExitGuard {
            shared: &queue.shared,
        });

        assert!(lock(&queue.shared.pending).worker_alive);
    }
}
