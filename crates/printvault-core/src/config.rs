//! Centralized configuration for the printvault catalog.
//!
//! Constants for the import queue, the blob store layout and default paths.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "printvault";
}

/// Configuration for the import queue.
pub struct ImportConfig;

impl ImportConfig {
    /// Capacity of the current-file display buffer, in bytes.
    pub const CURRENT_FILE_NAME_CAPACITY: usize = 256;
    /// How often front ends should poll progress.
    pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(250);
    /// Name given to the background worker thread.
    pub const WORKER_THREAD_NAME: &'static str = "import-worker";
}

/// Blob store layout.
pub struct StorageConfig;

impl StorageConfig {
    /// Scratch directory under the store root.
    pub const TEMP_DIR_NAME: &'static str = ".tmp";
    /// Prefix for in-flight temp files inside the scratch directory.
    pub const TEMP_FILE_PREFIX: &'static str = "import_";
    /// Shortest hash that can be sharded.
    pub const MIN_HASH_LEN: usize = 4;
    /// Characters of the hash per shard level.
    pub const SHARD_WIDTH: usize = 2;
    /// Read chunk size for copies and streaming hashes (1MB).
    pub const COPY_CHUNK_SIZE: usize = 1024 * 1024;
}

/// Shared directory and file names under the library root.
pub struct PathsConfig;

impl PathsConfig {
    pub const BLOBS_DIR_NAME: &'static str = "blobs";
    pub const CATALOG_DB_NAME: &'static str = "catalog.db";
}
