//! Printvault Core - content-addressed catalog for 3D print files.
//!
//! Imports STL, OBJ and G-code files in the background, deduplicates them by
//! content hash, and records each new model in a catalog. Committed files can
//! be kept in a sharded blob store written with a temp-file + verify + rename
//! protocol so a crash never leaves a partial blob in place.
//!
//! # Example
//!
//! ```rust,ignore
//! use printvault_core::{BasicParser, ImportQueue, SqliteCatalog, StorageManager};
//! use std::sync::Arc;
//!
//! fn main() -> printvault_core::Result<()> {
//!     let storage = StorageManager::new("/path/to/library/blobs");
//!     storage.cleanup_orphaned_temp_files();
//!
//!     let catalog = Arc::new(SqliteCatalog::open("/path/to/library/catalog.db")?);
//!     let queue = ImportQueue::with_storage(Arc::new(BasicParser), catalog, storage);
//!
//!     queue.set_on_complete(|id| println!("catalogued model {}", id));
//!     queue.enqueue(["benchy.stl", "calibration_cube.gcode"])?;
//!     queue.wait();
//!
//!     let progress = queue.progress();
//!     println!("{} imported, {} failed", progress.succeeded_files(), progress.failed_files);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hashing;
pub mod import;
pub mod parser;
pub mod storage;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use catalog::{
    AssetSummary, BoundingBox, CatalogId, CatalogRecord, CatalogRepository, ContentParser,
    ParsedAsset, SqliteCatalog,
};
pub use error::{CatalogError, Result};
pub use import::{ImportProgress, ImportQueue, ImportStage, ImportTask, ProgressSnapshot};
pub use parser::BasicParser;
pub use storage::{StorageManager, StorageStats};
