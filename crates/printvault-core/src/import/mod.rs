//! Background import of model files into the catalog.
//!
//! [`ImportQueue`] owns the worker thread; [`ImportTask`] and [`ImportStage`]
//! describe a single file's progress through the pipeline.

mod pipeline;
mod progress;
mod queue;
mod types;

pub use progress::{ImportProgress, ProgressSnapshot};
pub use queue::ImportQueue;
pub use types::{ImportStage, ImportTask};
