//! Batch cancellation flag for the import worker.
//!
//! The queue raises the flag from any thread; the worker reads it only between
//! tasks, so a file already being read, parsed or inserted always finishes.
//! Starting a new batch lowers it again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "stop after the current file" flag.
///
/// Clones observe the same flag.
///
/// # Example
///
/// ```
/// use printvault_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
///
/// token.cancel();
/// assert!(worker_view.is_cancelled());
///
/// // Next batch
/// token.reset();
/// assert!(!worker_view.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the worker to stop before its next task.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Lower the flag for a new batch.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}
