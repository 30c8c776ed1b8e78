//! Lock-free batch progress shared between the worker and its callers.
//!
//! Each counter is its own atomic; readers never lock them and there is no
//! guarantee two counters are read at the same instant. Good enough for a
//! progress bar.

use super::types::ImportStage;
use crate::config::ImportConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// Live counters for the current batch.
pub struct ImportProgress {
    total_files: AtomicUsize,
    completed_files: AtomicUsize,
    failed_files: AtomicUsize,
    active: AtomicBool,
    current_stage: AtomicU8,
    current_file_name: RwLock<String>,
}

impl ImportProgress {
    pub fn new() -> Self {
        Self {
            total_files: AtomicUsize::new(0),
            completed_files: AtomicUsize::new(0),
            failed_files: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            current_stage: AtomicU8::new(ImportStage::Reading.ordinal()),
            current_file_name: RwLock::new(String::with_capacity(
                ImportConfig::CURRENT_FILE_NAME_CAPACITY,
            )),
        }
    }

    pub fn total_files(&self) -> usize {
        self.total_files.load(Ordering::Acquire)
    }

    /// Finished tasks, successful or not.
    pub fn completed_files(&self) -> usize {
        self.completed_files.load(Ordering::Acquire)
    }

    pub fn failed_files(&self) -> usize {
        self.failed_files.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn current_stage(&self) -> ImportStage {
        ImportStage::from_ordinal(self.current_stage.load(Ordering::Relaxed))
            .unwrap_or(ImportStage::Reading)
    }

    pub fn current_file_name(&self) -> String {
        self.current_file_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy every field out for display.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_files: self.total_files(),
            completed_files: self.completed_files(),
            failed_files: self.failed_files(),
            active: self.is_active(),
            current_stage: self.current_stage(),
            current_file_name: self.current_file_name(),
        }
    }

    /// Start a new batch baseline.
    pub(super) fn reset(&self) {
        self.total_files.store(0, Ordering::Release);
        self.completed_files.store(0, Ordering::Release);
        self.failed_files.store(0, Ordering::Release);
        self.current_stage
            .store(ImportStage::Reading.ordinal(), Ordering::Relaxed);
        self.set_current_file("");
    }

    pub(super) fn add_total(&self, count: usize) {
        self.total_files.fetch_add(count, Ordering::AcqRel);
    }

    pub(super) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub(super) fn set_stage(&self, stage: ImportStage) {
        self.current_stage.store(stage.ordinal(), Ordering::Relaxed);
    }

    /// Count a resolved task. `failed` is bumped before `completed` so a
    /// reader that sees the last completion also sees its failure.
    pub(super) fn record_finished(&self, failed: bool) {
        if failed {
            self.failed_files.fetch_add(1, Ordering::AcqRel);
        }
        self.completed_files.fetch_add(1, Ordering::AcqRel);
    }

    /// Replace the display name, truncated to the buffer capacity.
    pub(super) fn set_current_file(&self, name: &str) {
        let name = truncate_at_char_boundary(name, ImportConfig::CURRENT_FILE_NAME_CAPACITY);
        let mut buffer = self
            .current_file_name
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        buffer.clear();
        buffer.push_str(name);
    }
}

impl Default for ImportProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ImportProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub active: bool,
    pub current_stage: ImportStage,
    pub current_file_name: String,
}

impl ProgressSnapshot {
    /// Completed share of the batch (0.0-1.0).
    pub fn fraction(&self) -> f32 {
        if self.total_files == 0 {
            1.0
        } else {
            (self.completed_files as f32 / self.total_files as f32).min(1.0)
        }
    }

    pub fn succeeded_files(&self) -> usize {
        self.completed_files.saturating_sub(self.failed_files)
    }
}

fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress_is_idle() {
        let progress = ImportProgress::new();
        let snapshot = progress.snapshot();

        assert_eq!(snapshot.total_files, 0);
        assert!(!snapshot.active);
        assert_eq!(snapshot.current_stage, ImportStage::Reading);
        assert_eq!(snapshot.fraction(), 1.0);
    }

    #[test]
    fn test_record_finished() {
        let progress = ImportProgress::new();
        progress.add_total(3);
        progress.record_finished(false);
        progress.record_finished(true);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.completed_files, 2);
        assert_eq!(snapshot.failed_files, 1);
        assert_eq!(snapshot.succeeded_files(), 1);
        assert!((snapshot.fraction() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_counters() {
        let progress = ImportProgress::new();
        progress.add_total(2);
        progress.record_finished(true);
        progress.set_current_file("benchy");
        progress.set_stage(ImportStage::Parsing);

        progress.reset();

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.total_files, 0);
        assert_eq!(snapshot.completed_files, 0);
        assert_eq!(snapshot.failed_files, 0);
        assert_eq!(snapshot.current_file_name, "");
        assert_eq!(snapshot.current_stage, ImportStage::Reading);
    }

    #[test]
    fn test_current_file_name_is_bounded() {
        let progress = ImportProgress::new();
        let long_name = "x".repeat(ImportConfig::CURRENT_FILE_NAME_CAPACITY * 2);

        progress.set_current_file(&long_name);

        assert_eq!(
            progress.current_file_name().len(),
            ImportConfig::CURRENT_FILE_NAME_CAPACITY
        );
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // "é" is two bytes; cutting at 3 must back off to 2.
        assert_eq!(truncate_at_char_boundary("éé", 3), "é");
        assert_eq!(truncate_at_char_boundary("short", 10), "short");
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let progress = ImportProgress::new();
        progress.set_stage(ImportStage::CheckingDuplicate);

        let json = serde_json::to_value(progress.snapshot()).unwrap();
        assert_eq!(json["currentStage"], "checking_duplicate");
        assert_eq!(json["completedFiles"], 0);
    }
}
