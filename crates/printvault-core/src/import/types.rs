//! Import task and its stage machine.

use crate::catalog::{CatalogId, ParsedAsset};
use crate::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a task is in the pipeline.
///
/// Stages advance one step at a time in declaration order. Any non-terminal
/// stage may jump to `Failed`. `WaitingForThumbnail` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Reading,
    Hashing,
    CheckingDuplicate,
    Parsing,
    Inserting,
    /// Catalogued; thumbnail generation happens elsewhere.
    WaitingForThumbnail,
    Failed,
}

impl ImportStage {
    /// All stages in pipeline order.
    pub const ALL: [ImportStage; 7] = [
        ImportStage::Reading,
        ImportStage::Hashing,
        ImportStage::CheckingDuplicate,
        ImportStage::Parsing,
        ImportStage::Inserting,
        ImportStage::WaitingForThumbnail,
        ImportStage::Failed,
    ];

    /// Position in pipeline order.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            ImportStage::Reading => "Reading",
            ImportStage::Hashing => "Hashing",
            ImportStage::CheckingDuplicate => "Checking for duplicates",
            ImportStage::Parsing => "Parsing",
            ImportStage::Inserting => "Adding to catalog",
            ImportStage::WaitingForThumbnail => "Waiting for thumbnail",
            ImportStage::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ImportStage::WaitingForThumbnail | ImportStage::Failed)
    }

    /// Whether `self -> next` is a legal move.
    pub fn can_transition_to(self, next: ImportStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == ImportStage::Failed || next.ordinal() == self.ordinal() + 1
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One file moving through the import pipeline.
///
/// Owned by the queue until it fails (and is dropped) or succeeds (and is
/// handed out once by `poll_completed`).
pub struct ImportTask {
    source_path: PathBuf,
    extension: String,
    pub(super) data: Option<Vec<u8>>,
    pub(super) hash: String,
    stage: ImportStage,
    error: Option<String>,
    pub(super) asset: Option<ParsedAsset>,
    pub(super) catalog_id: Option<CatalogId>,
    is_duplicate: bool,
    pub(super) file_size: u64,
    pub(super) blob_path: Option<PathBuf>,
}

impl ImportTask {
    /// New task in `Reading`, not yet started.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let extension = detect_extension(&source_path);
        Self {
            source_path,
            extension,
            data: None,
            hash: String::new(),
            stage: ImportStage::Reading,
            error: None,
            asset: None,
            catalog_id: None,
            is_duplicate: false,
            file_size: 0,
            blob_path: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Lowercase extension, empty when the file has none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Content hash, empty until hashing completes.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn stage(&self) -> ImportStage {
        self.stage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn asset(&self) -> Option<&ParsedAsset> {
        self.asset.as_ref()
    }

    pub fn catalog_id(&self) -> Option<CatalogId> {
        self.catalog_id
    }

    pub fn is_duplicate(&self) -> bool {
        self.is_duplicate
    }

    /// Size of the source in bytes, captured when it was read.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Raw bytes still held by the task; zero once parsing has succeeded.
    pub fn buffered_bytes(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn blob_path(&self) -> Option<&Path> {
        self.blob_path.as_deref()
    }

    /// File stem, used as the catalog display name.
    pub fn display_name(&self) -> String {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }

    /// Move to `next`. The only place the stage is written.
    pub(super) fn transition(&mut self, next: ImportStage) -> Result<()> {
        if !self.stage.can_transition_to(next) {
            return Err(CatalogError::Other(format!(
                "illegal import stage transition {:?} -> {:?}",
                self.stage, next
            )));
        }
        self.stage = next;
        Ok(())
    }

    /// Record `err` and move to `Failed`, releasing any buffered bytes.
    pub(super) fn fail(&mut self, err: &CatalogError) {
        self.is_duplicate = err.is_duplicate();
        self.error = Some(err.to_string());
        self.data = None;
        if let Err(e) = self.transition(ImportStage::Failed) {
            tracing::debug!("{}: {}", self.source_path.display(), e);
        }
    }
}

impl fmt::Debug for ImportTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportTask")
            .field("source_path", &self.source_path)
            .field("extension", &self.extension)
            .field("buffered_bytes", &self.buffered_bytes())
            .field("hash", &self.hash)
            .field("stage", &self.stage)
            .field("error", &self.error)
            .field("catalog_id", &self.catalog_id)
            .field("is_duplicate", &self.is_duplicate)
            .finish()
    }
}

fn detect_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
