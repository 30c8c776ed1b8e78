//! Collaborator traits consumed by the import pipeline.

use super::types::{CatalogId, CatalogRecord, ParsedAsset};
use crate::error::Result;

/// Format-specific decoder.
///
/// Implementations must not keep the input buffer past the call; the pipeline
/// drops it as soon as parsing succeeds.
pub trait ContentParser: Send + Sync {
    /// Decode `bytes` as a file with the given lowercase extension.
    ///
    /// Failures should be `CatalogError::Parse`.
    fn parse(&self, bytes: &[u8], extension: &str) -> Result<ParsedAsset>;
}

/// Catalog storage keyed by content hash.
pub trait CatalogRepository: Send + Sync {
    /// Look up a record by content hash.
    fn find_by_hash(&self, hash: &str) -> Result<Option<CatalogRecord>>;

    /// Insert a new record and return its id.
    ///
    /// The hash is the uniqueness key; inserting a hash twice is an error.
    fn insert(&self, record: &CatalogRecord) -> Result<CatalogId>;
}
