//! Catalog records and the collaborators the import pipeline depends on.
//!
//! The pipeline only sees the [`ContentParser`] and [`CatalogRepository`] traits.
//! [`SqliteCatalog`] is the bundled repository implementation.

mod sqlite;
mod traits;
mod types;

pub use sqlite::SqliteCatalog;
pub use traits::{CatalogRepository, ContentParser};
pub use types::{AssetSummary, BoundingBox, CatalogId, CatalogRecord, ParsedAsset};
