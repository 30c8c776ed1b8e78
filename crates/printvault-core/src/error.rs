//! Error types for the printvault catalog.
//!
//! Every failure that crosses a public API in this crate is a `CatalogError`
//! value. Import tasks capture these as strings, the storage layer returns them
//! directly.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the catalog core.
#[derive(Debug, Error)]
pub enum CatalogError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Filesystem {operation} failed for {path}: {message}")]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Hash verification failed: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    // Import errors
    #[error("Duplicate of existing model '{existing_name}' ({hash})")]
    Duplicate { hash: String, existing_name: String },

    #[error("Failed to parse .{extension} file: {message}")]
    Parse { extension: String, message: String },

    #[error("Catalog insert failed: {message}")]
    Persistence { message: String },

    #[error("Cancelled")]
    Cancelled,

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CatalogError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CatalogError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a filesystem error for a named operation.
    pub fn filesystem(
        operation: &'static str,
        path: impl Into<PathBuf>,
        err: impl std::fmt::Display,
    ) -> Self {
        CatalogError::Filesystem {
            operation,
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Create a parse error for the given extension.
    pub fn parse(extension: &str, message: impl Into<String>) -> Self {
        CatalogError::Parse {
            extension: extension.to_string(),
            message: message.into(),
        }
    }

    /// Short, stable code for this error's category.
    ///
    /// Used as a log field and by front ends that map errors to icons.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Io { .. } => "io",
            CatalogError::Filesystem { .. } => "filesystem",
            CatalogError::HashMismatch { .. } => "hash_mismatch",
            CatalogError::Duplicate { .. } => "duplicate",
            CatalogError::Parse { .. } => "parse",
            CatalogError::Persistence { .. } | CatalogError::Database { .. } => "persistence",
            CatalogError::Cancelled => "cancelled",
            CatalogError::Json { .. } => "json",
            CatalogError::Config { .. } => "config",
            CatalogError::Other(_) => "other",
        }
    }

    /// Whether this error means the content is already in the catalog.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, CatalogError::Duplicate { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CatalogError::Duplicate {
            hash: "abcdef1234567890".into(),
            existing_name: "benchy".into(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate of existing model 'benchy' (abcdef1234567890)"
        );
    }

    #[test]
    fn test_hash_mismatch_mentions_verification() {
        let err = CatalogError::HashMismatch {
            expected: "00".into(),
            actual: "11".into(),
        };
        assert!(err.to_string().contains("verification failed"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CatalogError::Cancelled.kind(), "cancelled");
        assert_eq!(CatalogError::parse("stl", "bad header").kind(), "parse");
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(CatalogError::io_with_path(io, "/tmp/x").kind(), "io");
        assert_eq!(
            CatalogError::Persistence {
                message: "locked".into()
            }
            .kind(),
            "persistence"
        );
    }

    #[test]
    fn test_is_duplicate() {
        assert!(CatalogError::Duplicate {
            hash: "a".into(),
            existing_name: "b".into()
        }
        .is_duplicate());
        assert!(!CatalogError::Cancelled.is_duplicate());
    }
}
