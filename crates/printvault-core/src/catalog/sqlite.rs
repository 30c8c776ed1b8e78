//! SQLite-backed catalog repository.

use super::traits::CatalogRepository;
use super::types::{AssetSummary, CatalogId, CatalogRecord};
use crate::{CatalogError, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = "SELECT id, hash, name, source_path, extension, file_size,
                                     summary_json, blob_path, added_at
                              FROM models";

/// Catalog stored in a single SQLite file.
pub struct SqliteCatalog {
    db_path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Create or open a catalog at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| CatalogError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path: Some(db_path),
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway catalog in memory.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            db_path: None,
            conn: Mutex::new(conn),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            ",
        )?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                source_path TEXT NOT NULL,
                extension TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                summary_json TEXT NOT NULL,
                blob_path TEXT,
                added_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_models_name ON models(name)",
            [],
        )?;

        Ok(())
    }

    /// Database file, `None` for in-memory catalogs.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CatalogError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    /// Get a record by id.
    pub fn get(&self, id: CatalogId) -> Result<Option<CatalogRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// All records, oldest first.
    pub fn list(&self) -> Result<Vec<CatalogRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM models", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete a record. Returns whether a row was removed.
    pub fn remove(&self, id: CatalogId) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM models WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

impl CatalogRepository for SqliteCatalog {
    fn find_by_hash(&self, hash: &str) -> Result<Option<CatalogRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("{} WHERE hash = ?1", SELECT_COLUMNS),
                params![hash],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn insert(&self, record: &CatalogRecord) -> Result<CatalogId> {
        let summary_json = serde_json::to_string(&record.summary)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO models (hash, name, source_path, extension, file_size,
                                 summary_json, blob_path, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.hash,
                record.name,
                record.source_path,
                record.extension,
                record.file_size as i64,
                summary_json,
                record.blob_path,
                record.added_at,
            ],
        )
        .map_err(|e| CatalogError::Persistence {
            message: e.to_string(),
        })?;

        let id = conn.last_insert_rowid();
        debug!("Inserted model {} as id {}", record.hash, id);
        Ok(id)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    let summary_json: String = row.get(6)?;
    let summary: AssetSummary = serde_json::from_str(&summary_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let file_size: i64 = row.get(5)?;

    Ok(CatalogRecord {
        id: Some(row.get(0)?),
        hash: row.get(1)?,
        name: row.get(2)?,
        source_path: row.get(3)?,
        extension: row.get(4)?,
        file_size: file_size.max(0) as u64,
        summary,
        blob_path: row.get(7)?,
        added_at: row.get(8)?,
    })
}
