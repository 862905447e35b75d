//! SQLite-backed exam record store.
//!
//! The natural key (patient name, exam date) is guarded by a unique index, so
//! duplicate detection never depends on a read-before-write.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

mod db_setup;
mod exam_records;

pub use db_setup::DB_SCHEMA_VERSION;
pub use exam_records::{DateRange, InsertOutcome};

use db_setup::{configure_connection, ensure_schema};

/// Owns the process's single writer connection. Passed explicitly to every
/// operation that touches storage.
pub struct ExamStore {
    connection: Connection,
}

impl ExamStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)
            .with_context(|| format!("failed to prepare schema in {}", db_path.display()))?;
        debug!(path = %db_path.display(), "exam store ready");
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("failed to open in-memory db")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }
}
