use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension};

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.3.0";

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

/// Columns introduced by later form revisions; older databases gain them in place.
const ADDED_COLUMNS: &[&str] = &[
    "insurance_plan TEXT",
    "insurance_id TEXT",
    "attending_physician TEXT",
    "has_diabetes INTEGER NOT NULL DEFAULT 0",
    "had_chemotherapy INTEGER NOT NULL DEFAULT 0",
    "on_targeted_therapy INTEGER NOT NULL DEFAULT 0",
    "had_radiotherapy INTEGER NOT NULL DEFAULT 0",
    "smoking_status TEXT",
    "glucose_mgdl REAL",
    "source_document TEXT NOT NULL DEFAULT ''",
    "source_sha256 TEXT NOT NULL DEFAULT ''",
    "ingested_at TEXT NOT NULL DEFAULT ''",
];

/// Brings the schema up to date. Metadata is only written when something
/// changed, so opening an already-current database performs no writes.
pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    let created = !table_exists(connection, "exam_records")?;

    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS exam_records (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          patient_name TEXT NOT NULL,
          sex TEXT CHECK (sex IS NULL OR sex IN ('F', 'M')),
          age INTEGER CHECK (age IS NULL OR age >= 0),
          exam_date TEXT,
          weight_kg REAL,
          height_cm REAL,
          bmi REAL,
          is_restaging INTEGER NOT NULL DEFAULT 0,
          cancer_type TEXT
        );
        ",
    )?;

    let mut migrated = false;
    for column_definition in ADDED_COLUMNS {
        migrated |= ensure_column_exists(connection, "exam_records", column_definition)?;
    }

    connection
        .execute_batch(
            "
            CREATE UNIQUE INDEX IF NOT EXISTS idx_exam_records_natural_key
              ON exam_records(patient_name, IFNULL(exam_date, ''));
            CREATE INDEX IF NOT EXISTS idx_exam_records_exam_date ON exam_records(exam_date);
            ",
        )
        .context("failed to create natural key index on exam_records")?;

    let stored_version: Option<String> = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if created || migrated || stored_version.as_deref() != Some(DB_SCHEMA_VERSION) {
        connection.execute(
            "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            [DB_SCHEMA_VERSION],
        )?;
        touch_updated_at(connection)?;
    }

    Ok(())
}

fn table_exists(connection: &Connection, table_name: &str) -> Result<bool> {
    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table_name],
            |_| Ok(()),
        )
        .optional()
        .with_context(|| format!("failed to look up table {table_name}"))?
        .is_some();
    Ok(exists)
}

pub(super) fn touch_updated_at(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;
    Ok(())
}

fn ensure_column_exists(
    connection: &Connection,
    table_name: &str,
    column_definition: &str,
) -> Result<bool> {
    let Some(column_name) = column_definition.split_whitespace().next() else {
        bail!("invalid column definition: {column_definition}");
    };

    let pragma_sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let existing_name: String = row.get(1)?;
        if existing_name == column_name {
            return Ok(false);
        }
    }

    let alter_sql = format!("ALTER TABLE {table_name} ADD COLUMN {column_definition}");
    connection
        .execute(&alter_sql, [])
        .with_context(|| format!("failed to add column {column_name} on {table_name}"))?;

    Ok(true)
}
