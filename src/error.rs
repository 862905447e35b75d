//! Domain errors for the intake pipeline.
//!
//! Command plumbing stays on `anyhow`; these types exist so a batch can tell
//! one kind of per-document failure from another.

use thiserror::Error;

use crate::model::Field;

/// Document-level failure: the document is skipped and the batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("document could not be read: {0}")]
    Unreadable(String),

    #[error("document text is empty")]
    EmptyText,

    #[error("required field '{}' not found", .0.as_str())]
    MissingRequiredField(Field),
}

/// Storage failure other than a natural-key collision.
#[derive(Error, Debug)]
#[error("storage failure: {0}")]
pub struct PersistError(#[from] pub rusqlite::Error);

/// An optional field matched but its text could not be coerced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field '{}' could not parse '{raw}': {reason}", .field.as_str())]
pub struct FieldParseError {
    pub field: Field,
    pub raw: String,
    pub reason: String,
}
