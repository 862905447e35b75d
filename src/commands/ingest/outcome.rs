use tracing::{error, info, warn};

use crate::error::{ExtractionError, FieldParseError, PersistError};
use crate::model::{DocumentReport, ExamRecord, IngestCounts, NaturalKey};

/// Exactly one of these is produced for every document in a batch.
#[derive(Debug)]
pub enum DocumentOutcome {
    Stored {
        document: String,
        id: i64,
        record: ExamRecord,
        field_warnings: Vec<FieldParseError>,
    },
    DuplicateSkipped {
        document: String,
        key: NaturalKey,
        field_warnings: Vec<FieldParseError>,
    },
    ExtractionError {
        document: String,
        error: ExtractionError,
    },
    PersistError {
        document: String,
        error: PersistError,
    },
}

impl DocumentOutcome {
    pub fn document(&self) -> &str {
        match self {
            Self::Stored { document, .. }
            | Self::DuplicateSkipped { document, .. }
            | Self::ExtractionError { document, .. }
            | Self::PersistError { document, .. } => document,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Stored { .. } => "stored",
            Self::DuplicateSkipped { .. } => "duplicate_skipped",
            Self::ExtractionError { .. } => "extraction_error",
            Self::PersistError { .. } => "persist_error",
        }
    }

    pub fn field_warnings(&self) -> &[FieldParseError] {
        match self {
            Self::Stored { field_warnings, .. } | Self::DuplicateSkipped { field_warnings, .. } => {
                field_warnings.as_slice()
            }
            Self::ExtractionError { .. } | Self::PersistError { .. } => &[],
        }
    }

    pub fn log(&self) {
        match self {
            Self::Stored {
                document,
                id,
                record,
                ..
            } => info!(
                document = %document,
                id = *id,
                key = %record.key(),
                bmi_class = record.bmi_class().map(|class| class.as_str()).unwrap_or("-"),
                glucose_class = record.glucose_class().map(|class| class.as_str()).unwrap_or("-"),
                "stored exam record"
            ),
            Self::DuplicateSkipped { document, key, .. } => {
                info!(document = %document, key = %key, "exam already stored; skipped")
            }
            Self::ExtractionError { document, error } => {
                warn!(document = %document, error = %error, "extraction failed; document skipped")
            }
            Self::PersistError { document, error } => {
                error!(document = %document, error = %error, "failed to persist exam record")
            }
        }
    }

    pub fn to_report(&self) -> DocumentReport {
        let (record_id, key, reason) = match self {
            Self::Stored { id, record, .. } => (Some(*id), Some(record.key()), None),
            Self::DuplicateSkipped { key, .. } => (None, Some(key.clone()), None),
            Self::ExtractionError { error, .. } => (None, None, Some(error.to_string())),
            Self::PersistError { error, .. } => (None, None, Some(error.to_string())),
        };

        DocumentReport {
            document: self.document().to_string(),
            outcome: self.label().to_string(),
            record_id,
            key,
            reason,
            field_warnings: self
                .field_warnings()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

pub fn tally_outcomes(outcomes: &[DocumentOutcome]) -> IngestCounts {
    let mut counts = IngestCounts {
        document_count: outcomes.len(),
        ..IngestCounts::default()
    };

    for outcome in outcomes {
        match outcome {
            DocumentOutcome::Stored { .. } => counts.stored_count += 1,
            DocumentOutcome::DuplicateSkipped { .. } => counts.duplicate_count += 1,
            DocumentOutcome::ExtractionError { .. } => counts.extraction_error_count += 1,
            DocumentOutcome::PersistError { .. } => counts.persist_error_count += 1,
        }
        counts.field_warning_count += outcome.field_warnings().len();
    }

    counts
}
