use anyhow::Result;
use tracing::{debug, warn};

use crate::cli::MissingSexPolicy;
use crate::error::{ExtractionError, FieldParseError};
use crate::model::{ExamRecord, RecordProvenance};
use crate::store::{ExamStore, InsertOutcome};
use crate::util::now_utc_string;

use super::field_rules::RuleSet;
use super::outcome::DocumentOutcome;
use super::record_assembly::assemble_record;
use super::text_extract::{SourceDocument, TextExtractor};

#[derive(Debug)]
pub struct ExtractedRecord {
    pub record: ExamRecord,
    pub field_warnings: Vec<FieldParseError>,
}

/// Document bytes in, one outcome out. Holds no storage state of its own.
#[derive(Debug)]
pub struct IngestPipeline {
    extractor: TextExtractor,
    rules: RuleSet,
    missing_sex: MissingSexPolicy,
}

impl IngestPipeline {
    pub fn new(extractor: TextExtractor, missing_sex: MissingSexPolicy) -> Result<Self> {
        Ok(Self {
            extractor,
            rules: RuleSet::new()?,
            missing_sex,
        })
    }

    pub fn extract_record(
        &self,
        document: &SourceDocument,
    ) -> Result<ExtractedRecord, ExtractionError> {
        let text = self.extractor.extract_text(document)?;
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyText);
        }
        debug!(
            document = %document.name,
            chars = text.chars().count(),
            "extracted document text"
        );

        let fields = self.rules.extract(&text)?;
        for parse_error in fields.parse_errors() {
            warn!(
                document = %document.name,
                field = parse_error.field.as_str(),
                raw = %parse_error.raw,
                reason = %parse_error.reason,
                "field text could not be parsed; using default"
            );
        }

        let record = assemble_record(&fields, self.missing_sex)?;

        Ok(ExtractedRecord {
            record,
            field_warnings: fields.parse_errors().to_vec(),
        })
    }

    /// Extraction, classification and the store attempt for one document.
    /// Never fails as a whole; every failure becomes the returned outcome.
    pub fn ingest_document(
        &self,
        store: &mut ExamStore,
        document: &SourceDocument,
    ) -> DocumentOutcome {
        let extracted = match self.extract_record(document) {
            Ok(extracted) => extracted,
            Err(error) => {
                return DocumentOutcome::ExtractionError {
                    document: document.name.clone(),
                    error,
                };
            }
        };

        let provenance = RecordProvenance {
            source_document: document.name.clone(),
            source_sha256: document.sha256(),
            ingested_at: now_utc_string(),
        };

        match store.upsert_if_absent(&extracted.record, &provenance) {
            Ok(InsertOutcome::Stored { id }) => DocumentOutcome::Stored {
                document: document.name.clone(),
                id,
                record: extracted.record,
                field_warnings: extracted.field_warnings,
            },
            Ok(InsertOutcome::DuplicateSkipped(key)) => DocumentOutcome::DuplicateSkipped {
                document: document.name.clone(),
                key,
                field_warnings: extracted.field_warnings,
            },
            Err(error) => DocumentOutcome::PersistError {
                document: document.name.clone(),
                error,
            },
        }
    }
}
