use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Row, named_params, params};
use tracing::debug;

use super::ExamStore;
use super::db_setup::touch_updated_at;
use crate::error::PersistError;
use crate::model::{ExamRecord, NaturalKey, RecordProvenance, Sex, StoredExam};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored { id: i64 },
    DuplicateSkipped(NaturalKey),
}

/// Inclusive bounds on `exam_date`. Records without a date only appear when
/// both bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const INSERT_EXAM_SQL: &str = "
    INSERT INTO exam_records(
      patient_name, sex, age, exam_date,
      insurance_plan, insurance_id, attending_physician,
      has_diabetes, had_chemotherapy, on_targeted_therapy, had_radiotherapy,
      smoking_status, weight_kg, height_cm, bmi, glucose_mgdl,
      is_restaging, cancer_type,
      source_document, source_sha256, ingested_at
    )
    VALUES(
      :patient_name, :sex, :age, :exam_date,
      :insurance_plan, :insurance_id, :attending_physician,
      :has_diabetes, :had_chemotherapy, :on_targeted_therapy, :had_radiotherapy,
      :smoking_status, :weight_kg, :height_cm, :bmi, :glucose_mgdl,
      :is_restaging, :cancer_type,
      :source_document, :source_sha256, :ingested_at
    )
";

const SELECT_EXAMS_SQL: &str = "
    SELECT
      id, patient_name, sex, age, exam_date,
      insurance_plan, insurance_id, attending_physician,
      has_diabetes, had_chemotherapy, on_targeted_therapy, had_radiotherapy,
      smoking_status, weight_kg, height_cm, bmi, glucose_mgdl,
      is_restaging, cancer_type,
      source_document, source_sha256, ingested_at
    FROM exam_records
    WHERE (:from IS NULL OR exam_date >= :from)
      AND (:to IS NULL OR exam_date <= :to)
    ORDER BY exam_date IS NULL, exam_date, id
";

impl ExamStore {
    /// Inserts the record unless its natural key is already present.
    ///
    /// Each call runs in its own transaction and commits before returning.
    pub fn upsert_if_absent(
        &mut self,
        record: &ExamRecord,
        provenance: &RecordProvenance,
    ) -> Result<InsertOutcome, PersistError> {
        let tx = self.connection.transaction()?;

        let inserted = tx.execute(
            INSERT_EXAM_SQL,
            named_params! {
                ":patient_name": record.patient_name,
                ":sex": record.sex.map(Sex::as_str),
                ":age": record.age,
                ":exam_date": record.exam_date,
                ":insurance_plan": record.insurance_plan,
                ":insurance_id": record.insurance_id,
                ":attending_physician": record.attending_physician,
                ":has_diabetes": record.has_diabetes,
                ":had_chemotherapy": record.had_chemotherapy,
                ":on_targeted_therapy": record.on_targeted_therapy,
                ":had_radiotherapy": record.had_radiotherapy,
                ":smoking_status": record.smoking_status,
                ":weight_kg": record.weight_kg,
                ":height_cm": record.height_cm,
                ":bmi": record.bmi,
                ":glucose_mgdl": record.glucose_mgdl,
                ":is_restaging": record.is_restaging,
                ":cancer_type": record.cancer_type,
                ":source_document": provenance.source_document,
                ":source_sha256": provenance.source_sha256,
                ":ingested_at": provenance.ingested_at,
            },
        );

        match inserted {
            Ok(_) => {
                let id = tx.last_insert_rowid();
                touch_updated_at(&tx)?;
                tx.commit()?;
                Ok(InsertOutcome::Stored { id })
            }
            Err(error) if is_unique_violation(&error) => {
                debug!(key = %record.key(), "natural key already stored");
                Ok(InsertOutcome::DuplicateSkipped(record.key()))
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn list_records(&self, range: DateRange) -> Result<Vec<StoredExam>, PersistError> {
        let mut statement = self.connection.prepare(SELECT_EXAMS_SQL)?;
        let rows = statement.query_map(
            named_params! {
                ":from": range.from,
                ":to": range.to,
            },
            stored_exam_from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Removing an id that does not exist is not an error; the count is zero.
    pub fn delete_by_id(&mut self, id: i64) -> Result<usize, PersistError> {
        let tx = self.connection.transaction()?;
        let removed = tx.execute("DELETE FROM exam_records WHERE id = ?1", params![id])?;
        if removed > 0 {
            touch_updated_at(&tx)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Removes every exam stored under exactly this patient name.
    pub fn delete_by_name(&mut self, patient_name: &str) -> Result<usize, PersistError> {
        let tx = self.connection.transaction()?;
        let removed = tx.execute(
            "DELETE FROM exam_records WHERE patient_name = ?1",
            params![patient_name],
        )?;
        if removed > 0 {
            touch_updated_at(&tx)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    pub fn count_records(&self) -> Result<i64, PersistError> {
        let count = self
            .connection
            .query_row("SELECT COUNT(*) FROM exam_records", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn metadata_value(&self, key: &str) -> Result<Option<String>, PersistError> {
        let value = self
            .connection
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn stored_exam_from_row(row: &Row<'_>) -> rusqlite::Result<StoredExam> {
    let sex: Option<String> = row.get("sex")?;

    Ok(StoredExam {
        id: row.get("id")?,
        record: ExamRecord {
            patient_name: row.get("patient_name")?,
            sex: sex.as_deref().and_then(Sex::from_code),
            age: row.get("age")?,
            exam_date: row.get("exam_date")?,
            insurance_plan: row.get("insurance_plan")?,
            insurance_id: row.get("insurance_id")?,
            attending_physician: row.get("attending_physician")?,
            has_diabetes: row.get("has_diabetes")?,
            had_chemotherapy: row.get("had_chemotherapy")?,
            on_targeted_therapy: row.get("on_targeted_therapy")?,
            had_radiotherapy: row.get("had_radiotherapy")?,
            smoking_status: row.get("smoking_status")?,
            weight_kg: row.get("weight_kg")?,
            height_cm: row.get("height_cm")?,
            bmi: row.get("bmi")?,
            glucose_mgdl: row.get("glucose_mgdl")?,
            is_restaging: row.get("is_restaging")?,
            cancer_type: row.get("cancer_type")?,
        },
        provenance: RecordProvenance {
            source_document: row.get("source_document")?,
            source_sha256: row.get("source_sha256")?,
            ingested_at: row.get("ingested_at")?,
        },
    })
}
