use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classify::{BmiClass, GlucoseClass, bmi_class, glucose_class};

/// Declared fields of an exam record, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PatientName,
    Sex,
    Age,
    ExamDate,
    InsurancePlan,
    InsuranceId,
    AttendingPhysician,
    HasDiabetes,
    HadChemotherapy,
    OnTargetedTherapy,
    HadRadiotherapy,
    SmokingStatus,
    WeightKg,
    HeightCm,
    Bmi,
    GlucoseMgdl,
    IsRestaging,
    CancerType,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::PatientName,
        Field::Sex,
        Field::Age,
        Field::ExamDate,
        Field::InsurancePlan,
        Field::InsuranceId,
        Field::AttendingPhysician,
        Field::HasDiabetes,
        Field::HadChemotherapy,
        Field::OnTargetedTherapy,
        Field::HadRadiotherapy,
        Field::SmokingStatus,
        Field::WeightKg,
        Field::HeightCm,
        Field::Bmi,
        Field::GlucoseMgdl,
        Field::IsRestaging,
        Field::CancerType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::PatientName => "patient_name",
            Field::Sex => "sex",
            Field::Age => "age",
            Field::ExamDate => "exam_date",
            Field::InsurancePlan => "insurance_plan",
            Field::InsuranceId => "insurance_id",
            Field::AttendingPhysician => "attending_physician",
            Field::HasDiabetes => "has_diabetes",
            Field::HadChemotherapy => "had_chemotherapy",
            Field::OnTargetedTherapy => "on_targeted_therapy",
            Field::HadRadiotherapy => "had_radiotherapy",
            Field::SmokingStatus => "smoking_status",
            Field::WeightKg => "weight_kg",
            Field::HeightCm => "height_cm",
            Field::Bmi => "bmi",
            Field::GlucoseMgdl => "glucose_mgdl",
            Field::IsRestaging => "is_restaging",
            Field::CancerType => "cancer_type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Female => "F",
            Sex::Male => "M",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(Sex::Female),
            "M" => Some(Sex::Male),
            _ => None,
        }
    }
}

/// Canonical exam record. Immutable once assembled.
///
/// The clinical classes are not stored here; they are derived from `bmi` and
/// `glucose_mgdl` every time they are asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamRecord {
    pub patient_name: String,
    pub sex: Option<Sex>,
    pub age: Option<u32>,
    pub exam_date: Option<NaiveDate>,
    pub insurance_plan: Option<String>,
    pub insurance_id: Option<String>,
    pub attending_physician: Option<String>,
    pub has_diabetes: bool,
    pub had_chemotherapy: bool,
    pub on_targeted_therapy: bool,
    pub had_radiotherapy: bool,
    pub smoking_status: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub bmi: Option<f64>,
    pub glucose_mgdl: Option<f64>,
    pub is_restaging: bool,
    pub cancer_type: Option<String>,
}

impl ExamRecord {
    pub fn key(&self) -> NaturalKey {
        NaturalKey {
            patient_name: self.patient_name.clone(),
            exam_date: self.exam_date,
        }
    }

    pub fn bmi_class(&self) -> Option<BmiClass> {
        bmi_class(self.bmi)
    }

    pub fn glucose_class(&self) -> Option<GlucoseClass> {
        glucose_class(self.glucose_mgdl)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NaturalKey {
    pub patient_name: String,
    pub exam_date: Option<NaiveDate>,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exam_date {
            Some(date) => write!(f, "{} @ {}", self.patient_name, date),
            None => write!(f, "{} @ (no exam date)", self.patient_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordProvenance {
    pub source_document: String,
    pub source_sha256: String,
    pub ingested_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredExam {
    pub id: i64,
    pub record: ExamRecord,
    pub provenance: RecordProvenance,
}

/// Flat view handed to listing and export consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ExamRow {
    pub id: i64,
    #[serde(flatten)]
    pub record: ExamRecord,
    pub bmi_class: Option<BmiClass>,
    pub glucose_class: Option<GlucoseClass>,
    #[serde(flatten)]
    pub provenance: RecordProvenance,
}

impl From<StoredExam> for ExamRow {
    fn from(stored: StoredExam) -> Self {
        let bmi_class = stored.record.bmi_class();
        let glucose_class = stored.record.glucose_class();
        Self {
            id: stored.id,
            record: stored.record,
            bmi_class,
            glucose_class,
            provenance: stored.provenance,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document: String,
    pub outcome: String,
    pub record_id: Option<i64>,
    pub key: Option<NaturalKey>,
    pub reason: Option<String>,
    pub field_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub db_path: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestCounts {
    pub document_count: usize,
    pub stored_count: usize,
    pub duplicate_count: usize,
    pub extraction_error_count: usize,
    pub persist_error_count: usize,
    pub field_warning_count: usize,
    pub records_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub missing_sex_policy: String,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub documents: Vec<DocumentReport>,
}

/// Subset of the ingest manifest read back by `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRunSummary {
    pub run_id: String,
    pub status: String,
    pub updated_at: String,
    pub counts: IngestCounts,
}
