use crate::cli::MissingSexPolicy;
use crate::error::ExtractionError;
use crate::model::{ExamRecord, Field, Sex};

use super::field_rules::ExtractedFields;

/// Builds a complete record from extracted fields. Every declared field is
/// set, either to its extracted value or to its default.
pub fn assemble_record(
    fields: &ExtractedFields,
    missing_sex: MissingSexPolicy,
) -> Result<ExamRecord, ExtractionError> {
    let Some(patient_name) = fields.text(Field::PatientName) else {
        return Err(ExtractionError::MissingRequiredField(Field::PatientName));
    };

    let sex = match fields.text(Field::Sex).as_deref().and_then(Sex::from_code) {
        Some(sex) => Some(sex),
        None => match missing_sex {
            MissingSexPolicy::Unknown => None,
            MissingSexPolicy::Male => Some(Sex::Male),
        },
    };

    Ok(ExamRecord {
        patient_name,
        sex,
        age: fields.integer(Field::Age),
        exam_date: fields.date(Field::ExamDate),
        insurance_plan: fields.text(Field::InsurancePlan),
        insurance_id: fields.text(Field::InsuranceId),
        attending_physician: fields.text(Field::AttendingPhysician),
        has_diabetes: fields.flag(Field::HasDiabetes),
        had_chemotherapy: fields.flag(Field::HadChemotherapy),
        on_targeted_therapy: fields.flag(Field::OnTargetedTherapy),
        had_radiotherapy: fields.flag(Field::HadRadiotherapy),
        smoking_status: fields.text(Field::SmokingStatus),
        weight_kg: fields.decimal(Field::WeightKg),
        height_cm: fields.decimal(Field::HeightCm),
        bmi: fields.decimal(Field::Bmi),
        glucose_mgdl: fields.decimal(Field::GlucoseMgdl),
        is_restaging: fields.flag(Field::IsRestaging),
        cancer_type: fields.text(Field::CancerType),
    })
}
