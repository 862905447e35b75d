use chrono::NaiveDate;

use super::field_rules::{FieldValue, RuleSet};
use super::outcome::{DocumentOutcome, tally_outcomes};
use super::pipeline::IngestPipeline;
use super::record_assembly::assemble_record;
use super::text_extract::{SourceDocument, TextExtractor, flatten_pages, split_form_feed_pages};
use crate::classify::{BmiClass, GlucoseClass};
use crate::cli::MissingSexPolicy;
use crate::error::ExtractionError;
use crate::model::{Field, Sex};
use crate::store::{DateRange, ExamStore};

const SCENARIO_A: &str = "Paciente: João Silva\nSexo: FEMININO\n45 Anos\nData: 12/03/2024\n70Peso\nAltura: 170\nIMC: 24.2\n";

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn rules() -> RuleSet {
    RuleSet::new().expect("rule table should compile")
}

fn pipeline(missing_sex: MissingSexPolicy) -> IngestPipeline {
    IngestPipeline::new(TextExtractor::new("pdftotext"), missing_sex)
        .expect("pipeline should build")
}

fn evaluate(field: Field, text: &str) -> Option<FieldValue> {
    rules()
        .rule(field)
        .expect("rule should exist")
        .evaluate(text)
        .expect("rule should not report a parse error")
}

#[test]
fn flatten_pages_concatenates_without_separators() {
    assert_eq!(flatten_pages(&["Paciente: A", "", "na\n"]), "Paciente: Ana\n");
    assert_eq!(flatten_pages::<&str>(&[]), "");
}

#[test]
fn split_form_feed_pages_keeps_inner_empty_pages_and_drops_trailing_ones() {
    let pages = split_form_feed_pages("one\u{000C}\u{000C}th\u{0000}ree\u{000C}  \n\u{000C}");
    assert_eq!(pages, vec!["one".to_string(), String::new(), "three".to_string()]);
}

#[test]
fn value_across_page_break_is_not_rejoined() {
    let text = flatten_pages(&split_form_feed_pages("Paciente: Ana\nIMC:\n\u{000C}Página 2\n24.2"));
    let fields = rules().extract(&text).expect("name is present");
    assert_eq!(fields.decimal(Field::Bmi), None);
}

#[test]
fn document_with_only_blank_pages_is_an_extraction_error() {
    let document = SourceDocument::from_text("blank.txt", "\u{000C}  \u{000C}\n");
    let error = pipeline(MissingSexPolicy::Unknown)
        .extract_record(&document)
        .expect_err("blank document must not produce a record");
    assert_eq!(error, ExtractionError::EmptyText);
}

#[test]
fn non_utf8_text_document_is_unreadable() {
    let document = SourceDocument {
        name: "broken.txt".to_string(),
        bytes: vec![0xff, 0xfe, 0x00, 0x41],
    };
    let error = pipeline(MissingSexPolicy::Unknown)
        .extract_record(&document)
        .expect_err("invalid UTF-8 must be rejected");
    assert!(matches!(error, ExtractionError::Unreadable(_)), "{error:?}");
}

#[test]
fn pdf_without_converter_is_unreadable() {
    let extractor = TextExtractor::new("petct-test-missing-pdftotext");
    let document = SourceDocument {
        name: "form.pdf".to_string(),
        bytes: b"%PDF-1.4\n%fake\n".to_vec(),
    };
    let error = extractor
        .extract_text(&document)
        .expect_err("missing converter must fail");
    assert!(matches!(error, ExtractionError::Unreadable(_)), "{error:?}");
}

#[test]
fn patient_name_stops_at_line_end_and_is_trimmed() {
    assert_eq!(
        evaluate(Field::PatientName, "Paciente:   João Silva  \nSexo: FEMININO"),
        Some(FieldValue::Text("João Silva".to_string()))
    );
    assert_eq!(evaluate(Field::PatientName, "Paciente:\nJoão Silva"), None);
}

#[test]
fn sex_rule_maps_markers_to_codes() {
    assert_eq!(
        evaluate(Field::Sex, "SEXO: FEMININO"),
        Some(FieldValue::Text("F".to_string()))
    );
    assert_eq!(
        evaluate(Field::Sex, "SEXO: MASCULINO"),
        Some(FieldValue::Text("M".to_string()))
    );
    assert_eq!(evaluate(Field::Sex, "SEXO: ignorado"), None);
}

#[test]
fn numeric_rules_follow_their_labels() {
    assert_eq!(evaluate(Field::Age, "Idade: 45 Anos"), Some(FieldValue::Integer(45)));
    assert_eq!(evaluate(Field::WeightKg, "70Peso"), Some(FieldValue::Decimal(70.0)));
    assert_eq!(evaluate(Field::WeightKg, "70 Peso"), None);
    assert_eq!(evaluate(Field::HeightCm, "Altura: 170"), Some(FieldValue::Decimal(170.0)));
    assert_eq!(evaluate(Field::Bmi, "IMC: 24,2"), Some(FieldValue::Decimal(24.2)));
    assert_eq!(
        evaluate(Field::GlucoseMgdl, "HGT pré-exame =65HGT"),
        Some(FieldValue::Decimal(65.0))
    );
    assert_eq!(evaluate(Field::GlucoseMgdl, "65HGT"), None);
}

#[test]
fn exam_date_takes_first_date_token() {
    assert_eq!(
        evaluate(Field::ExamDate, "Data 12/03/2024, retorno 20/04/2024"),
        Some(FieldValue::Date(date(2024, 3, 12)))
    );
}

#[test]
fn flag_rules_default_to_false() {
    let fields = rules()
        .extract("Paciente: Ana\nDiabetes: NÃO\nRadioterapia: SIM\n")
        .expect("name is present");
    assert!(!fields.flag(Field::HasDiabetes));
    assert!(fields.flag(Field::HadRadiotherapy));
    assert!(!fields.flag(Field::HadChemotherapy));
    assert!(!fields.flag(Field::IsRestaging));
    assert_eq!(fields.get(Field::HasDiabetes), Some(&FieldValue::Flag(false)));
}

#[test]
fn lookup_rules_yield_fixed_labels() {
    assert_eq!(
        evaluate(Field::CancerType, "Indicação: CÂNCER DE PULMÃO"),
        Some(FieldValue::Text("Pulmão".to_string()))
    );
    assert_eq!(
        evaluate(Field::CancerType, "LINFOMA NÃO HODGKIN"),
        Some(FieldValue::Text("Linfoma".to_string()))
    );
    assert_eq!(
        evaluate(Field::OnTargetedTherapy, "em uso de Trastuzumabe"),
        Some(FieldValue::Flag(true))
    );
}

#[test]
fn lookup_rules_ignore_lowercase_narrative() {
    assert_eq!(
        evaluate(
            Field::CancerType,
            "Paciente: X\nHistória familiar: mãe com melanoma\n"
        ),
        None
    );
    assert_eq!(
        evaluate(Field::CancerType, "Indicação: câncer de pulmão"),
        None
    );
    assert_eq!(evaluate(Field::Sex, "sexo feminino informado pela família"), None);

    let fields = rules()
        .extract("Paciente: X\nHistória familiar: pai com linfoma\nLINFOMA NÃO HODGKIN\n")
        .expect("name is present");
    assert_eq!(fields.text(Field::CancerType).as_deref(), Some("Linfoma"));
}

#[test]
fn flag_captures_reject_unexpected_answers() {
    let fields = rules()
        .extract("Paciente: Ana\nDiabetes: TALVEZ\nRadioterapia: sim\n")
        .expect("parse errors are not fatal");

    assert!(!fields.flag(Field::HasDiabetes));
    assert!(!fields.flag(Field::HadRadiotherapy));
    let failed = fields
        .parse_errors()
        .iter()
        .map(|error| (error.field, error.raw.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        failed,
        vec![(Field::HasDiabetes, "TALVEZ"), (Field::HadRadiotherapy, "sim")]
    );
}

#[test]
fn unparseable_optional_fields_fall_back_to_default() {
    let fields = rules()
        .extract("Paciente: Ana\n99999999999 Anos\nData 31/02/2024\nIMC: 22\n")
        .expect("parse errors are not fatal");

    assert_eq!(fields.integer(Field::Age), None);
    assert_eq!(fields.date(Field::ExamDate), None);
    assert_eq!(fields.decimal(Field::Bmi), Some(22.0));

    let failed = fields
        .parse_errors()
        .iter()
        .map(|error| error.field)
        .collect::<Vec<Field>>();
    assert_eq!(failed, vec![Field::Age, Field::ExamDate]);
}

#[test]
fn missing_patient_name_is_an_extraction_error() {
    let error = rules()
        .extract("FEMININO 45 Anos IMC: 24.2")
        .expect_err("patient name is required");
    assert_eq!(error, ExtractionError::MissingRequiredField(Field::PatientName));
}

#[test]
fn missing_sex_marker_follows_policy() {
    let fields = rules().extract("Paciente: Ana\n").expect("name is present");

    let unknown = assemble_record(&fields, MissingSexPolicy::Unknown).expect("assemble");
    assert_eq!(unknown.sex, None);

    let legacy = assemble_record(&fields, MissingSexPolicy::Male).expect("assemble");
    assert_eq!(legacy.sex, Some(Sex::Male));
}

#[test]
fn scenario_a_produces_expected_record() {
    let document = SourceDocument::from_text("a.txt", SCENARIO_A);
    let extracted = pipeline(MissingSexPolicy::Unknown)
        .extract_record(&document)
        .expect("scenario A should extract");
    let record = extracted.record;

    assert_eq!(record.patient_name, "João Silva");
    assert_eq!(record.sex, Some(Sex::Female));
    assert_eq!(record.age, Some(45));
    assert_eq!(record.exam_date, Some(date(2024, 3, 12)));
    assert_eq!(record.weight_kg, Some(70.0));
    assert_eq!(record.height_cm, Some(170.0));
    assert_eq!(record.bmi, Some(24.2));
    assert_eq!(record.bmi_class(), Some(BmiClass::Normal));
    assert_eq!(record.glucose_mgdl, None);
    assert_eq!(record.glucose_class(), None);
    assert!(extracted.field_warnings.is_empty());
}

#[test]
fn scenario_b_high_bmi_is_obese() {
    let text = SCENARIO_A.replace("IMC: 24.2", "IMC: 31.0");
    let record = pipeline(MissingSexPolicy::Unknown)
        .extract_record(&SourceDocument::from_text("b.txt", &text))
        .expect("scenario B should extract")
        .record;
    assert_eq!(record.bmi, Some(31.0));
    assert_eq!(record.bmi_class(), Some(BmiClass::Obese));
}

#[test]
fn scenario_c_low_glucose_is_hypoglycemia() {
    let text = format!("{SCENARIO_A}Glicemia =65HGT\n");
    let record = pipeline(MissingSexPolicy::Unknown)
        .extract_record(&SourceDocument::from_text("c.txt", &text))
        .expect("scenario C should extract")
        .record;
    assert_eq!(record.glucose_mgdl, Some(65.0));
    assert_eq!(record.glucose_class(), Some(GlucoseClass::Hypoglycemia));
}

#[test]
fn missing_imc_label_leaves_bmi_unknown() {
    let text = SCENARIO_A.replace("IMC: 24.2\n", "");
    let extracted = pipeline(MissingSexPolicy::Unknown)
        .extract_record(&SourceDocument::from_text("no-imc.txt", &text))
        .expect("missing optional field must not fail");
    assert_eq!(extracted.record.bmi, None);
    assert_eq!(extracted.record.bmi_class(), None);
    assert!(extracted.field_warnings.is_empty());
}

#[test]
fn extraction_is_deterministic() {
    let pipeline = pipeline(MissingSexPolicy::Unknown);
    let document = SourceDocument::from_text("a.txt", SCENARIO_A);
    let first = pipeline.extract_record(&document).expect("extract").record;
    let second = pipeline.extract_record(&document).expect("extract").record;
    assert_eq!(first, second);
    assert_eq!(first.bmi_class(), second.bmi_class());
}

#[test]
fn scenario_d_resubmission_is_skipped() {
    let pipeline = pipeline(MissingSexPolicy::Unknown);
    let mut store = ExamStore::open_in_memory().expect("store should open");
    let document = SourceDocument::from_text("a.txt", SCENARIO_A);

    let first = pipeline.ingest_document(&mut store, &document);
    assert!(matches!(first, DocumentOutcome::Stored { .. }), "{first:?}");

    let second = pipeline.ingest_document(&mut store, &document);
    let DocumentOutcome::DuplicateSkipped { key, .. } = &second else {
        panic!("expected duplicate skip, got {second:?}");
    };
    assert_eq!(key.patient_name, "João Silva");
    assert_eq!(key.exam_date, Some(date(2024, 3, 12)));
    assert_eq!(store.count_records().expect("count"), 1);
}

#[test]
fn scenario_e_batch_continues_past_missing_patient_name() {
    let pipeline = pipeline(MissingSexPolicy::Unknown);
    let mut store = ExamStore::open_in_memory().expect("store should open");
    let batch = vec![
        SourceDocument::from_text("1.txt", SCENARIO_A),
        SourceDocument::from_text("2.txt", "FEMININO\n50 Anos\n01/02/2024\nIMC: 20\n"),
        SourceDocument::from_text(
            "3.txt",
            &SCENARIO_A.replace("João Silva", "Pedro Lima"),
        ),
    ];

    let outcomes = batch
        .iter()
        .map(|document| pipeline.ingest_document(&mut store, document))
        .collect::<Vec<DocumentOutcome>>();

    assert_eq!(outcomes.len(), batch.len(), "one outcome per document");
    assert_eq!(
        outcomes.iter().map(DocumentOutcome::document).collect::<Vec<&str>>(),
        vec!["1.txt", "2.txt", "3.txt"]
    );
    assert!(matches!(
        &outcomes[1],
        DocumentOutcome::ExtractionError {
            error: ExtractionError::MissingRequiredField(Field::PatientName),
            ..
        }
    ));

    let counts = tally_outcomes(&outcomes);
    assert_eq!(counts.stored_count, 2);
    assert_eq!(counts.extraction_error_count, 1);
    assert_eq!(counts.duplicate_count + counts.persist_error_count, 0);
    assert_eq!(store.count_records().expect("count"), 2);
}

#[test]
fn stored_records_list_with_consistent_classes() {
    let pipeline = pipeline(MissingSexPolicy::Unknown);
    let mut store = ExamStore::open_in_memory().expect("store should open");
    let text = format!("{}=150HGT\n", SCENARIO_A.replace("IMC: 24.2", "IMC: 17.9"));
    pipeline.ingest_document(&mut store, &SourceDocument::from_text("x.txt", &text));

    let stored = store.list_records(DateRange::default()).expect("list");
    assert_eq!(stored.len(), 1);
    let row = crate::model::ExamRow::from(stored[0].clone());
    assert_eq!(row.bmi_class, Some(BmiClass::Underweight));
    assert_eq!(row.glucose_class, Some(GlucoseClass::Hyperglycemia));
    assert_eq!(row.provenance.source_document, "x.txt");
    assert_eq!(row.provenance.source_sha256.len(), 64);

    let json = serde_json::to_value(&row).expect("serialize row");
    assert_eq!(json["bmi_class"], "Baixo peso");
    assert_eq!(json["glucose_class"], "Hiperglicemia");
    assert_eq!(json["sex"], "F");
    assert_eq!(json["exam_date"], "2024-03-12");
}

#[test]
fn full_intake_form_fixture_extracts_every_field() {
    let document = SourceDocument::from_text(
        "anamnese_reestadiamento.txt",
        include_str!("../../../fixtures/anamnese_reestadiamento.txt"),
    );
    let record = pipeline(MissingSexPolicy::Unknown)
        .extract_record(&document)
        .expect("fixture should extract")
        .record;

    assert_eq!(record.patient_name, "Maria Aparecida Souza");
    assert_eq!(record.sex, Some(Sex::Female));
    assert_eq!(record.age, Some(62));
    assert_eq!(record.exam_date, Some(date(2024, 8, 5)));
    assert_eq!(record.insurance_plan.as_deref(), Some("Unimed Nacional"));
    assert_eq!(record.insurance_id.as_deref(), Some("0012.3456.789-0"));
    assert_eq!(record.attending_physician.as_deref(), Some("Dr. Carlos Mendes"));
    assert!(record.has_diabetes);
    assert!(record.had_chemotherapy);
    assert!(record.on_targeted_therapy);
    assert!(!record.had_radiotherapy);
    assert_eq!(
        record.smoking_status.as_deref(),
        Some("Ex-tabagista (40 anos-maço)")
    );
    assert_eq!(record.weight_kg, Some(68.0));
    assert_eq!(record.height_cm, Some(158.0));
    assert_eq!(record.bmi, Some(27.2));
    assert_eq!(record.bmi_class(), Some(BmiClass::Overweight));
    assert_eq!(record.glucose_mgdl, Some(112.0));
    assert_eq!(record.glucose_class(), Some(GlucoseClass::Normal));
    assert!(record.is_restaging);
    assert_eq!(record.cancer_type.as_deref(), Some("Pulmão"));
}

#[test]
fn outcome_reports_carry_reason_and_key() {
    let pipeline = pipeline(MissingSexPolicy::Unknown);
    let mut store = ExamStore::open_in_memory().expect("store should open");

    let stored = pipeline.ingest_document(&mut store, &SourceDocument::from_text("a.txt", SCENARIO_A));
    let report = stored.to_report();
    assert_eq!(report.outcome, "stored");
    assert!(report.record_id.is_some());
    assert_eq!(report.key.map(|key| key.patient_name), Some("João Silva".to_string()));

    let failed = pipeline.ingest_document(&mut store, &SourceDocument::from_text("e.txt", "IMC: 20"));
    let report = failed.to_report();
    assert_eq!(report.outcome, "extraction_error");
    assert_eq!(
        report.reason.as_deref(),
        Some("required field 'patient_name' not found")
    );
}
