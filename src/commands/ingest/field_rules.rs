use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use regex::Regex;

use crate::error::{ExtractionError, FieldParseError};
use crate::model::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Date,
    Flag,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(u32),
    Decimal(f64),
    Date(NaiveDate),
    Flag(bool),
}

#[derive(Debug)]
enum Matcher {
    /// First capture group of the first match.
    Capture(Regex),
    /// True when the pattern occurs anywhere in the text.
    Presence(Regex),
    /// The first phrase in table order that occurs yields its label. Phrases
    /// are the form's own uppercase headings and match case-sensitively.
    Lookup(Vec<(Regex, &'static str)>),
}

#[derive(Debug)]
pub struct FieldRule {
    pub field: Field,
    pub field_type: FieldType,
    pub required: bool,
    matcher: Matcher,
}

impl FieldRule {
    fn capture(field: Field, field_type: FieldType, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("failed to compile {} capture regex", field.as_str()))?;
        Ok(Self {
            field,
            field_type,
            required: false,
            matcher: Matcher::Capture(regex),
        })
    }

    fn presence(field: Field, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("failed to compile {} presence regex", field.as_str()))?;
        Ok(Self {
            field,
            field_type: FieldType::Flag,
            required: false,
            matcher: Matcher::Presence(regex),
        })
    }

    fn lookup(field: Field, phrases: &[(&str, &'static str)]) -> Result<Self> {
        let mut table = Vec::with_capacity(phrases.len());
        for (pattern, label) in phrases {
            let regex = Regex::new(pattern).with_context(|| {
                format!("failed to compile {} phrase '{pattern}'", field.as_str())
            })?;
            table.push((regex, *label));
        }
        Ok(Self {
            field,
            field_type: FieldType::Text,
            required: false,
            matcher: Matcher::Lookup(table),
        })
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value recorded when the rule does not match or its text cannot be parsed.
    pub fn default_value(&self) -> Option<FieldValue> {
        match self.field_type {
            FieldType::Flag => Some(FieldValue::Flag(false)),
            _ => None,
        }
    }

    /// `Ok(None)` means the rule found nothing; `Err` means it matched text it
    /// could not coerce.
    pub fn evaluate(&self, text: &str) -> Result<Option<FieldValue>, FieldParseError> {
        match &self.matcher {
            Matcher::Capture(regex) => {
                let Some(raw) = regex
                    .captures(text)
                    .and_then(|captures| captures.get(1))
                    .map(|value| value.as_str().trim())
                else {
                    return Ok(None);
                };
                if raw.is_empty() {
                    return Ok(None);
                }
                coerce(self.field, self.field_type, raw).map(Some)
            }
            Matcher::Presence(regex) => Ok(regex.is_match(text).then_some(FieldValue::Flag(true))),
            Matcher::Lookup(table) => Ok(table
                .iter()
                .find(|(regex, _)| regex.is_match(text))
                .map(|(_, label)| FieldValue::Text((*label).to_string()))),
        }
    }
}

fn coerce(field: Field, field_type: FieldType, raw: &str) -> Result<FieldValue, FieldParseError> {
    let parse_error = |reason: String| FieldParseError {
        field,
        raw: raw.to_string(),
        reason,
    };

    match field_type {
        FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldType::Integer => raw
            .parse::<u32>()
            .map(FieldValue::Integer)
            .map_err(|error| parse_error(error.to_string())),
        FieldType::Decimal => parse_decimal(raw)
            .map(FieldValue::Decimal)
            .ok_or_else(|| parse_error("not a finite decimal number".to_string())),
        FieldType::Date => NaiveDate::parse_from_str(raw, "%d/%m/%Y")
            .map(FieldValue::Date)
            .map_err(|error| parse_error(error.to_string())),
        FieldType::Flag => match raw {
            "SIM" => Ok(FieldValue::Flag(true)),
            "NÃO" | "NAO" => Ok(FieldValue::Flag(false)),
            _ => Err(parse_error("expected SIM or NÃO".to_string())),
        },
    }
}

/// Forms use both `24,2` and `24.2`.
fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Typed values found in one document, with defaults already applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    values: BTreeMap<Field, FieldValue>,
    parse_errors: Vec<FieldParseError>,
}

impl ExtractedFields {
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn text(&self, field: Field) -> Option<String> {
        match self.get(field) {
            Some(FieldValue::Text(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn integer(&self, field: Field) -> Option<u32> {
        match self.get(field) {
            Some(FieldValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn decimal(&self, field: Field) -> Option<f64> {
        match self.get(field) {
            Some(FieldValue::Decimal(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        match self.get(field) {
            Some(FieldValue::Date(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn flag(&self, field: Field) -> bool {
        matches!(self.get(field), Some(FieldValue::Flag(true)))
    }

    pub fn parse_errors(&self) -> &[FieldParseError] {
        &self.parse_errors
    }
}

/// The intake form's field table.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn new() -> Result<Self> {
        let rules = vec![
            FieldRule::capture(
                Field::PatientName,
                FieldType::Text,
                r"Paciente:[ \t]*([^\r\n]+)",
            )?
            .required(),
            FieldRule::lookup(
                Field::Sex,
                &[(r"\bFEMININO\b", "F"), (r"\bMASCULINO\b", "M")],
            )?,
            FieldRule::capture(Field::Age, FieldType::Integer, r"(\d+)\s+Anos\b")?,
            FieldRule::capture(Field::ExamDate, FieldType::Date, r"\b(\d{2}/\d{2}/\d{4})\b")?,
            FieldRule::capture(
                Field::InsurancePlan,
                FieldType::Text,
                r"Conv[êe]nio:[ \t]*([^\r\n]+)",
            )?,
            FieldRule::capture(
                Field::InsuranceId,
                FieldType::Text,
                r"(?:Carteira|Carteirinha|Matr[íi]cula):[ \t]*([0-9A-Za-z./-]+)",
            )?,
            FieldRule::capture(
                Field::AttendingPhysician,
                FieldType::Text,
                r"M[ée]dico(?: Solicitante)?:[ \t]*([^\r\n]+)",
            )?,
            FieldRule::capture(
                Field::HasDiabetes,
                FieldType::Flag,
                r"Diabetes:[ \t]*(\p{L}+)",
            )?,
            FieldRule::presence(
                Field::HadChemotherapy,
                r"(?i)Quimioterapia:[ \t]*SIM|realizou quimioterapia|QT pr[ée]via",
            )?,
            FieldRule::presence(
                Field::OnTargetedTherapy,
                r"(?i)\b(?:osimertinibe|erlotinibe|gefitinibe|afatinibe|alectinibe|crizotinibe|imatinibe|trastuzumabe|pertuzumabe|bevacizumabe|cetuximabe|rituximabe)\b",
            )?,
            FieldRule::capture(
                Field::HadRadiotherapy,
                FieldType::Flag,
                r"Radioterapia:[ \t]*(\p{L}+)",
            )?,
            FieldRule::capture(
                Field::SmokingStatus,
                FieldType::Text,
                r"Tabagis(?:mo|ta):[ \t]*([^\r\n]+)",
            )?,
            FieldRule::capture(Field::WeightKg, FieldType::Decimal, r"(\d+(?:[.,]\d+)?)Peso")?,
            FieldRule::capture(
                Field::HeightCm,
                FieldType::Decimal,
                r"Altura:\s*(\d+(?:[.,]\d+)?)",
            )?,
            FieldRule::capture(Field::Bmi, FieldType::Decimal, r"IMC:\s*(\d+(?:[.,]\d+)?)")?,
            FieldRule::capture(
                Field::GlucoseMgdl,
                FieldType::Decimal,
                r"=\s*(\d+(?:[.,]\d+)?)\s*HGT",
            )?,
            FieldRule::presence(Field::IsRestaging, r"REESTADIAMENTO")?,
            FieldRule::lookup(
                Field::CancerType,
                &[
                    (r"C[ÂA]NCER DE PULM[ÃA]O|NEOPLASIA (?:MALIGNA )?DE PULM[ÃA]O", "Pulmão"),
                    (r"C[ÂA]NCER DE MAMA|NEOPLASIA (?:MALIGNA )?DE MAMA", "Mama"),
                    (r"C[ÂA]NCER DE PR[ÓO]STATA", "Próstata"),
                    (r"C[ÂA]NCER (?:COLORRETAL|DE C[ÓO]LON|DE RETO)", "Colorretal"),
                    (r"\bLINFOMA\b", "Linfoma"),
                    (r"\bMELANOMA\b", "Melanoma"),
                ],
            )?,
        ];

        if let Some(field) = Field::ALL
            .iter()
            .find(|field| !rules.iter().any(|rule| rule.field == **field))
        {
            bail!("no extraction rule declared for {}", field.as_str());
        }

        Ok(Self { rules })
    }

    #[cfg(test)]
    pub fn rule(&self, field: Field) -> Option<&FieldRule> {
        self.rules.iter().find(|rule| rule.field == field)
    }

    /// Runs every rule independently. A rule that misses or fails to parse
    /// falls back to its default; only a missing required field is fatal.
    pub fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractionError> {
        let mut fields = ExtractedFields::default();

        for rule in &self.rules {
            let value = match rule.evaluate(text) {
                Ok(Some(value)) => Some(value),
                Ok(None) => rule.default_value(),
                Err(error) => {
                    fields.parse_errors.push(error);
                    rule.default_value()
                }
            };
            if let Some(value) = value {
                fields.values.insert(rule.field, value);
            }
        }

        if let Some(missing) = self
            .rules
            .iter()
            .find(|rule| rule.required && !fields.values.contains_key(&rule.field))
        {
            return Err(ExtractionError::MissingRequiredField(missing.field));
        }

        Ok(fields)
    }
}
