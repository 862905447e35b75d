use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BmiClass {
    #[serde(rename = "Baixo peso")]
    Underweight,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Sobrepeso")]
    Overweight,
    #[serde(rename = "Obesidade")]
    Obese,
}

impl BmiClass {
    pub fn as_str(self) -> &'static str {
        match self {
            BmiClass::Underweight => "Baixo peso",
            BmiClass::Normal => "Normal",
            BmiClass::Overweight => "Sobrepeso",
            BmiClass::Obese => "Obesidade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GlucoseClass {
    #[serde(rename = "Hipoglicemia")]
    Hypoglycemia,
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Hiperglicemia")]
    Hyperglycemia,
}

impl GlucoseClass {
    pub fn as_str(self) -> &'static str {
        match self {
            GlucoseClass::Hypoglycemia => "Hipoglicemia",
            GlucoseClass::Normal => "Normal",
            GlucoseClass::Hyperglycemia => "Hiperglicemia",
        }
    }
}

/// Half-open bands: [18.5, 25) is normal, [25, 30) overweight.
pub fn bmi_class(bmi: Option<f64>) -> Option<BmiClass> {
    let bmi = bmi?;
    let class = if bmi < 18.5 {
        BmiClass::Underweight
    } else if bmi < 25.0 {
        BmiClass::Normal
    } else if bmi < 30.0 {
        BmiClass::Overweight
    } else {
        BmiClass::Obese
    };
    Some(class)
}

/// The normal band is closed on both ends: 70 and 140 mg/dL are normal.
pub fn glucose_class(glucose_mgdl: Option<f64>) -> Option<GlucoseClass> {
    let glucose = glucose_mgdl?;
    let class = if glucose < 70.0 {
        GlucoseClass::Hypoglycemia
    } else if glucose <= 140.0 {
        GlucoseClass::Normal
    } else {
        GlucoseClass::Hyperglycemia
    };
    Some(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmi_class_respects_band_edges() {
        assert_eq!(bmi_class(Some(18.49)), Some(BmiClass::Underweight));
        assert_eq!(bmi_class(Some(18.5)), Some(BmiClass::Normal));
        assert_eq!(bmi_class(Some(24.99)), Some(BmiClass::Normal));
        assert_eq!(bmi_class(Some(25.0)), Some(BmiClass::Overweight));
        assert_eq!(bmi_class(Some(29.9)), Some(BmiClass::Overweight));
        assert_eq!(bmi_class(Some(30.0)), Some(BmiClass::Obese));
    }

    #[test]
    fn glucose_class_treats_normal_band_as_closed() {
        assert_eq!(glucose_class(Some(69.9)), Some(GlucoseClass::Hypoglycemia));
        assert_eq!(glucose_class(Some(70.0)), Some(GlucoseClass::Normal));
        assert_eq!(glucose_class(Some(140.0)), Some(GlucoseClass::Normal));
        assert_eq!(glucose_class(Some(140.1)), Some(GlucoseClass::Hyperglycemia));
    }

    #[test]
    fn unknown_values_stay_unclassified() {
        assert_eq!(bmi_class(None), None);
        assert_eq!(glucose_class(None), None);
    }

    #[test]
    fn labels_match_serialized_names() {
        let json = serde_json::to_string(&BmiClass::Underweight).expect("serialize");
        assert_eq!(json, format!("\"{}\"", BmiClass::Underweight.as_str()));
        let json = serde_json::to_string(&GlucoseClass::Hyperglycemia).expect("serialize");
        assert_eq!(json, format!("\"{}\"", GlucoseClass::Hyperglycemia.as_str()));
    }
}
