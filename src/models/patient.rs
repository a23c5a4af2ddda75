//! Patient record accepted by the prediction endpoint.
//!
//! Features follow the UCI Cleveland heart disease dataset.

use crate::core::table::{ColumnData, FeatureTable};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Column names of the model's input, in dataset order
pub const FEATURE_NAMES: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Name of the label column in the training data
pub const TARGET_NAME: &str = "num";

/// One patient's clinical measurements.
///
/// Every field is required. Values may arrive as JSON numbers or numeric
/// strings and are stored as `f64`; no range checks are applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Age in years
    #[serde(deserialize_with = "numeric")]
    pub age: f64,
    /// 1 = male, 0 = female
    #[serde(deserialize_with = "numeric")]
    pub sex: f64,
    /// Chest pain type (0-3)
    #[serde(deserialize_with = "numeric")]
    pub cp: f64,
    /// Resting blood pressure in mm Hg
    #[serde(deserialize_with = "numeric")]
    pub trestbps: f64,
    /// Serum cholesterol in mg/dl
    #[serde(deserialize_with = "numeric")]
    pub chol: f64,
    /// Fasting blood sugar > 120 mg/dl
    #[serde(deserialize_with = "numeric")]
    pub fbs: f64,
    /// Resting ECG result (0-2)
    #[serde(deserialize_with = "numeric")]
    pub restecg: f64,
    /// Maximum heart rate achieved
    #[serde(deserialize_with = "numeric")]
    pub thalach: f64,
    /// Exercise induced angina
    #[serde(deserialize_with = "numeric")]
    pub exang: f64,
    /// ST depression induced by exercise relative to rest
    #[serde(deserialize_with = "numeric")]
    pub oldpeak: f64,
    /// Slope of the peak exercise ST segment
    #[serde(deserialize_with = "numeric")]
    pub slope: f64,
    /// Number of major vessels colored by fluoroscopy (0-3)
    #[serde(deserialize_with = "numeric")]
    pub ca: f64,
    /// Thalassemia category
    #[serde(deserialize_with = "numeric")]
    pub thal: f64,
}

impl PatientRecord {
    /// Values in `FEATURE_NAMES` order
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.age,
            self.sex,
            self.cp,
            self.trestbps,
            self.chol,
            self.fbs,
            self.restecg,
            self.thalach,
            self.exang,
            self.oldpeak,
            self.slope,
            self.ca,
            self.thal,
        ]
    }

    /// Single-row table with one float column per feature
    pub fn to_frame(&self) -> FeatureTable {
        let mut table = FeatureTable::new();
        for (name, value) in FEATURE_NAMES.iter().zip(self.to_vec()) {
            // names are unique and every column has one row
            let _ = table.push_column(*name, ColumnData::Float(vec![value]));
        }
        table
    }
}

fn numeric<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Number(f64),
        Text(String),
    }

    let value = match Numeric::deserialize(deserializer)? {
        Numeric::Number(n) => n,
        Numeric::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("'{}' is not a valid number", s)))?,
    };

    if !value.is_finite() {
        return Err(D::Error::custom("value must be a finite number"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "age": 63.0, "sex": 1.0, "cp": 3.0, "trestbps": 145.0, "chol": 233.0,
            "fbs": 1.0, "restecg": 0.0, "thalach": 150.0, "exang": 0.0,
            "oldpeak": 2.3, "slope": 0.0, "ca": 0.0, "thal": 1.0
        })
    }

    #[test]
    fn test_deserialize_valid_record() {
        let record: PatientRecord = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(record.age, 63.0);
        assert_eq!(record.oldpeak, 2.3);
    }

    #[test]
    fn test_integers_and_numeric_strings_are_coerced() {
        let mut json = sample_json();
        json["age"] = serde_json::json!(63);
        json["chol"] = serde_json::json!("233");

        let record: PatientRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.age, 63.0);
        assert_eq!(record.chol, 233.0);
    }

    #[test]
    fn test_every_field_is_required() {
        for name in FEATURE_NAMES {
            let mut json = sample_json();
            json.as_object_mut().unwrap().remove(name);
            let err = serde_json::from_value::<PatientRecord>(json).unwrap_err();
            assert!(err.to_string().contains(name), "error for {}: {}", name, err);
        }
    }

    #[test]
    fn test_non_numeric_rejected() {
        let mut json = sample_json();
        json["sex"] = serde_json::json!("male");
        assert!(serde_json::from_value::<PatientRecord>(json).is_err());

        let mut json = sample_json();
        json["cp"] = serde_json::json!("NaN");
        assert!(serde_json::from_value::<PatientRecord>(json).is_err());
    }

    #[test]
    fn test_to_frame_has_all_features() {
        let record: PatientRecord = serde_json::from_value(sample_json()).unwrap();
        let frame = record.to_frame();

        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.column_names(), FEATURE_NAMES.map(String::from).to_vec());
        assert_eq!(frame.column("thalach").unwrap().data, ColumnData::Float(vec![150.0]));
    }
}
