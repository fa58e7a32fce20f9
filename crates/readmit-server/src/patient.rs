//! Patient records as served by the API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Feature names the prediction model was trained with, where they differ
/// from the warehouse column names
const MODEL_FEATURE_RENAMES: &[(&str, &str)] = &[("AGE", "age"), ("AGE_CATEGORY", "age_category")];

/// Coarse risk shown next to a patient, from the recorded readmission label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    High,
    #[default]
    Low,
}

impl RiskCategory {
    /// High only when the patient is known to have been readmitted
    pub fn from_target(readmitted: Option<bool>) -> Self {
        if readmitted == Some(true) {
            RiskCategory::High
        } else {
            RiskCategory::Low
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCategory::High => f.write_str("High"),
            RiskCategory::Low => f.write_str("Low"),
        }
    }
}

/// One warehouse row keyed by registry column name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
    pub risk_category: RiskCategory,
}

impl PatientRecord {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        let risk_category =
            RiskCategory::from_target(fields.get("READMIT_30").and_then(JsonValue::as_bool));
        Self {
            fields,
            risk_category,
        }
    }

    pub fn subject_id(&self) -> Option<i64> {
        self.fields.get("SUBJECT_ID").and_then(JsonValue::as_i64)
    }

    pub fn age(&self) -> Option<i64> {
        self.fields.get("AGE").and_then(JsonValue::as_i64)
    }

    pub fn diagnosis(&self) -> Option<&str> {
        self.fields.get("DIAGNOSIS").and_then(JsonValue::as_str)
    }

    /// The record as the prediction model expects it
    pub fn prediction_features(&self) -> Map<String, JsonValue> {
        let mut features = self.fields.clone();
        for (from, to) in MODEL_FEATURE_RENAMES {
            if let Some(value) = features.remove(*from) {
                features.insert((*to).to_string(), value);
            }
        }
        features
    }

    pub fn summary(&self) -> PatientSummary {
        PatientSummary {
            subject_id: self.subject_id(),
            age: self.age(),
            diagnosis: self.diagnosis().map(str::to_string),
            risk_category: self.risk_category,
        }
    }
}

/// The part of a record a care plan is written from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub subject_id: Option<i64>,
    pub age: Option<i64>,
    pub diagnosis: Option<String>,
    pub risk_category: RiskCategory,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(readmit: JsonValue) -> PatientRecord {
        let fields = json!({
            "SUBJECT_ID": 7,
            "AGE": 64,
            "AGE_CATEGORY": 3,
            "DIAGNOSIS": "SEPSIS",
            "READMIT_30": readmit,
        });
        PatientRecord::new(fields.as_object().unwrap().clone())
    }

    #[test]
    fn test_risk_category_from_label() {
        assert_eq!(record(json!(true)).risk_category, RiskCategory::High);
        assert_eq!(record(json!(false)).risk_category, RiskCategory::Low);
        assert_eq!(record(JsonValue::Null).risk_category, RiskCategory::Low);
    }

    #[test]
    fn test_prediction_features_rename_age_columns() {
        let features = record(json!(true)).prediction_features();
        assert_eq!(features["age"], json!(64));
        assert_eq!(features["age_category"], json!(3));
        assert!(!features.contains_key("AGE"));
        assert!(!features.contains_key("AGE_CATEGORY"));
        assert_eq!(features["SUBJECT_ID"], json!(7));
    }

    #[test]
    fn test_record_serializes_flat() {
        let body = serde_json::to_value(record(json!(true))).unwrap();
        assert_eq!(body["SUBJECT_ID"], json!(7));
        assert_eq!(body["risk_category"], json!("High"));
    }

    #[test]
    fn test_summary() {
        let summary = record(json!(false)).summary();
        assert_eq!(summary.subject_id, Some(7));
        assert_eq!(summary.age, Some(64));
        assert_eq!(summary.diagnosis.as_deref(), Some("SEPSIS"));
        assert_eq!(summary.risk_category, RiskCategory::Low);
    }
}
