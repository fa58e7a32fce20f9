//! Discharge care plans
//!
//! A care plan is written by the narrative service as loosely structured
//! JSON. Extraction never fails: whatever cannot be recovered from the text
//! is left empty.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::patient::PatientSummary;

/// Spoken when a plan has nothing to read out
pub const EMPTY_SPEECH_TEXT: &str = "No content available.";

// ============================================================================
// Languages
// ============================================================================

/// Languages a care plan can be written and spoken in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Spanish,
    French,
    Tamil,
    German,
    Malayalam,
}

/// Section headings in one language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionLabels {
    pub title: &'static str,
    pub summary: &'static str,
    pub risk: &'static str,
    pub follow_up: &'static str,
    pub monitoring: &'static str,
    pub tips: &'static str,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::English,
        Language::Hindi,
        Language::Spanish,
        Language::French,
        Language::Tamil,
        Language::German,
        Language::Malayalam,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::Tamil => "Tamil",
            Language::German => "German",
            Language::Malayalam => "Malayalam",
        }
    }

    /// Two-letter code understood by the speech service
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::Tamil => "ta",
            Language::German => "de",
            Language::Malayalam => "ml",
        }
    }

    /// Resolve a language by name or code, case-insensitively.
    /// Anything unrecognized is English.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(input) || l.code().eq_ignore_ascii_case(input))
            .unwrap_or_default()
    }

    pub fn labels(self) -> SectionLabels {
        match self {
            Language::English => SectionLabels {
                title: "Post-Discharge Care Report",
                summary: "Summary",
                risk: "Risk Level",
                follow_up: "Follow-Up",
                monitoring: "Monitoring",
                tips: "Helpful Tips",
            },
            Language::Hindi => SectionLabels {
                title: "डिस्चार्ज के बाद की देखभाल रिपोर्ट",
                summary: "सारांश",
                risk: "जोखिम स्तर",
                follow_up: "फॉलो-अप",
                monitoring: "निगरानी",
                tips: "उपयोगी सुझाव",
            },
            Language::Spanish => SectionLabels {
                title: "Informe de Atención Post-Alta",
                summary: "Resumen",
                risk: "Nivel de Riesgo",
                follow_up: "Seguimiento",
                monitoring: "Monitoreo",
                tips: "Consejos Útiles",
            },
            Language::French => SectionLabels {
                title: "Rapport de Soins Après la Sortie",
                summary: "Résumé",
                risk: "Niveau de Risque",
                follow_up: "Suivi",
                monitoring: "Surveillance",
                tips: "Conseils Utiles",
            },
            Language::Tamil => SectionLabels {
                title: "டிஸ்சார்ஜ் பிந்தைய பராமரிப்பு அறிக்கை",
                summary: "சுருக்கம்",
                risk: "அபாய நிலை",
                follow_up: "பின்தொடர்வு",
                monitoring: "கண்காணிப்பு",
                tips: "பயனுள்ள குறிப்புகள்",
            },
            Language::German => SectionLabels {
                title: "Nachsorge-Bericht",
                summary: "Zusammenfassung",
                risk: "Risikostufe",
                follow_up: "Nachsorge",
                monitoring: "Überwachung",
                tips: "Nützliche Tipps",
            },
            Language::Malayalam => SectionLabels {
                title: "ഡിസ്ചാർജ് ശേഷമുള്ള പരിചരണ റിപ്പോർട്ട്",
                summary: "സംക്ഷേപം",
                risk: "റിസ്‌ക് നില",
                follow_up: "ഫോളോ-അപ്പ്",
                monitoring: "നിരീക്ഷണം",
                tips: "ഉപകാരപ്രദമായ നിർദ്ദേശങ്ങൾ",
            },
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        Language::parse(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.name().to_string()
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Care plan
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevel {
    pub explanation: String,
    pub things_to_watch: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUp {
    pub appointment: String,
    pub date: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    pub weight_check: Vec<String>,
    pub symptoms_to_watch: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarePlan {
    pub risk_level: RiskLevel,
    pub follow_up_plan: Vec<FollowUp>,
    pub monitoring: Monitoring,
    pub tips: Vec<String>,
}

impl CarePlan {
    /// Plan shown when the narrative service could not be reached
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            risk_level: RiskLevel {
                explanation: format!("Error: {}", reason),
                things_to_watch: Vec::new(),
            },
            ..Self::default()
        }
    }

    /// Build a plan from a parsed JSON object, keeping whatever fits.
    ///
    /// Scalars are accepted wherever text is expected; other shapes are
    /// dropped.
    pub fn from_json(value: &JsonValue) -> Self {
        let risk = &value["risk_level"];
        let monitoring = &value["monitoring"];

        Self {
            risk_level: RiskLevel {
                explanation: text(&risk["explanation"]).unwrap_or_default(),
                things_to_watch: texts(&risk["things_to_watch"]),
            },
            follow_up_plan: value["follow_up_plan"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter(|item| item.is_object())
                        .map(|item| FollowUp {
                            appointment: text(&item["appointment"]).unwrap_or_default(),
                            date: text(&item["date"]).unwrap_or_default(),
                            instructions: text(&item["instructions"]).unwrap_or_default(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            monitoring: Monitoring {
                weight_check: texts(&monitoring["weight_check"]),
                symptoms_to_watch: texts(&monitoring["symptoms_to_watch"]),
            },
            tips: texts(&value["tips"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Plain text read out by the speech service
    pub fn speech_text(&self, language: Language, diagnosis: Option<&str>) -> String {
        let labels = language.labels();
        let mut parts: Vec<String> = Vec::new();

        if let Some(diagnosis) = diagnosis.map(str::trim).filter(|d| !d.is_empty()) {
            parts.push(format!("{}: {}", labels.summary, diagnosis));
        }
        if !self.risk_level.explanation.trim().is_empty() {
            parts.push(format!("{}: {}", labels.risk, self.risk_level.explanation));
        }
        parts.extend(self.risk_level.things_to_watch.iter().cloned());
        parts.extend(self.follow_up_plan.iter().map(|f| {
            format!("{} - {}: {}", f.appointment, f.date, f.instructions)
        }));
        parts.extend(self.monitoring.weight_check.iter().cloned());
        parts.extend(self.monitoring.symptoms_to_watch.iter().cloned());
        parts.extend(self.tips.iter().cloned());

        let text = parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() {
            EMPTY_SPEECH_TEXT.to_string()
        } else {
            text
        }
    }
}

fn text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn texts(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items.iter().filter_map(text).filter(|s| !s.is_empty()).collect(),
        other => text(other).filter(|s| !s.is_empty()).into_iter().collect(),
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Remove markdown code fences and a leading `json` language marker
fn strip_fences(text: &str) -> String {
    match Regex::new(r"(?m)```(?:json)?|^\s*json\s*$") {
        Ok(fences) => fences.replace_all(text, "").trim().to_string(),
        Err(_) => text.replace("```", "").trim().to_string(),
    }
}

/// Recover the JSON object from narrative output.
///
/// Tries the cleaned text as a whole, then the span from the first `{` to
/// the last `}`.
pub fn extract_json(text: &str) -> Option<JsonValue> {
    let cleaned = strip_fences(text);

    if let Ok(value) = serde_json::from_str::<JsonValue>(&cleaned) {
        if value.is_object() {
            return Some(value);
        }
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<JsonValue>(&cleaned[start..=end])
        .ok()
        .filter(JsonValue::is_object)
}

/// Extract a care plan from narrative output; empty when nothing parses
pub fn extract_care_plan(text: &str) -> CarePlan {
    match extract_json(text) {
        Some(value) => CarePlan::from_json(&value),
        None => {
            tracing::warn!(chars = text.len(), "narrative output contained no JSON object");
            CarePlan::default()
        },
    }
}

/// Instructions sent to the narrative service
pub fn prompt(patient: &PatientSummary, language: Language) -> String {
    let age = patient
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let diagnosis = patient.diagnosis.as_deref().unwrap_or("Unknown");

    format!(
        r#"You are a healthcare guide.
Create a simple, patient-friendly discharge care plan.
Language: {language}.
Respond ONLY in JSON.

JSON format:
{{
  "risk_level": {{"explanation": "simple text", "things_to_watch": ["symptom1", "symptom2"]}},
  "follow_up_plan": [{{"appointment": "doctor type", "date": "when", "instructions": "simple text"}}],
  "monitoring": {{"weight_check": ["instructions"], "symptoms_to_watch": ["symptom1", "symptom2"]}},
  "tips": ["advice1", "advice2"]
}}

Patient Info:
- Age: {age}
- Diagnosis: {diagnosis}
- Risk: {risk}
"#,
        language = language.name(),
        age = age,
        diagnosis = diagnosis,
        risk = patient.risk_category,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::patient::RiskCategory;
    use serde_json::json;

    const PLAN_JSON: &str = r#"{
        "risk_level": {"explanation": "Moderate risk", "things_to_watch": ["Chest pain", "Fever"]},
        "follow_up_plan": [{"appointment": "Cardiology", "date": "In 7 days", "instructions": "Bring your medicines"}],
        "monitoring": {"weight_check": ["Weigh every morning"], "symptoms_to_watch": ["Swollen ankles"]},
        "tips": ["Drink water"]
    }"#;

    #[test]
    fn test_language_lookup() {
        assert_eq!(Language::parse("hindi"), Language::Hindi);
        assert_eq!(Language::parse(" ML "), Language::Malayalam);
        assert_eq!(Language::parse("Klingon"), Language::English);
        assert_eq!(Language::German.code(), "de");
        assert_eq!(Language::ALL.len(), 7);
    }

    #[test]
    fn test_language_serde_falls_back_to_english() {
        let lang: Language = serde_json::from_value(json!("Tamil")).unwrap();
        assert_eq!(lang, Language::Tamil);
        let lang: Language = serde_json::from_value(json!("Esperanto")).unwrap();
        assert_eq!(lang, Language::English);
        assert_eq!(serde_json::to_value(Language::French).unwrap(), json!("French"));
    }

    #[test]
    fn test_extract_plain_json() {
        let plan = extract_care_plan(PLAN_JSON);
        assert_eq!(plan.risk_level.explanation, "Moderate risk");
        assert_eq!(plan.follow_up_plan[0].appointment, "Cardiology");
        assert_eq!(plan.monitoring.symptoms_to_watch, vec!["Swollen ankles"]);
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = format!("```json\n{}\n```", PLAN_JSON);
        assert_eq!(extract_care_plan(&text), extract_care_plan(PLAN_JSON));

        let text = format!("json\n{}", PLAN_JSON);
        assert_eq!(extract_care_plan(&text), extract_care_plan(PLAN_JSON));
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let text = format!("Here is your plan:\n{}\nTake care!", PLAN_JSON);
        assert_eq!(extract_care_plan(&text).tips, vec!["Drink water"]);
    }

    #[test]
    fn test_unparseable_output_yields_empty_plan() {
        assert!(extract_care_plan("I cannot help with that.").is_empty());
        assert!(extract_care_plan("} backwards {").is_empty());
        assert!(extract_care_plan("[1, 2, 3]").is_empty());
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let plan = extract_care_plan(r#"{"tips": ["Rest"], "monitoring": "daily", "follow_up_plan": [3]}"#);
        assert_eq!(plan.tips, vec!["Rest"]);
        assert!(plan.risk_level.explanation.is_empty());
        assert!(plan.follow_up_plan.is_empty());
        assert!(plan.monitoring.weight_check.is_empty());
    }

    #[test]
    fn test_speech_text_order() {
        let plan = extract_care_plan(PLAN_JSON);
        let text = plan.speech_text(Language::English, Some("Heart failure"));
        assert_eq!(
            text,
            "Summary: Heart failure Risk Level: Moderate risk Chest pain Fever \
             Cardiology - In 7 days: Bring your medicines Weigh every morning \
             Swollen ankles Drink water"
        );
    }

    #[test]
    fn test_speech_text_uses_language_labels() {
        let plan = CarePlan::failed("timeout");
        let text = plan.speech_text(Language::Spanish, None);
        assert_eq!(text, "Nivel de Riesgo: Error: timeout");
    }

    #[test]
    fn test_empty_plan_speech_text() {
        assert_eq!(
            CarePlan::default().speech_text(Language::English, Some("  ")),
            EMPTY_SPEECH_TEXT
        );
    }

    #[test]
    fn test_prompt_mentions_language_and_patient() {
        let summary = PatientSummary {
            subject_id: Some(42),
            age: Some(71),
            diagnosis: Some("PNEUMONIA".to_string()),
            risk_category: RiskCategory::High,
        };
        let prompt = prompt(&summary, Language::French);
        assert!(prompt.contains("Language: French."));
        assert!(prompt.contains("- Age: 71"));
        assert!(prompt.contains("- Diagnosis: PNEUMONIA"));
        assert!(prompt.contains("- Risk: High"));
    }
}
