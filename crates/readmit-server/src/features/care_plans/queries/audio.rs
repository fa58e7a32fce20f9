//! Spoken care plan

use serde::Deserialize;

use super::get_stored;
use crate::care_plan::Language;
use crate::error::ApiResult;
use crate::state::AppState;

pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarePlanAudioQuery {
    /// Language name or code; defaults to the plan's own language
    #[serde(default)]
    pub lang: Option<String>,
}

impl CarePlanAudioQuery {
    pub fn language(&self, stored: Language) -> Language {
        self.lang
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(Language::parse)
            .unwrap_or(stored)
    }
}

#[derive(Debug, Clone)]
pub struct CarePlanAudio {
    pub file_name: String,
    pub language: Language,
    pub bytes: Vec<u8>,
}

#[tracing::instrument(skip(state))]
pub async fn handle(
    state: &AppState,
    user: &str,
    subject_id: i64,
    query: CarePlanAudioQuery,
) -> ApiResult<CarePlanAudio> {
    let stored = get_stored(state, user, subject_id).await?;
    let language = query.language(stored.language);

    let text = stored
        .plan
        .speech_text(language, stored.patient.diagnosis.as_deref());
    let bytes = state.services.speech.synthesize(&text, language).await?;

    tracing::debug!(bytes = bytes.len(), language = %language, "care plan audio synthesized");

    Ok(CarePlanAudio {
        file_name: format!("patient_{}_careplan_{}.mp3", subject_id, language.code()),
        language,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_falls_back_to_stored() {
        let query = CarePlanAudioQuery { lang: None };
        assert_eq!(query.language(Language::Tamil), Language::Tamil);

        let blank = CarePlanAudioQuery {
            lang: Some(" ".to_string()),
        };
        assert_eq!(blank.language(Language::German), Language::German);

        let code = CarePlanAudioQuery {
            lang: Some("ml".to_string()),
        };
        assert_eq!(code.language(Language::English), Language::Malayalam);
    }
}
