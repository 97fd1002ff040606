use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ai::languages::Language;
use crate::ai::prompts::{translation_prompt, TRANSLATION_PARAMS, TRANSLATION_SYSTEM};
use crate::llm_client::{LlmClient, LlmError};
use crate::models::cv::Cv;

pub const TRANSLATION_DISABLED_WARNING: &str =
    "Translation is not available. Please configure OpenAI API key.";

#[async_trait]
pub trait Translator: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn translate(&self, text: &str, language: Language) -> Result<String, LlmError>;
}

pub struct OpenAiTranslator {
    llm: LlmClient,
}

impl OpenAiTranslator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn is_enabled(&self) -> bool {
        self.llm.is_enabled()
    }

    async fn translate(&self, text: &str, language: Language) -> Result<String, LlmError> {
        let prompt = translation_prompt(language.name(), text);
        let translated = self
            .llm
            .complete(TRANSLATION_SYSTEM, &prompt, TRANSLATION_PARAMS)
            .await?;
        Ok(strip_wrapping_quotes(&translated).to_string())
    }
}

/// A CV rendered into another language. Fields that failed to translate keep their original text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedCv {
    pub cv_id: i64,
    pub language: Language,
    pub enabled: bool,
    pub name: String,
    pub bio: String,
    pub skills: String,
    pub projects: String,
    pub contacts: String,
}

impl TranslatedCv {
    pub fn warning(&self) -> Option<&'static str> {
        (!self.enabled).then_some(TRANSLATION_DISABLED_WARNING)
    }
}

/// Translates the name, bio, skills, projects and contacts of a CV concurrently.
pub async fn translate_cv(translator: &dyn Translator, cv: &Cv, language: Language) -> TranslatedCv {
    let name = cv.full_name();
    let (name, bio, skills, projects, contacts) = tokio::join!(
        translate_field(translator, &name, language),
        translate_field(translator, &cv.bio, language),
        translate_field(translator, &cv.skills, language),
        translate_field(translator, &cv.projects, language),
        translate_field(translator, &cv.contacts, language),
    );

    info!(cv_id = cv.id, language = %language, "CV translated");

    TranslatedCv {
        cv_id: cv.id,
        language,
        enabled: translator.is_enabled(),
        name,
        bio,
        skills,
        projects,
        contacts,
    }
}

async fn translate_field(translator: &dyn Translator, text: &str, language: Language) -> String {
    if text.trim().is_empty() || !translator.is_enabled() {
        return text.to_string();
    }
    match translator.translate(text, language).await {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => text.to_string(),
        Err(e) => {
            warn!("Translation to {language} failed, keeping original text: {e}");
            text.to_string()
        }
    }
}

fn strip_wrapping_quotes(text: &str) -> &str {
    let text = text.trim();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close)) {
            return inner.trim();
        }
    }
    text
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Prefixes text with the language name; fails for text containing "boom".
    pub struct FakeTranslator {
        pub enabled: bool,
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn translate(&self, text: &str, language: Language) -> Result<String, LlmError> {
            if text.contains("boom") {
                return Err(LlmError::EmptyContent);
            }
            Ok(format!("[{}] {text}", language.name()))
        }
    }
}
