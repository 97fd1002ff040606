// Prompts for the translation and analysis providers.

use crate::llm_client::CallParams;
use crate::models::cv::Cv;

pub const TRANSLATION_SYSTEM: &str =
    "You are a precise translation engine. Preserve meaning; do not add explanations.";

pub const TRANSLATION_PARAMS: CallParams = CallParams {
    temperature: 1.0,
    max_output_tokens: 1200,
};

pub const ANALYSIS_SYSTEM: &str = "You are a professional CV reviewer and career advisor. \
    Provide constructive, actionable feedback.";

pub const ANALYSIS_PARAMS: CallParams = CallParams {
    temperature: 0.7,
    max_output_tokens: 1500,
};

pub fn translation_prompt(language: &str, text: &str) -> String {
    format!("Translate into {language}. Return only the translated text without quotes.\n\n{text}")
}

/// Plain-text rendering of a CV used as analysis context.
pub fn cv_content(cv: &Cv) -> String {
    format!(
        "Name: {}\nBio: {}\nSkills: {}\nProjects: {}\nContacts: {}",
        or_not_provided(&cv.full_name()),
        or_not_provided(&cv.bio),
        or_not_provided(&cv.skills),
        or_not_provided(&cv.projects),
        or_not_provided(&cv.contacts),
    )
}

pub fn analysis_prompt(cv_content: &str, question: &str) -> String {
    format!(
        "You are a professional CV reviewer and career advisor.\n\n\
         CV Content:\n{cv_content}\n\n\
         Question/Request: {question}\n\n\
         Please provide helpful, constructive feedback and suggestions. \
         Be specific, actionable, and professional in your response. \
         Focus on practical improvements the candidate can make."
    )
}

fn or_not_provided(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        "Not provided"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::sample_cv;

    #[test]
    fn test_cv_content_marks_empty_fields() {
        let mut cv = sample_cv(1, None);
        cv.projects = "   ".to_string();
        let content = cv_content(&cv);
        assert!(content.contains("Name: Ada Lovelace"));
        assert!(content.contains("Projects: Not provided"));
    }

    #[test]
    fn test_translation_prompt_names_language() {
        let prompt = translation_prompt("Breton", "Hello");
        assert!(prompt.starts_with("Translate into Breton."));
        assert!(prompt.ends_with("\n\nHello"));
    }
}
