use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::ai::prompts::{analysis_prompt, cv_content, ANALYSIS_PARAMS, ANALYSIS_SYSTEM};
use crate::llm_client::{LlmClient, LlmError};
use crate::models::cv::Cv;

pub const ANALYSIS_DISABLED_MESSAGE: &str =
    "CV analysis is not available. Please configure OpenAI API key.";

#[async_trait]
pub trait CvAnalyst: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn analyze(&self, content: &str, question: &str) -> Result<String, LlmError>;
}

pub struct OpenAiAnalyst {
    llm: LlmClient,
}

impl OpenAiAnalyst {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CvAnalyst for OpenAiAnalyst {
    fn is_enabled(&self) -> bool {
        self.llm.is_enabled()
    }

    async fn analyze(&self, content: &str, question: &str) -> Result<String, LlmError> {
        let prompt = analysis_prompt(content, question);
        self.llm
            .complete(ANALYSIS_SYSTEM, &prompt, ANALYSIS_PARAMS)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub analysis: String,
    pub is_enabled: bool,
}

/// Answers a question about a CV. Never fails: provider errors become the analysis text.
pub async fn analyze_cv(analyst: &dyn CvAnalyst, cv: &Cv, question: &str) -> AnalysisOutcome {
    if !analyst.is_enabled() {
        return AnalysisOutcome {
            analysis: ANALYSIS_DISABLED_MESSAGE.to_string(),
            is_enabled: false,
        };
    }

    match analyst.analyze(&cv_content(cv), question).await {
        Ok(analysis) => {
            info!(cv_id = cv.id, chars = analysis.len(), "CV analysed");
            AnalysisOutcome {
                analysis,
                is_enabled: true,
            }
        }
        Err(e) => {
            error!(cv_id = cv.id, "CV analysis failed: {e}");
            AnalysisOutcome {
                analysis: format!("Analysis failed: {e}"),
                is_enabled: true,
            }
        }
    }
}
