//! AI-assisted CV features: translation into minority languages and free-form analysis.
//!
//! Both sit behind traits so handlers and jobs can be exercised without OpenAI.

pub mod analysis;
pub mod languages;
pub mod prompts;
pub mod translation;

pub use analysis::{AnalysisOutcome, CvAnalyst, OpenAiAnalyst};
pub use languages::Language;
pub use translation::{OpenAiTranslator, TranslatedCv, Translator};
