//! The CV detail page: one form endpoint that starts PDF exports, emails,
//! translations and analyses, and a GET that polls their state.

use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    Form,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::ai::translation::translate_cv;
use crate::ai::Language;
use crate::auth::extract::PageUser;
use crate::auth::session::{FlashLevel, SessionData};
use crate::cv::repository::get_cv;
use crate::email::is_valid_email;
use crate::models::cv::Cv;
use crate::state::AppState;
use crate::tasks::jobs::email_cv_pdf;
use crate::tasks::model::Job;
use crate::tasks::poll::{load_analysis_context, load_pdf_progress, start_analysis, start_pdf_download};
use crate::tasks::progress::ProgressReporter;
use crate::web::templates::{cv_detail_page, CvDetail};
use crate::web::{save_session, PageError};

/// Fields posted by the detail page's forms. Each present field triggers its action.
#[derive(Debug, Default, Deserialize)]
pub struct DetailForm {
    pub download_pdf_async: Option<String>,
    pub email: Option<String>,
    pub lang: Option<String>,
    pub start_analysis: Option<String>,
    pub analysis_question: Option<String>,
    pub clear_analysis: Option<String>,
}

/// GET /cv/:id/
pub async fn cv_detail(
    State(state): State<AppState>,
    PageUser(mut current): PageUser,
    Path(id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let cv = get_cv(&state.db, id).await?;
    let data = &mut current.session.data;

    let flashes = data.take_flashes();
    let translated = data.translation.take().filter(|t| t.cv_id == cv.id);
    let pdf = load_pdf_progress(data, state.queue.as_ref()).await;
    let analysis = load_analysis_context(data, state.queue.as_ref(), state.analyst.is_enabled(), Utc::now()).await;
    save_session(&state, &current.session).await?;

    Ok(cv_detail_page(&CvDetail {
        cv: &cv,
        user: &current.user,
        can_modify: cv.can_modify(current.user.id, current.is_admin()),
        flashes: &flashes,
        translated: translated.as_ref(),
        pdf: &pdf,
        analysis: &analysis,
    }))
}

/// POST /cv/:id/
pub async fn cv_detail_action(
    State(state): State<AppState>,
    PageUser(mut current): PageUser,
    Path(id): Path<i64>,
    Form(form): Form<DetailForm>,
) -> Result<Redirect, PageError> {
    let cv = get_cv(&state.db, id).await?;
    let user_id = current.user.id;
    apply_action(&state, &mut current.session.data, user_id, &cv, form).await;
    save_session(&state, &current.session).await?;
    Ok(Redirect::to(&format!("/cv/{id}/")))
}

async fn apply_action(state: &AppState, data: &mut SessionData, user_id: i64, cv: &Cv, form: DetailForm) {
    if form.download_pdf_async.is_some() {
        if let Err(e) = start_pdf_download(data, state.queue.as_ref(), cv.id, user_id).await {
            warn!(cv_id = cv.id, "Could not queue PDF generation: {e}");
            data.flash(FlashLevel::Error, format!("Failed to start PDF generation: {e}"));
        }
        return;
    }

    if let Some(recipient) = form.email.as_deref() {
        let (level, message) = request_email(state, user_id, cv, recipient).await;
        data.flash(level, message);
    }

    if let Some(language) = form.lang.as_deref().and_then(Language::parse) {
        data.translation = Some(translate_cv(state.translator.as_ref(), cv, language).await);
    }

    if form.start_analysis.is_some() {
        let question = form.analysis_question.as_deref().unwrap_or_default();
        if let Err(message) = start_analysis(data, state.queue.as_ref(), cv.id, user_id, question).await {
            data.flash(FlashLevel::Error, message);
        }
    }

    if form.clear_analysis.is_some() {
        data.clear_analysis();
    }
}

/// Queues the PDF email. When the broker is down the PDF is rendered and sent inline.
async fn request_email(state: &AppState, user_id: i64, cv: &Cv, recipient: &str) -> (FlashLevel, String) {
    let recipient = recipient.trim();
    if !is_valid_email(recipient) {
        return (FlashLevel::Error, "Please enter a valid email address".to_string());
    }

    let job = Job::EmailCvPdf {
        cv_id: cv.id,
        recipient: recipient.to_string(),
    };
    match state.queue.enqueue(job, Some(user_id)).await {
        Ok(task_id) => {
            info!(cv_id = cv.id, %task_id, "Email task queued");
            (
                FlashLevel::Success,
                format!("PDF will be sent to {recipient} shortly. Check your email in a few moments."),
            )
        }
        Err(e) if e.is_unavailable() => {
            warn!(cv_id = cv.id, "Broker unavailable, sending email inline: {e}");
            match email_cv_pdf(&state.email, cv, recipient, &ProgressReporter::detached()).await {
                Ok(_) => (
                    FlashLevel::Success,
                    format!("PDF sent to {recipient} successfully (fallback mode)."),
                ),
                Err(send_err) => {
                    warn!(cv_id = cv.id, "Inline email failed: {send_err}");
                    (FlashLevel::Error, format!("Failed to send email: {e}"))
                }
            }
        }
        Err(e) => (FlashLevel::Error, format!("Failed to send email: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::sample_cv;
    use crate::state::testing::test_state;
    use crate::tasks::queue::testing::MemoryTaskQueue;
    use std::sync::Arc;

    fn form() -> DetailForm {
        DetailForm::default()
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected() {
        let (state, queue, _) = test_state();
        let (level, message) = request_email(&state, 1, &sample_cv(1, Some(1)), "not-an-email").await;
        assert_eq!(level, FlashLevel::Error);
        assert_eq!(message, "Please enter a valid email address");
        assert!(queue.queued_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_email_is_queued() {
        let (state, queue, _) = test_state();
        let (level, message) = request_email(&state, 1, &sample_cv(2, Some(1)), " hr@example.com ").await;
        assert_eq!(level, FlashLevel::Success);
        assert_eq!(
            message,
            "PDF will be sent to hr@example.com shortly. Check your email in a few moments."
        );
        assert_eq!(
            queue.queued_jobs(),
            vec![Job::EmailCvPdf {
                cv_id: 2,
                recipient: "hr@example.com".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_email_falls_back_to_inline_send() {
        let (mut state, _, _) = test_state();
        state.queue = Arc::new(MemoryTaskQueue::offline());
        let (level, message) = request_email(&state, 1, &sample_cv(2, Some(1)), "hr@example.com").await;
        assert_eq!(level, FlashLevel::Success);
        assert_eq!(message, "PDF sent to hr@example.com successfully (fallback mode).");
    }

    #[tokio::test]
    async fn test_pdf_request_remembers_task() {
        let (state, queue, _) = test_state();
        let mut data = SessionData::for_user(1);
        let action = DetailForm {
            download_pdf_async: Some("1".to_string()),
            ..form()
        };
        apply_action(&state, &mut data, 1, &sample_cv(5, Some(1)), action).await;
        assert!(data.pdf_task_id.is_some());
        assert_eq!(queue.queued_jobs(), vec![Job::GenerateCvPdfDownload { cv_id: 5 }]);
    }

    #[tokio::test]
    async fn test_translation_is_stored_and_unknown_language_ignored() {
        let (state, _, _) = test_state();
        let cv = sample_cv(5, Some(1));
        let mut data = SessionData::for_user(1);

        let unknown = DetailForm {
            lang: Some("Klingon".to_string()),
            ..form()
        };
        apply_action(&state, &mut data, 1, &cv, unknown).await;
        assert!(data.translation.is_none());

        let breton = DetailForm {
            lang: Some("Breton".to_string()),
            ..form()
        };
        apply_action(&state, &mut data, 1, &cv, breton).await;
        let translated = data.translation.unwrap();
        assert_eq!(translated.name, "[Breton] Ada Lovelace");
    }

    #[tokio::test]
    async fn test_blank_question_flashes_error() {
        let (state, queue, _) = test_state();
        let mut data = SessionData::for_user(1);
        let action = DetailForm {
            start_analysis: Some("1".to_string()),
            analysis_question: Some("  ".to_string()),
            ..form()
        };
        apply_action(&state, &mut data, 1, &sample_cv(5, Some(1)), action).await;
        let flashes = data.take_flashes();
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].message, "Please enter a question");
        assert!(queue.queued_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_clear_analysis() {
        let (state, _, _) = test_state();
        let mut data = SessionData::for_user(1);
        data.analysis_question = Some("q".to_string());
        data.analysis_processing = true;
        let action = DetailForm {
            clear_analysis: Some("1".to_string()),
            ..form()
        };
        apply_action(&state, &mut data, 1, &sample_cv(5, Some(1)), action).await;
        assert_eq!(data, SessionData::for_user(1));
    }
}
