use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::ai::analysis::analyze_cv;
use crate::cv::repository::find_cv;
use crate::email::messages::{cv_event_notice, cv_pdf_email, cv_pdf_filename, notification_email, CvEvent};
use crate::email::{EmailDispatcher, EmailError};
use crate::models::cv::Cv;
use crate::pdf::storage::{PdfStore, StorageError};
use crate::pdf::{render_cv_pdf_blocking, PdfError};
use crate::state::AppState;
use crate::tasks::cleanup::{cleanup_old_logs, cleanup_old_pdf_files};
use crate::tasks::model::Job;
use crate::tasks::progress::ProgressReporter;
use crate::tasks::stats::{generate_daily_stats, generate_weekly_report};

/// Prefix under which on-demand downloads are stored.
pub const DOWNLOADS_PREFIX: &str = "downloads/";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("CV with ID {0} not found")]
    CvNotFound(i64),

    #[error("time limit exceeded")]
    TimeLimitExceeded,

    #[error("invalid retention period: {0} days")]
    InvalidRetention(i64),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Pdf(#[from] PdfError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Email(#[from] EmailError),
}

/// Runs one job to completion and returns its JSON result.
pub async fn run_job(state: &AppState, job: &Job, progress: &ProgressReporter) -> Result<Value, JobError> {
    match job {
        Job::GenerateCvPdf { cv_id } => {
            let cv = load_cv(state, *cv_id).await?;
            generate_pdf(&cv, progress).await
        }
        Job::GenerateCvPdfDownload { cv_id } => {
            let cv = load_cv(state, *cv_id).await?;
            generate_pdf_download(state.pdf_store.as_ref(), &cv, progress).await
        }
        Job::EmailCvPdf { cv_id, recipient } => {
            let cv = load_cv(state, *cv_id).await?;
            email_cv_pdf(&state.email, &cv, recipient, progress).await
        }
        Job::AnalyzeCv { cv_id, question } => {
            let cv = load_cv(state, *cv_id).await?;
            analyze(state, &cv, question, progress).await
        }
        Job::SendNotification {
            recipient,
            subject,
            message,
        } => send_notification(&state.email, recipient, subject, message).await,
        Job::CvCreatedNotification { cv_id, user_email } => {
            let cv = load_cv(state, *cv_id).await?;
            let (subject, message) = cv_event_notice(&cv, CvEvent::Created);
            send_notification(&state.email, user_email, &subject, &message).await
        }
        Job::CvUpdatedNotification { cv_id, user_email } => {
            let cv = load_cv(state, *cv_id).await?;
            let (subject, message) = cv_event_notice(&cv, CvEvent::Updated);
            send_notification(&state.email, user_email, &subject, &message).await
        }
        Job::CleanupOldLogs { days } => cleanup_old_logs(&state.db, *days).await,
        Job::CleanupOldPdfFiles { days } => {
            cleanup_old_pdf_files(state.pdf_store.as_ref(), *days, Utc::now()).await
        }
        Job::GenerateDailyStats { date } => generate_daily_stats(&state.db, *date).await,
        Job::GenerateWeeklyReport { week_start } => {
            generate_weekly_report(&state.db, *week_start).await
        }
    }
}

async fn load_cv(state: &AppState, cv_id: i64) -> Result<Cv, JobError> {
    find_cv(&state.db, cv_id)
        .await?
        .ok_or(JobError::CvNotFound(cv_id))
}

/// Renders the PDF and returns it base64-encoded.
pub async fn generate_pdf(cv: &Cv, progress: &ProgressReporter) -> Result<Value, JobError> {
    progress.report(0, "Starting PDF generation...").await;
    let pdf = render_cv_pdf_blocking(cv, Utc::now()).await?;
    progress.report(50, "PDF generated, encoding...").await;
    let encoded = STANDARD.encode(&pdf);
    progress.report(100, "PDF generation complete!").await;

    info!(cv_id = cv.id, size = pdf.len(), "PDF generated");
    Ok(json!({
        "filename": cv_pdf_filename(cv),
        "size": pdf.len(),
        "pdf_data": encoded,
    }))
}

/// Renders the PDF into object storage and returns a download link.
pub async fn generate_pdf_download(
    store: &dyn PdfStore,
    cv: &Cv,
    progress: &ProgressReporter,
) -> Result<Value, JobError> {
    progress.report(0, "Starting PDF generation...").await;
    let pdf = render_cv_pdf_blocking(cv, Utc::now()).await?;
    progress.report(50, "PDF generated, saving...").await;

    let filename = download_filename(cv.id, Uuid::new_v4());
    let size = pdf.len();
    store.put(&format!("{DOWNLOADS_PREFIX}{filename}"), pdf).await?;
    progress.report(100, "PDF saved successfully!").await;

    info!(cv_id = cv.id, file = %filename, "PDF stored for download");
    Ok(json!({
        "download_url": format!("/media/{DOWNLOADS_PREFIX}{filename}"),
        "filename": filename,
        "size": size,
    }))
}

fn download_filename(cv_id: i64, id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("cv_{cv_id}_{}.pdf", &simple[..8])
}

/// Renders the PDF and mails it through the fallback chain.
pub async fn email_cv_pdf(
    email: &EmailDispatcher,
    cv: &Cv,
    recipient: &str,
    progress: &ProgressReporter,
) -> Result<Value, JobError> {
    progress.report(0, "Preparing email...").await;
    let pdf = render_cv_pdf_blocking(cv, Utc::now()).await?;
    progress.report(50, "PDF generated, sending email...").await;

    let message = cv_pdf_email(cv, recipient, pdf);
    let provider = email.deliver(&message).await?;
    progress.report(100, "Email sent successfully!").await;

    Ok(json!({
        "message": format!("CV sent to {}", message.to),
        "recipient": message.to,
        "provider": provider,
    }))
}

async fn analyze(state: &AppState, cv: &Cv, question: &str, progress: &ProgressReporter) -> Result<Value, JobError> {
    progress.report(0, "Starting analysis...").await;
    progress.report(25, "Analyzing CV content...").await;
    let outcome = analyze_cv(state.analyst.as_ref(), cv, question).await;
    progress.report(75, "Processing analysis results...").await;
    progress.report(100, "Analysis complete!").await;

    Ok(json!({
        "analysis": outcome.analysis,
        "question": question,
        "is_enabled": outcome.is_enabled,
        "cv_id": cv.id,
    }))
}

pub async fn send_notification(
    email: &EmailDispatcher,
    recipient: &str,
    subject: &str,
    message: &str,
) -> Result<Value, JobError> {
    let outgoing = notification_email(recipient, subject, message);
    let provider = email.deliver(&outgoing).await?;
    Ok(json!({
        "message": format!("Notification sent to {}", outgoing.to),
        "provider": provider,
    }))
}
