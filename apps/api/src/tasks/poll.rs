//! Three-state polling of background tasks through the session.
//!
//! The session remembers which task a page is waiting on. Each page load
//! looks the task up and moves the view between processing, success and error.
//! The decision functions are pure over the session and the looked-up status;
//! the `load_*` wrappers do the broker round-trip.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ai::analysis::ANALYSIS_DISABLED_MESSAGE;
use crate::auth::session::{CompletedAnalysis, SessionData};
use crate::tasks::model::{Job, TaskRecord, TaskState};
use crate::tasks::queue::{QueueError, TaskQueue};

/// Result of a task status lookup. `Ok(None)` is an unknown or expired task.
pub type TaskLookup = Result<Option<TaskRecord>, QueueError>;

pub const ANALYSIS_CHECK_COOLDOWN_SECS: i64 = 2;

// ────────────────────────────────────────────────────────────────────────────
// PDF download progress
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PdfProgress {
    pub processing: bool,
    pub progress: u8,
    pub status: String,
    pub download_url: Option<String>,
}

impl PdfProgress {
    fn processing(progress: u8, status: &str) -> Self {
        Self {
            processing: true,
            progress,
            status: status.to_string(),
            download_url: None,
        }
    }

    fn failed() -> Self {
        Self {
            status: "PDF generation failed".to_string(),
            ..Self::default()
        }
    }
}

/// `lookup` is `None` when the session holds no PDF task.
pub fn pdf_progress(session: &mut SessionData, lookup: Option<TaskLookup>) -> PdfProgress {
    let Some(lookup) = lookup else {
        return PdfProgress::default();
    };

    match lookup {
        Ok(Some(record)) => match record.state {
            TaskState::Success { result } => {
                session.pdf_task_id = None;
                match result.get("download_url").and_then(|v| v.as_str()) {
                    Some(url) => PdfProgress {
                        download_url: Some(url.to_string()),
                        ..PdfProgress::default()
                    },
                    None => PdfProgress::failed(),
                }
            }
            TaskState::Pending => PdfProgress::processing(0, "Starting PDF generation..."),
            TaskState::Progress { current, status, .. } => PdfProgress::processing(current, &status),
            TaskState::Failure { .. } => {
                session.pdf_task_id = None;
                PdfProgress::failed()
            }
        },
        Ok(None) => {
            session.pdf_task_id = None;
            PdfProgress::failed()
        }
        // The broker is unreachable; keep waiting rather than dropping the task.
        Err(_) => PdfProgress::processing(50, "Processing..."),
    }
}

pub async fn load_pdf_progress(session: &mut SessionData, queue: &dyn TaskQueue) -> PdfProgress {
    let lookup = match session.pdf_task_id {
        Some(id) => Some(queue.status(id).await),
        None => None,
    };
    pdf_progress(session, lookup)
}

/// Queues an on-demand PDF and remembers it in the session.
pub async fn start_pdf_download(
    session: &mut SessionData,
    queue: &dyn TaskQueue,
    cv_id: i64,
    owner_id: i64,
) -> Result<Uuid, QueueError> {
    let id = queue
        .enqueue(Job::GenerateCvPdfDownload { cv_id }, Some(owner_id))
        .await?;
    session.pdf_task_id = Some(id);
    Ok(id)
}

// ────────────────────────────────────────────────────────────────────────────
// CV analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisView {
    pub warning: Option<&'static str>,
    pub complete: Option<CompletedAnalysis>,
    pub processing: bool,
    pub question: String,
    pub error: Option<String>,
}

pub async fn start_analysis(
    session: &mut SessionData,
    queue: &dyn TaskQueue,
    cv_id: i64,
    owner_id: i64,
    question: &str,
) -> Result<Uuid, String> {
    let question = question.trim();
    if question.is_empty() {
        return Err("Please enter a question".to_string());
    }
    if session.analysis_processing {
        return Err("Analysis already in progress".to_string());
    }

    let id = queue
        .enqueue(
            Job::AnalyzeCv {
                cv_id,
                question: question.to_string(),
            },
            Some(owner_id),
        )
        .await
        .map_err(|e| e.to_string())?;

    session.clear_analysis();
    session.analysis_task_id = Some(id);
    session.analysis_question = Some(question.to_string());
    session.analysis_processing = true;
    Ok(id)
}

/// Task to look up on this page load, if any: there must be no stored result,
/// a pending task, and the last check must be older than the cooldown.
pub fn analysis_lookup_target(session: &SessionData, now: DateTime<Utc>) -> Option<Uuid> {
    if session.analysis_complete.is_some() {
        return None;
    }
    let id = session.analysis_task_id?;
    let cooling_down = session
        .analysis_last_check
        .is_some_and(|last| now - last <= Duration::seconds(ANALYSIS_CHECK_COOLDOWN_SECS));
    (!cooling_down).then_some(id)
}

/// Builds the analysis panel. `lookup` is the status of the task returned by
/// `analysis_lookup_target`, or `None` if no lookup was made.
pub fn analysis_context(
    session: &mut SessionData,
    lookup: Option<TaskLookup>,
    ai_enabled: bool,
    now: DateTime<Utc>,
) -> AnalysisView {
    let mut view = AnalysisView {
        warning: (!ai_enabled).then_some(ANALYSIS_DISABLED_MESSAGE),
        ..AnalysisView::default()
    };

    if let Some(complete) = &session.analysis_complete {
        view.complete = Some(complete.clone());
        return view;
    }
    if session.analysis_task_id.is_none() {
        return view;
    }

    let question = session.analysis_question.clone().unwrap_or_default();
    let Some(lookup) = lookup else {
        view.processing = true;
        view.question = question;
        return view;
    };

    match lookup {
        Ok(Some(TaskRecord {
            state: TaskState::Success { result },
            ..
        })) => {
            let complete = CompletedAnalysis {
                question,
                analysis: result
                    .get("analysis")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                is_enabled: result
                    .get("is_enabled")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            };
            session.analysis_complete = Some(complete.clone());
            session.analysis_task_id = None;
            session.analysis_processing = false;
            view.complete = Some(complete);
        }
        Ok(Some(TaskRecord {
            state: TaskState::Pending | TaskState::Progress { .. },
            ..
        }))
        | Err(_) => {
            view.processing = true;
            view.question = question;
        }
        Ok(Some(TaskRecord {
            state: TaskState::Failure { .. },
            ..
        }))
        | Ok(None) => {
            session.clear_analysis();
            view.error = Some("Analysis failed. Please try again.".to_string());
        }
    }

    session.analysis_last_check = Some(now);
    view
}

pub async fn load_analysis_context(
    session: &mut SessionData,
    queue: &dyn TaskQueue,
    ai_enabled: bool,
    now: DateTime<Utc>,
) -> AnalysisView {
    let lookup = match analysis_lookup_target(session, now) {
        Some(id) => Some(queue.status(id).await),
        None => None,
    };
    analysis_context(session, lookup, ai_enabled, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::TaskEnvelope;
    use crate::tasks::queue::testing::MemoryTaskQueue;
    use serde_json::json;

    fn record(id: Uuid, job: Job, state: TaskState) -> TaskRecord {
        let envelope = TaskEnvelope {
            id,
            owner_id: Some(1),
            job,
        };
        TaskRecord::pending(&envelope, Utc::now()).with_state(state, Utc::now())
    }

    fn pdf_record(id: Uuid, state: TaskState) -> TaskRecord {
        record(id, Job::GenerateCvPdfDownload { cv_id: 1 }, state)
    }

    fn analysis_record(id: Uuid, state: TaskState) -> TaskRecord {
        record(
            id,
            Job::AnalyzeCv {
                cv_id: 1,
                question: "Strengths?".to_string(),
            },
            state,
        )
    }

    fn session_with_pdf(id: Uuid) -> SessionData {
        SessionData {
            pdf_task_id: Some(id),
            ..SessionData::for_user(1)
        }
    }

    fn session_with_analysis(id: Uuid) -> SessionData {
        SessionData {
            analysis_task_id: Some(id),
            analysis_question: Some("Strengths?".to_string()),
            analysis_processing: true,
            ..SessionData::for_user(1)
        }
    }

    // ── PDF ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_pdf_idle_without_task() {
        let mut session = SessionData::for_user(1);
        let progress = pdf_progress(&mut session, None);
        assert_eq!(progress, PdfProgress::default());
        assert!(!progress.processing);
        assert_eq!(progress.status, "");
    }

    #[test]
    fn test_pdf_success_clears_session() {
        let id = Uuid::new_v4();
        let mut session = session_with_pdf(id);
        let done = pdf_record(
            id,
            TaskState::Success {
                result: json!({ "download_url": "/media/downloads/cv_1_abcd1234.pdf" }),
            },
        );
        let progress = pdf_progress(&mut session, Some(Ok(Some(done))));
        assert_eq!(progress.download_url.as_deref(), Some("/media/downloads/cv_1_abcd1234.pdf"));
        assert!(!progress.processing);
        assert_eq!(session.pdf_task_id, None);
    }

    #[test]
    fn test_pdf_pending_and_progress() {
        let id = Uuid::new_v4();
        let mut session = session_with_pdf(id);

        let pending = pdf_progress(&mut session, Some(Ok(Some(pdf_record(id, TaskState::Pending)))));
        assert_eq!(pending, PdfProgress::processing(0, "Starting PDF generation..."));

        let running = pdf_record(
            id,
            TaskState::Progress {
                current: 50,
                total: 100,
                status: "PDF generated, saving...".to_string(),
            },
        );
        let progress = pdf_progress(&mut session, Some(Ok(Some(running))));
        assert_eq!(progress, PdfProgress::processing(50, "PDF generated, saving..."));
        assert_eq!(session.pdf_task_id, Some(id));
    }

    #[test]
    fn test_pdf_failure_and_unknown_clear_session() {
        let id = Uuid::new_v4();
        let mut session = session_with_pdf(id);
        let failed = pdf_record(
            id,
            TaskState::Failure {
                error: "CV with ID 1 not found".to_string(),
            },
        );
        let progress = pdf_progress(&mut session, Some(Ok(Some(failed))));
        assert_eq!(progress.status, "PDF generation failed");
        assert!(!progress.processing);
        assert_eq!(session.pdf_task_id, None);

        let mut session = session_with_pdf(id);
        let progress = pdf_progress(&mut session, Some(Ok(None)));
        assert_eq!(progress.status, "PDF generation failed");
        assert_eq!(session.pdf_task_id, None);
    }

    #[test]
    fn test_pdf_broker_error_keeps_waiting() {
        let id = Uuid::new_v4();
        let mut session = session_with_pdf(id);
        let progress = pdf_progress(
            &mut session,
            Some(Err(QueueError::Unavailable("connection refused".to_string()))),
        );
        assert_eq!(progress, PdfProgress::processing(50, "Processing..."));
        assert_eq!(session.pdf_task_id, Some(id));
    }

    #[tokio::test]
    async fn test_start_pdf_download_remembers_task() {
        let queue = MemoryTaskQueue::default();
        let mut session = SessionData::for_user(1);
        let id = start_pdf_download(&mut session, &queue, 4, 1).await.unwrap();
        assert_eq!(session.pdf_task_id, Some(id));
        assert_eq!(queue.queued_jobs(), vec![Job::GenerateCvPdfDownload { cv_id: 4 }]);
    }

    // ── Analysis ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_start_analysis_validations() {
        let queue = MemoryTaskQueue::default();
        let mut session = SessionData::for_user(1);
        assert_eq!(
            start_analysis(&mut session, &queue, 1, 1, "   ").await,
            Err("Please enter a question".to_string())
        );

        start_analysis(&mut session, &queue, 1, 1, "Strengths?").await.unwrap();
        assert!(session.analysis_processing);
        assert_eq!(session.analysis_question.as_deref(), Some("Strengths?"));

        assert_eq!(
            start_analysis(&mut session, &queue, 1, 1, "Again?").await,
            Err("Analysis already in progress".to_string())
        );
    }

    #[tokio::test]
    async fn test_start_analysis_surfaces_enqueue_error() {
        let queue = MemoryTaskQueue::offline();
        let mut session = SessionData::for_user(1);
        let err = start_analysis(&mut session, &queue, 1, 1, "Strengths?")
            .await
            .unwrap_err();
        assert!(err.contains("connection refused"));
        assert!(!session.analysis_processing);
    }

    #[test]
    fn test_cooldown_uses_cached_state() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut session = session_with_analysis(id);
        session.analysis_last_check = Some(now - Duration::seconds(1));

        assert_eq!(analysis_lookup_target(&session, now), None);
        let view = analysis_context(&mut session, None, true, now);
        assert!(view.processing);
        assert_eq!(view.question, "Strengths?");

        session.analysis_last_check = Some(now - Duration::seconds(3));
        assert_eq!(analysis_lookup_target(&session, now), Some(id));
    }

    #[test]
    fn test_analysis_success_is_stored() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut session = session_with_analysis(id);
        let done = analysis_record(
            id,
            TaskState::Success {
                result: json!({ "analysis": "Strong maths.", "is_enabled": true, "cv_id": 1 }),
            },
        );

        let view = analysis_context(&mut session, Some(Ok(Some(done))), true, now);
        let expected = CompletedAnalysis {
            question: "Strengths?".to_string(),
            analysis: "Strong maths.".to_string(),
            is_enabled: true,
        };
        assert_eq!(view.complete.as_ref(), Some(&expected));
        assert_eq!(session.analysis_complete, Some(expected));
        assert_eq!(session.analysis_task_id, None);
        assert!(!session.analysis_processing);
        assert_eq!(session.analysis_last_check, Some(now));

        // Completed results win over any later lookup.
        assert_eq!(analysis_lookup_target(&session, now + Duration::seconds(10)), None);
    }

    #[test]
    fn test_analysis_in_flight_or_broker_error_is_processing() {
        let id = Uuid::new_v4();
        let mut session = session_with_analysis(id);
        let view = analysis_context(
            &mut session,
            Some(Ok(Some(analysis_record(id, TaskState::Pending)))),
            true,
            Utc::now(),
        );
        assert!(view.processing);

        let view = analysis_context(
            &mut session,
            Some(Err(QueueError::Unavailable("down".to_string()))),
            true,
            Utc::now(),
        );
        assert!(view.processing);
        assert_eq!(session.analysis_task_id, Some(id));
    }

    #[test]
    fn test_analysis_failure_clears_session() {
        let id = Uuid::new_v4();
        let mut session = session_with_analysis(id);
        let failed = analysis_record(
            id,
            TaskState::Failure {
                error: "boom".to_string(),
            },
        );
        let view = analysis_context(&mut session, Some(Ok(Some(failed))), true, Utc::now());
        assert_eq!(view.error.as_deref(), Some("Analysis failed. Please try again."));
        assert_eq!(session.analysis_task_id, None);
        assert_eq!(session.analysis_question, None);
        assert!(!session.analysis_processing);
    }

    #[test]
    fn test_disabled_ai_adds_warning() {
        let mut session = SessionData::for_user(1);
        let view = analysis_context(&mut session, None, false, Utc::now());
        assert_eq!(view.warning, Some(ANALYSIS_DISABLED_MESSAGE));
        assert!(!view.processing);
    }

    #[tokio::test]
    async fn test_load_analysis_context_round_trip() {
        let queue = MemoryTaskQueue::default();
        let mut session = SessionData::for_user(1);
        let id = start_analysis(&mut session, &queue, 1, 1, "Strengths?").await.unwrap();
        queue.insert(analysis_record(
            id,
            TaskState::Success {
                result: json!({ "analysis": "Good.", "is_enabled": false }),
            },
        ));

        let view = load_analysis_context(&mut session, &queue, true, Utc::now()).await;
        assert_eq!(view.complete.unwrap().analysis, "Good.");
    }
}
