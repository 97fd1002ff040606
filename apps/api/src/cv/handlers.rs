use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::ai::translation::translate_cv;
use crate::ai::{Language, TranslatedCv};
use crate::auth::extract::CurrentUser;
use crate::cv::listing::{CvListQuery, CvListing};
use crate::cv::repository::{count_cvs, create_cv, delete_cv, get_cv, list_cvs, update_cv};
use crate::cv::validation::{validate_fields, CvPayload};
use crate::email::is_valid_email;
use crate::errors::AppError;
use crate::models::cv::{Cv, CvFields};
use crate::pagination::{Page, PageParams, PageRequest};
use crate::state::AppState;
use crate::tasks::handlers::TaskAccepted;
use crate::tasks::model::Job;

pub const CV_PAGE_SIZE: u32 = 5;

#[derive(Debug, Deserialize)]
pub struct EmailCvRequest {
    #[serde(default)]
    pub recipient: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeCvRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct TranslateCvRequest {
    pub language: String,
}

fn validated(fields: CvFields) -> Result<CvFields, AppError> {
    validate_fields(fields, true).map_err(|errors| AppError::Validation(errors.join(" ")))
}

/// Loads a CV the caller is allowed to change. Read access is open to any user.
async fn get_writable_cv(state: &AppState, current: &CurrentUser, id: i64) -> Result<Cv, AppError> {
    let cv = get_cv(&state.db, id).await?;
    if !cv.can_modify(current.user.id, current.is_admin()) {
        return Err(AppError::Forbidden);
    }
    Ok(cv)
}

async fn enqueue(state: &AppState, current: &CurrentUser, job: Job) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let name = job.name();
    let task_id = state.queue.enqueue(job, Some(current.user.id)).await?;
    info!(task = name, %task_id, user = current.user.id, "Task enqueued");
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id })))
}

/// GET /api/cv/
pub async fn handle_list_cvs(
    State(state): State<AppState>,
    _current: CurrentUser,
    uri: Uri,
    Query(query): Query<CvListQuery>,
    Query(paging): Query<PageParams>,
) -> Result<Json<Page<Cv>>, AppError> {
    let listing = CvListing::from_query(&query);
    let request = PageRequest::resolve(&paging, CV_PAGE_SIZE)?;

    let count = count_cvs(&state.db, &listing).await?;
    request.check(count)?;
    let rows = list_cvs(&state.db, &listing, Some(request)).await?;

    Ok(Json(Page::new(rows, count, request, uri.path(), uri.query())))
}

/// POST /api/cv/
pub async fn handle_create_cv(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CvPayload>,
) -> Result<(StatusCode, Json<Cv>), AppError> {
    let fields = validated(payload.apply_to(CvFields::default()))?;
    let cv = create_cv(&state.db, &fields, current.user.id).await?;
    info!(cv_id = cv.id, owner = current.user.id, "CV created");
    Ok((StatusCode::CREATED, Json(cv)))
}

/// GET /api/cv/:id/
pub async fn handle_get_cv(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Cv>, AppError> {
    Ok(Json(get_cv(&state.db, id).await?))
}

/// PUT /api/cv/:id/
pub async fn handle_replace_cv(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<CvPayload>,
) -> Result<Json<Cv>, AppError> {
    get_writable_cv(&state, &current, id).await?;
    let fields = validated(payload.apply_to(CvFields::default()))?;
    save(&state, id, &fields).await
}

/// PATCH /api/cv/:id/
pub async fn handle_patch_cv(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<CvPayload>,
) -> Result<Json<Cv>, AppError> {
    let existing = get_writable_cv(&state, &current, id).await?;
    let fields = validated(payload.apply_to(CvFields::from(&existing)))?;
    save(&state, id, &fields).await
}

async fn save(state: &AppState, id: i64, fields: &CvFields) -> Result<Json<Cv>, AppError> {
    let cv = update_cv(&state.db, id, fields)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {id} not found")))?;
    info!(cv_id = id, "CV updated");
    Ok(Json(cv))
}

/// DELETE /api/cv/:id/
pub async fn handle_delete_cv(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    get_writable_cv(&state, &current, id).await?;
    delete_cv(&state.db, id).await?;
    info!(cv_id = id, "CV deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/cv/:id/pdf/
pub async fn handle_request_pdf(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    get_cv(&state.db, id).await?;
    enqueue(&state, &current, Job::GenerateCvPdfDownload { cv_id: id }).await
}

/// POST /api/cv/:id/email/
pub async fn handle_email_cv(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<EmailCvRequest>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let recipient = req.recipient.trim();
    if !is_valid_email(recipient) {
        return Err(AppError::Validation("Please enter a valid email address".to_string()));
    }
    get_cv(&state.db, id).await?;
    let job = Job::EmailCvPdf {
        cv_id: id,
        recipient: recipient.to_string(),
    };
    enqueue(&state, &current, job).await
}

/// POST /api/cv/:id/analysis/
pub async fn handle_analyze_cv(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<AnalyzeCvRequest>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("Please enter a question".to_string()));
    }
    get_cv(&state.db, id).await?;
    let job = Job::AnalyzeCv {
        cv_id: id,
        question: question.to_string(),
    };
    enqueue(&state, &current, job).await
}

/// POST /api/cv/:id/translate/
pub async fn handle_translate_cv(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<TranslateCvRequest>,
) -> Result<Json<TranslatedCv>, AppError> {
    let language = Language::parse(&req.language)
        .ok_or_else(|| AppError::Validation(format!("Unsupported language: {}", req.language)))?;
    let cv = get_cv(&state.db, id).await?;
    Ok(Json(translate_cv(state.translator.as_ref(), &cv, language).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_joined() {
        let err = validated(CvFields::default()).unwrap_err();
        let AppError::Validation(message) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            message,
            "firstname: This field may not be blank. lastname: This field may not be blank."
        );
    }

    #[test]
    fn test_valid_payload_passes() {
        let payload = CvPayload {
            firstname: Some(" Grace ".to_string()),
            lastname: Some("Hopper".to_string()),
            ..CvPayload::default()
        };
        let fields = validated(payload.apply_to(CvFields::default())).unwrap();
        assert_eq!(fields.firstname, "Grace");
    }
}
