use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::accounts::find_user;
use crate::auth::extract::{CurrentUser, PageUser};
use crate::auth::session::FlashLevel;
use crate::cv::listing::{CvListQuery, CvListing};
use crate::cv::repository::{create_cv, delete_cv, get_cv, list_cvs, update_cv};
use crate::cv::validation::validate_fields;
use crate::email::messages::cv_pdf_filename;
use crate::errors::AppError;
use crate::models::cv::{Cv, CvFields};
use crate::pdf::render_cv_pdf_blocking;
use crate::state::AppState;
use crate::tasks::jobs::DOWNLOADS_PREFIX;
use crate::tasks::model::Job;
use crate::web::templates::{cv_delete_page, cv_form_page, cv_list_page};
use crate::web::{save_session, PageError};

static DOWNLOAD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cv_[0-9]{1,18}_[0-9a-f]{8}\.pdf$").expect("valid download name regex"));

#[derive(Debug, Default, Deserialize)]
pub struct CvForm {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub skills: String,
    #[serde(default)]
    pub projects: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub contacts: String,
}

impl From<CvForm> for CvFields {
    fn from(form: CvForm) -> Self {
        CvFields {
            firstname: form.firstname,
            lastname: form.lastname,
            skills: form.skills,
            projects: form.projects,
            bio: form.bio,
            contacts: form.contacts,
        }
    }
}

fn not_found(id: i64) -> PageError {
    PageError(AppError::NotFound(format!("CV {id} not found")))
}

/// Edit and delete pages behave as if other users' CVs did not exist.
async fn get_own_cv(state: &AppState, current: &CurrentUser, id: i64) -> Result<Cv, PageError> {
    let cv = get_cv(&state.db, id).await?;
    if !cv.can_modify(current.user.id, current.is_admin()) {
        return Err(not_found(id));
    }
    Ok(cv)
}

fn is_download_name(file: &str) -> bool {
    DOWNLOAD_NAME.is_match(file)
}

fn pdf_response(filename: &str, data: impl IntoResponse) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        data,
    )
        .into_response()
}

/// Queues the "your CV was saved" email when the CV owner has an address on file.
async fn notify_owner(state: &AppState, current: &CurrentUser, cv: &Cv, job: fn(i64, String) -> Job) {
    let email = match cv.owner_id {
        Some(id) if id == current.user.id => current.user.email.clone(),
        Some(id) => match find_user(&state.db, id).await {
            Ok(Some(owner)) => owner.email,
            Ok(None) => return,
            Err(e) => {
                warn!(cv_id = cv.id, "Could not load CV owner for notification: {e:?}");
                return;
            }
        },
        None => return,
    };
    if email.trim().is_empty() {
        return;
    }
    if let Err(e) = state.queue.enqueue(job(cv.id, email), cv.owner_id).await {
        warn!(cv_id = cv.id, "Could not queue CV notification: {e}");
    }
}

fn created_notification(cv_id: i64, user_email: String) -> Job {
    Job::CvCreatedNotification { cv_id, user_email }
}

fn updated_notification(cv_id: i64, user_email: String) -> Job {
    Job::CvUpdatedNotification { cv_id, user_email }
}

/// GET /cvs/
pub async fn cv_list(
    State(state): State<AppState>,
    PageUser(mut current): PageUser,
    Query(query): Query<CvListQuery>,
) -> Result<Html<String>, PageError> {
    let listing = CvListing::from_query(&query);
    let cvs = list_cvs(&state.db, &listing, None).await?;

    let flashes = current.session.data.take_flashes();
    if !flashes.is_empty() {
        save_session(&state, &current.session).await?;
    }
    Ok(cv_list_page(&current.user, &flashes, &cvs, &listing))
}

/// GET /cv/create/
pub async fn cv_create_form(PageUser(current): PageUser) -> Html<String> {
    cv_form_page(&current.user, "Create CV", "/cv/create/", &CvFields::default(), &[])
}

/// POST /cv/create/
pub async fn cv_create_submit(
    State(state): State<AppState>,
    PageUser(mut current): PageUser,
    Form(form): Form<CvForm>,
) -> Result<Response, PageError> {
    let submitted: CvFields = form.into();
    let fields = match validate_fields(submitted.clone(), false) {
        Ok(fields) => fields,
        Err(errors) => {
            return Ok(cv_form_page(&current.user, "Create CV", "/cv/create/", &submitted, &errors).into_response());
        }
    };

    let cv = create_cv(&state.db, &fields, current.user.id).await?;
    info!(cv_id = cv.id, owner = current.user.id, "CV created");
    notify_owner(&state, &current, &cv, created_notification).await;

    current.session.data.flash(FlashLevel::Success, "CV created successfully!");
    save_session(&state, &current.session).await?;
    Ok(Redirect::to("/cvs/").into_response())
}

/// GET /cv/:id/edit/
pub async fn cv_edit_form(
    State(state): State<AppState>,
    PageUser(current): PageUser,
    Path(id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let cv = get_own_cv(&state, &current, id).await?;
    let action = format!("/cv/{id}/edit/");
    Ok(cv_form_page(&current.user, "Edit CV", &action, &CvFields::from(&cv), &[]))
}

/// POST /cv/:id/edit/
pub async fn cv_edit_submit(
    State(state): State<AppState>,
    PageUser(mut current): PageUser,
    Path(id): Path<i64>,
    Form(form): Form<CvForm>,
) -> Result<Response, PageError> {
    get_own_cv(&state, &current, id).await?;
    let submitted: CvFields = form.into();
    let fields = match validate_fields(submitted.clone(), false) {
        Ok(fields) => fields,
        Err(errors) => {
            let action = format!("/cv/{id}/edit/");
            return Ok(cv_form_page(&current.user, "Edit CV", &action, &submitted, &errors).into_response());
        }
    };

    let cv = update_cv(&state.db, id, &fields).await?.ok_or_else(|| not_found(id))?;
    info!(cv_id = id, "CV updated");
    notify_owner(&state, &current, &cv, updated_notification).await;

    current.session.data.flash(FlashLevel::Success, "CV updated successfully!");
    save_session(&state, &current.session).await?;
    Ok(Redirect::to("/cvs/").into_response())
}

/// GET /cv/:id/delete/
pub async fn cv_delete_form(
    State(state): State<AppState>,
    PageUser(current): PageUser,
    Path(id): Path<i64>,
) -> Result<Html<String>, PageError> {
    let cv = get_own_cv(&state, &current, id).await?;
    Ok(cv_delete_page(&current.user, &cv))
}

/// POST /cv/:id/delete/
pub async fn cv_delete_submit(
    State(state): State<AppState>,
    PageUser(mut current): PageUser,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    get_own_cv(&state, &current, id).await?;
    delete_cv(&state.db, id).await?;
    info!(cv_id = id, "CV deleted");

    current.session.data.flash(FlashLevel::Success, "CV deleted successfully!");
    save_session(&state, &current.session).await?;
    Ok(Redirect::to("/cvs/").into_response())
}

/// GET /cv/:id/pdf/
pub async fn cv_pdf(
    State(state): State<AppState>,
    PageUser(_current): PageUser,
    Path(id): Path<i64>,
) -> Result<Response, PageError> {
    let cv = get_cv(&state.db, id).await?;
    let pdf = render_cv_pdf_blocking(&cv, Utc::now()).await?;
    info!(cv_id = id, size = pdf.len(), "PDF downloaded");
    Ok(pdf_response(&cv_pdf_filename(&cv), pdf))
}

/// GET /media/downloads/:file
pub async fn media_download(
    State(state): State<AppState>,
    PageUser(_current): PageUser,
    Path(file): Path<String>,
) -> Result<Response, PageError> {
    if !is_download_name(&file) {
        return Err(PageError(AppError::NotFound(format!("File {file} not found"))));
    }
    let data = state.pdf_store.get(&format!("{DOWNLOADS_PREFIX}{file}")).await?;
    Ok(pdf_response(&file, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_names() {
        assert!(is_download_name("cv_12_0a1b2c3d.pdf"));
        assert!(!is_download_name("../secrets.pdf"));
        assert!(!is_download_name("cv_12_0A1B2C3D.pdf"));
        assert!(!is_download_name("cv_12_0a1b2c3d.pdf.exe"));
    }

    #[test]
    fn test_form_maps_onto_fields() {
        let form = CvForm {
            firstname: "Grace".to_string(),
            bio: "Admiral".to_string(),
            ..CvForm::default()
        };
        let fields: CvFields = form.into();
        assert_eq!(fields.firstname, "Grace");
        assert_eq!(fields.bio, "Admiral");
        assert_eq!(fields.lastname, "");
    }

    #[tokio::test]
    async fn test_pdf_response_headers() {
        let response = pdf_response("cv_1_Ada_Lovelace.pdf", vec![b'%', b'P']);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"cv_1_Ada_Lovelace.pdf\""
        );
    }
}
