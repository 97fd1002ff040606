pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::cv::handlers as cv;
use crate::logs::handlers as logs;
use crate::logs::middleware::record_request;
use crate::state::AppState;
use crate::tasks::handlers as tasks;
use crate::web::{accounts, cvs, detail};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health/", get(health::health_handler))
        .route("/db-health/", get(health::db_health_handler))
        // HTML pages
        .route("/", get(accounts::home))
        .route("/login/", get(accounts::login_form).post(accounts::login_submit))
        .route("/register/", get(accounts::register_form).post(accounts::register_submit))
        .route("/logout/", get(accounts::logout))
        .route("/cvs/", get(cvs::cv_list))
        .route("/cv/create/", get(cvs::cv_create_form).post(cvs::cv_create_submit))
        .route("/cv/:id/", get(detail::cv_detail).post(detail::cv_detail_action))
        .route("/cv/:id/pdf/", get(cvs::cv_pdf))
        .route("/cv/:id/edit/", get(cvs::cv_edit_form).post(cvs::cv_edit_submit))
        .route("/cv/:id/delete/", get(cvs::cv_delete_form).post(cvs::cv_delete_submit))
        .route("/media/downloads/:file", get(cvs::media_download))
        // Auth API
        .route("/api/auth/register", post(auth::handle_register))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/logout", post(auth::handle_logout))
        .route("/api/auth/me", get(auth::handle_me))
        // CV API
        .route("/api/cv/", get(cv::handle_list_cvs).post(cv::handle_create_cv))
        .route(
            "/api/cv/:id/",
            get(cv::handle_get_cv)
                .put(cv::handle_replace_cv)
                .patch(cv::handle_patch_cv)
                .delete(cv::handle_delete_cv),
        )
        .route("/api/cv/:id/pdf/", post(cv::handle_request_pdf))
        .route("/api/cv/:id/email/", post(cv::handle_email_cv))
        .route("/api/cv/:id/analysis/", post(cv::handle_analyze_cv))
        .route("/api/cv/:id/translate/", post(cv::handle_translate_cv))
        // Admin & tasks API
        .route("/api/logs/", get(logs::handle_list_logs))
        .route("/api/logs/:id/", get(logs::handle_get_log))
        .route("/api/tasks/:id", get(tasks::handle_task_status))
        .route("/api/admin/tasks", post(tasks::handle_enqueue_task))
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .with_state(state)
}
