use axum::{
    extract::{Path, Query, State},
    http::Uri,
    Json,
};
use chrono::Utc;

use crate::auth::extract::AdminUser;
use crate::errors::AppError;
use crate::logs::filter::{TimeFilter, TimeRangeParams};
use crate::logs::repository::{count_logs, get_log, list_logs};
use crate::models::request_log::RequestLog;
use crate::pagination::{Page, PageParams, PageRequest};
use crate::state::AppState;

pub const LOG_PAGE_SIZE: u32 = 10;

/// GET /api/logs/
pub async fn handle_list_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    uri: Uri,
    Query(range): Query<TimeRangeParams>,
    Query(paging): Query<PageParams>,
) -> Result<Json<Page<RequestLog>>, AppError> {
    let filter = TimeFilter::resolve(&range, Utc::now());
    let request = PageRequest::resolve(&paging, LOG_PAGE_SIZE)?;

    let count = count_logs(&state.db, &filter).await?;
    request.check(count)?;
    let rows = list_logs(&state.db, &filter, request).await?;

    Ok(Json(Page::new(rows, count, request, uri.path(), uri.query())))
}

/// GET /api/logs/:id/
pub async fn handle_get_log(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<RequestLog>, AppError> {
    let log = get_log(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Request log {id} not found")))?;
    Ok(Json(log))
}
