use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::extract::{AdminUser, CurrentUser};
use crate::errors::AppError;
use crate::state::AppState;
use crate::tasks::model::TaskRecord;
use crate::tasks::registry::job_from_args;

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueTaskRequest {
    pub task: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Hides tasks the caller may not see behind the same 404 as unknown ids.
fn visible(record: Option<TaskRecord>, id: Uuid, user_id: i64, is_admin: bool) -> Result<TaskRecord, AppError> {
    record
        .filter(|r| r.visible_to(user_id, is_admin))
        .ok_or_else(|| AppError::NotFound(format!("Task {id} not found")))
}

/// GET /api/tasks/:id
pub async fn handle_task_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskRecord>, AppError> {
    let record = state.queue.status(id).await?;
    let record = visible(record, id, current.user.id, current.is_admin())?;
    Ok(Json(record))
}

/// POST /api/admin/tasks
pub async fn handle_enqueue_task(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<EnqueueTaskRequest>,
) -> Result<(StatusCode, Json<TaskAccepted>), AppError> {
    let job = job_from_args(&req.task, &req.args).map_err(|e| AppError::Validation(e.to_string()))?;
    let task_id = state.queue.enqueue(job, Some(admin.user.id)).await?;

    info!(task = %req.task, %task_id, admin = admin.user.id, "Task enqueued by admin");
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::{Job, TaskEnvelope};
    use chrono::Utc;

    fn record(owner_id: Option<i64>) -> TaskRecord {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            owner_id,
            job: Job::GenerateCvPdf { cv_id: 1 },
        };
        TaskRecord::pending(&envelope, Utc::now())
    }

    #[test]
    fn test_owner_sees_own_task() {
        let r = record(Some(7));
        let id = r.id;
        assert_eq!(visible(Some(r), id, 7, false).unwrap().id, id);
    }

    #[test]
    fn test_other_users_task_is_not_found() {
        let r = record(Some(7));
        let id = r.id;
        assert!(matches!(visible(Some(r), id, 8, false), Err(AppError::NotFound(_))));
        assert!(matches!(visible(None, id, 7, false), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_admin_sees_scheduled_tasks() {
        let r = record(None);
        let id = r.id;
        assert!(visible(Some(r), id, 1, true).is_ok());
    }
}
