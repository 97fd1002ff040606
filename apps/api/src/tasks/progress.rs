use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::tasks::model::{TaskRecord, TaskState};
use crate::tasks::queue::TaskQueue;

/// Publishes `progress` states for a running task. Detached reporters
/// (synchronous CLI runs, inline fallbacks) discard updates.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Option<(Arc<dyn TaskQueue>, Arc<Mutex<TaskRecord>>)>,
}

impl ProgressReporter {
    pub fn for_task(queue: Arc<dyn TaskQueue>, record: TaskRecord) -> Self {
        Self {
            inner: Some((queue, Arc::new(Mutex::new(record)))),
        }
    }

    pub fn detached() -> Self {
        Self { inner: None }
    }

    /// Progress write failures are logged; the job itself carries on.
    pub async fn report(&self, current: u8, status: &str) {
        let Some((queue, record)) = &self.inner else {
            return;
        };
        let mut record = record.lock().await;
        *record = record.with_state(
            TaskState::Progress {
                current,
                total: 100,
                status: status.to_string(),
            },
            Utc::now(),
        );
        if let Err(e) = queue.save(&record).await {
            warn!(task_id = %record.id, "Failed to store task progress: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::{Job, TaskEnvelope};
    use crate::tasks::queue::testing::MemoryTaskQueue;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_report_stores_progress_state() {
        let queue = Arc::new(MemoryTaskQueue::default());
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            owner_id: Some(1),
            job: Job::GenerateCvPdf { cv_id: 2 },
        };
        let reporter = ProgressReporter::for_task(queue.clone(), TaskRecord::pending(&envelope, Utc::now()));

        reporter.report(50, "PDF generated, encoding...").await;

        let stored = queue.status(envelope.id).await.unwrap().unwrap();
        assert_eq!(
            stored.state,
            TaskState::Progress {
                current: 50,
                total: 100,
                status: "PDF generated, encoding...".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_detached_reporter_is_silent() {
        ProgressReporter::detached().report(10, "ignored").await;
    }
}
