//! Background worker: pulls tasks from the broker and runs them.
//!
//! Each loop handles one task at a time; `WORKER_CONCURRENCY` loops run side by side.
//! Tasks are never re-run. A task either succeeds, fails with its error message,
//! or is cut off by the hard time limit. Storing the outcome is retried.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::state::AppState;
use crate::tasks::jobs::{run_job, JobError};
use crate::tasks::model::{TaskEnvelope, TaskRecord, TaskState};
use crate::tasks::progress::ProgressReporter;
use crate::tasks::queue::QueueError;

pub const TASK_TIME_LIMIT: Duration = Duration::from_secs(600);
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(2);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const SAVE_ATTEMPTS: u32 = 3;
const SAVE_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct BackgroundWorker {
    state: AppState,
    time_limit: Duration,
}

impl BackgroundWorker {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            time_limit: TASK_TIME_LIMIT,
        }
    }

    /// Starts `concurrency` worker loops on the runtime.
    pub fn spawn(self: Arc<Self>, concurrency: usize) -> Vec<JoinHandle<()>> {
        (0..concurrency.max(1))
            .map(|n| {
                let worker = Arc::clone(&self);
                tokio::spawn(async move { worker.run(n).await })
            })
            .collect()
    }

    pub async fn run(self: Arc<Self>, worker_id: usize) {
        info!(worker_id, "Background worker started");
        loop {
            match self.process_next().await {
                Ok(_) => {}
                Err(e) => {
                    error!(worker_id, "Error in worker loop: {e}");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Runs the next queued task, if any. Returns whether a task was processed.
    pub async fn process_next(&self) -> Result<bool, QueueError> {
        let Some(envelope) = self.state.queue.dequeue(DEQUEUE_TIMEOUT).await? else {
            return Ok(false);
        };
        let record = self.execute(envelope).await;
        self.store_result(&record).await?;
        Ok(true)
    }

    /// Saves the final record, retrying transient errors. When every attempt fails a
    /// failure record is written in its place so pollers stop waiting on the task.
    async fn store_result(&self, record: &TaskRecord) -> Result<(), QueueError> {
        let mut attempt = 1;
        loop {
            match self.state.queue.save(record).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < SAVE_ATTEMPTS => {
                    warn!(task_id = %record.id, attempt, "Failed to store task result: {e}");
                    attempt += 1;
                    tokio::time::sleep(SAVE_RETRY_DELAY).await;
                }
                Err(e) => {
                    let failed = record.with_state(
                        TaskState::Failure {
                            error: format!("Failed to store task result: {e}"),
                        },
                        Utc::now(),
                    );
                    return self.state.queue.save(&failed).await.map_err(|_| e);
                }
            }
        }
    }

    /// Runs one task under the time limit and returns its final record.
    pub async fn execute(&self, envelope: TaskEnvelope) -> TaskRecord {
        let record = match self.state.queue.status(envelope.id).await {
            Ok(Some(record)) => record,
            _ => TaskRecord::pending(&envelope, Utc::now()),
        };
        info!(task_id = %envelope.id, task = envelope.job.name(), "Processing task");

        let progress = ProgressReporter::for_task(Arc::clone(&self.state.queue), record.clone());
        let outcome = with_time_limit(
            self.time_limit,
            run_job(&self.state, &envelope.job, &progress),
        )
        .await;

        let state = match outcome {
            Ok(result) => {
                info!(task_id = %envelope.id, "Task succeeded");
                TaskState::Success { result }
            }
            Err(e) => {
                warn!(task_id = %envelope.id, task = envelope.job.name(), "Task failed: {e}");
                TaskState::Failure {
                    error: e.to_string(),
                }
            }
        };
        record.with_state(state, Utc::now())
    }
}

pub async fn with_time_limit<F>(limit: Duration, job: F) -> Result<Value, JobError>
where
    F: Future<Output = Result<Value, JobError>>,
{
    tokio::time::timeout(limit, job)
        .await
        .unwrap_or(Err(JobError::TimeLimitExceeded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use crate::tasks::model::Job;
    use crate::tasks::queue::TaskQueue;
    use serde_json::json;

    #[tokio::test]
    async fn test_time_limit_fails_the_task() {
        let result = with_time_limit(
            Duration::from_millis(10),
            std::future::pending::<Result<Value, JobError>>(),
        )
        .await;
        assert_eq!(result.unwrap_err().to_string(), "time limit exceeded");
    }

    #[tokio::test]
    async fn test_fast_job_passes_through() {
        let result = with_time_limit(Duration::from_secs(1), async { Ok(json!({"ok": true})) }).await;
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_process_next_stores_success() {
        let (state, queue, _) = test_state();
        let id = queue
            .enqueue(
                Job::SendNotification {
                    recipient: "ada@example.com".to_string(),
                    subject: "Hi".to_string(),
                    message: "Hello".to_string(),
                },
                Some(2),
            )
            .await
            .unwrap();

        let worker = BackgroundWorker::new(state);
        assert!(worker.process_next().await.unwrap());

        let record = queue.status(id).await.unwrap().unwrap();
        assert_eq!(record.owner_id, Some(2));
        match record.state {
            TaskState::Success { result } => {
                assert_eq!(result["message"], "Notification sent to ada@example.com")
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    fn notification() -> Job {
        Job::SendNotification {
            recipient: "ada@example.com".to_string(),
            subject: "Hi".to_string(),
            message: "Hello".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_save_is_retried() {
        let (state, queue, _) = test_state();
        let id = queue.enqueue(notification(), None).await.unwrap();
        queue.failing_saves.store(2, std::sync::atomic::Ordering::SeqCst);

        let worker = BackgroundWorker::new(state);
        assert!(worker.process_next().await.unwrap());

        let record = queue.status(id).await.unwrap().unwrap();
        assert!(matches!(record.state, TaskState::Success { .. }), "{:?}", record.state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstorable_result_is_replaced_by_failure() {
        let (state, queue, _) = test_state();
        let id = queue.enqueue(notification(), None).await.unwrap();
        queue
            .failing_saves
            .store(SAVE_ATTEMPTS as usize, std::sync::atomic::Ordering::SeqCst);

        let worker = BackgroundWorker::new(state);
        assert!(worker.process_next().await.unwrap());

        let record = queue.status(id).await.unwrap().unwrap();
        match record.state {
            TaskState::Failure { error } => assert_eq!(
                error,
                "Failed to store task result: task broker unavailable: write timed out"
            ),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_process_next_on_empty_queue() {
        let (state, _, _) = test_state();
        let worker = BackgroundWorker::new(state);
        assert!(!worker.process_next().await.unwrap());
    }
}
