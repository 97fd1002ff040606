use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::tasks::model::{Job, QueueName, TaskEnvelope, TaskRecord};

/// Finished results are kept this long before Redis expires them.
pub const RESULT_TTL_SECS: u64 = 3600;
/// Upper bound for records of tasks that never finish (lost worker, crashed process).
pub const UNFINISHED_TTL_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The broker could not be reached. Callers may fall back to doing the work inline.
    #[error("task broker unavailable: {0}")]
    Unavailable(String),

    #[error("task broker error: {0}")]
    Broker(redis::RedisError),

    #[error("malformed task payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl QueueError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal()
            || err.is_io_error()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            QueueError::Unavailable(err.to_string())
        } else {
            QueueError::Broker(err)
        }
    }
}

/// Broker + result store.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Records the task as pending and pushes it onto its queue.
    async fn enqueue(&self, job: Job, owner_id: Option<i64>) -> Result<Uuid, QueueError>;

    /// Looks up a task. `Ok(None)` means unknown or expired.
    async fn status(&self, id: Uuid) -> Result<Option<TaskRecord>, QueueError>;

    /// Waits up to `timeout` for the next task across all queues.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError>;

    /// Stores the current state of a task.
    async fn save(&self, record: &TaskRecord) -> Result<(), QueueError>;
}

fn task_key(id: Uuid) -> String {
    format!("task:{id}")
}

fn ttl_for(record: &TaskRecord) -> u64 {
    if record.state.is_finished() {
        RESULT_TTL_SECS
    } else {
        UNFINISHED_TTL_SECS
    }
}

/// Redis-backed queue: one list per queue name, one JSON string per task record.
#[derive(Clone)]
pub struct RedisTaskQueue {
    client: redis::Client,
}

impl RedisTaskQueue {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, job: Job, owner_id: Option<i64>) -> Result<Uuid, QueueError> {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            owner_id,
            job,
        };
        let record = TaskRecord::pending(&envelope, Utc::now());
        let queue = envelope.job.queue();
        let payload = serde_json::to_string(&envelope)?;

        self.save(&record).await?;
        let mut conn = self.connection().await?;
        conn.lpush::<_, _, ()>(queue.redis_key(), payload).await?;

        info!(
            task_id = %envelope.id,
            task = envelope.job.name(),
            queue = queue.as_str(),
            "Task queued"
        );
        Ok(envelope.id)
    }

    async fn status(&self, id: Uuid) -> Result<Option<TaskRecord>, QueueError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(task_key(id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError> {
        let keys: Vec<String> = QueueName::ALL.iter().map(|q| q.redis_key()).collect();
        // BRPOP blocks the connection, so it gets its own rather than a shared one.
        let mut conn = self.connection().await?;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&keys)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        match popped {
            Some((queue, payload)) => {
                debug!("Dequeued task from {queue}");
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, record: &TaskRecord) -> Result<(), QueueError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(task_key(record.id))
            .arg(payload)
            .arg("EX")
            .arg(ttl_for(record))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// In-process queue for worker, poll and handler tests.
    #[derive(Default)]
    pub struct MemoryTaskQueue {
        pub pending: Mutex<VecDeque<TaskEnvelope>>,
        pub records: Mutex<HashMap<Uuid, TaskRecord>>,
        /// When set every call fails as if Redis were down.
        pub offline: std::sync::atomic::AtomicBool,
        /// Number of upcoming `save` calls that fail before saves succeed again.
        pub failing_saves: std::sync::atomic::AtomicUsize,
    }

    impl MemoryTaskQueue {
        pub fn offline() -> Self {
            let queue = Self::default();
            queue
                .offline
                .store(true, std::sync::atomic::Ordering::SeqCst);
            queue
        }

        fn check(&self) -> Result<(), QueueError> {
            if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
                Err(QueueError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        pub fn insert(&self, record: TaskRecord) {
            self.records.lock().unwrap().insert(record.id, record);
        }

        pub fn queued_jobs(&self) -> Vec<Job> {
            self.pending
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.job.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TaskQueue for MemoryTaskQueue {
        async fn enqueue(&self, job: Job, owner_id: Option<i64>) -> Result<Uuid, QueueError> {
            self.check()?;
            let envelope = TaskEnvelope {
                id: Uuid::new_v4(),
                owner_id,
                job,
            };
            self.insert(TaskRecord::pending(&envelope, Utc::now()));
            let id = envelope.id;
            self.pending.lock().unwrap().push_back(envelope);
            Ok(id)
        }

        async fn status(&self, id: Uuid) -> Result<Option<TaskRecord>, QueueError> {
            self.check()?;
            Ok(self.records.lock().unwrap().get(&id).cloned())
        }

        async fn dequeue(&self, _timeout: Duration) -> Result<Option<TaskEnvelope>, QueueError> {
            self.check()?;
            Ok(self.pending.lock().unwrap().pop_front())
        }

        async fn save(&self, record: &TaskRecord) -> Result<(), QueueError> {
            self.check()?;
            let failing = self
                .failing_saves
                .fetch_update(
                    std::sync::atomic::Ordering::SeqCst,
                    std::sync::atomic::Ordering::SeqCst,
                    |n| n.checked_sub(1),
                )
                .is_ok();
            if failing {
                return Err(QueueError::Unavailable("write timed out".to_string()));
            }
            self.insert(record.clone());
            Ok(())
        }
    }
}
