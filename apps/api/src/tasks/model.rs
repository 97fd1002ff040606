use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Jobs
// ────────────────────────────────────────────────────────────────────────────

/// A unit of background work. Serialized into the broker as `{"task": ..., "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "args", rename_all = "snake_case")]
pub enum Job {
    GenerateCvPdf { cv_id: i64 },
    GenerateCvPdfDownload { cv_id: i64 },
    EmailCvPdf { cv_id: i64, recipient: String },
    AnalyzeCv { cv_id: i64, question: String },
    SendNotification {
        recipient: String,
        subject: String,
        message: String,
    },
    CvCreatedNotification { cv_id: i64, user_email: String },
    CvUpdatedNotification { cv_id: i64, user_email: String },
    CleanupOldLogs { days: i64 },
    CleanupOldPdfFiles { days: i64 },
    GenerateDailyStats { date: Option<NaiveDate> },
    GenerateWeeklyReport { week_start: Option<NaiveDate> },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::GenerateCvPdf { .. } => "generate_cv_pdf",
            Job::GenerateCvPdfDownload { .. } => "generate_cv_pdf_download",
            Job::EmailCvPdf { .. } => "email_cv_pdf",
            Job::AnalyzeCv { .. } => "analyze_cv",
            Job::SendNotification { .. } => "send_notification",
            Job::CvCreatedNotification { .. } => "cv_created_notification",
            Job::CvUpdatedNotification { .. } => "cv_updated_notification",
            Job::CleanupOldLogs { .. } => "cleanup_old_logs",
            Job::CleanupOldPdfFiles { .. } => "cleanup_old_pdf_files",
            Job::GenerateDailyStats { .. } => "generate_daily_stats",
            Job::GenerateWeeklyReport { .. } => "generate_weekly_report",
        }
    }

    pub fn queue(&self) -> QueueName {
        match self {
            Job::GenerateCvPdf { .. } | Job::GenerateCvPdfDownload { .. } => QueueName::Pdf,
            Job::EmailCvPdf { .. } => QueueName::Email,
            Job::AnalyzeCv { .. } => QueueName::Analysis,
            Job::SendNotification { .. }
            | Job::CvCreatedNotification { .. }
            | Job::CvUpdatedNotification { .. } => QueueName::Notification,
            Job::CleanupOldLogs { .. } | Job::CleanupOldPdfFiles { .. } => QueueName::Cleanup,
            Job::GenerateDailyStats { .. } | Job::GenerateWeeklyReport { .. } => {
                QueueName::Statistics
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Pdf,
    Email,
    Analysis,
    Notification,
    Cleanup,
    Statistics,
}

impl QueueName {
    /// Poll order for workers: user-facing queues first.
    pub const ALL: [QueueName; 6] = [
        QueueName::Pdf,
        QueueName::Email,
        QueueName::Analysis,
        QueueName::Notification,
        QueueName::Cleanup,
        QueueName::Statistics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Pdf => "pdf_queue",
            QueueName::Email => "email_queue",
            QueueName::Analysis => "analysis_queue",
            QueueName::Notification => "notification_queue",
            QueueName::Cleanup => "cleanup_queue",
            QueueName::Statistics => "statistics_queue",
        }
    }

    /// Redis list holding the queue.
    pub fn redis_key(self) -> String {
        format!("queue:{}", self.as_str())
    }
}

/// What actually travels through the broker list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub owner_id: Option<i64>,
    pub job: Job,
}

// ────────────────────────────────────────────────────────────────────────────
// Task records (result store)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Progress {
        current: u8,
        total: u8,
        status: String,
    },
    Success {
        result: Value,
    },
    Failure {
        error: String,
    },
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Success { .. } | TaskState::Failure { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub task: String,
    pub owner_id: Option<i64>,
    #[serde(flatten)]
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn pending(envelope: &TaskEnvelope, now: DateTime<Utc>) -> Self {
        Self {
            id: envelope.id,
            task: envelope.job.name().to_string(),
            owner_id: envelope.owner_id,
            state: TaskState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_state(&self, state: TaskState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Owners see their own tasks; admins see everything.
    pub fn visible_to(&self, user_id: i64, is_admin: bool) -> bool {
        is_admin || self.owner_id == Some(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_wire_format() {
        let job = Job::EmailCvPdf {
            cv_id: 4,
            recipient: "hr@example.com".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            json!({ "task": "email_cv_pdf", "args": { "cv_id": 4, "recipient": "hr@example.com" } })
        );
    }

    #[test]
    fn test_job_names_match_wire_tags() {
        let jobs = [
            Job::GenerateCvPdfDownload { cv_id: 1 },
            Job::CvCreatedNotification {
                cv_id: 1,
                user_email: "a@b.co".to_string(),
            },
            Job::GenerateDailyStats { date: None },
        ];
        for job in jobs {
            let value = serde_json::to_value(&job).unwrap();
            assert_eq!(value["task"], job.name());
        }
    }

    #[test]
    fn test_jobs_route_to_their_queues() {
        assert_eq!(Job::GenerateCvPdf { cv_id: 1 }.queue(), QueueName::Pdf);
        assert_eq!(
            Job::AnalyzeCv {
                cv_id: 1,
                question: "?".to_string()
            }
            .queue(),
            QueueName::Analysis
        );
        assert_eq!(Job::CleanupOldLogs { days: 30 }.queue(), QueueName::Cleanup);
        assert_eq!(
            Job::GenerateWeeklyReport { week_start: None }.queue(),
            QueueName::Statistics
        );
        assert_eq!(QueueName::Email.redis_key(), "queue:email_queue");
    }

    #[test]
    fn test_task_record_flattens_state() {
        let envelope = TaskEnvelope {
            id: Uuid::nil(),
            owner_id: Some(3),
            job: Job::GenerateCvPdfDownload { cv_id: 9 },
        };
        let now = Utc::now();
        let record = TaskRecord::pending(&envelope, now).with_state(
            TaskState::Progress {
                current: 50,
                total: 100,
                status: "Generating PDF...".to_string(),
            },
            now,
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["state"], "progress");
        assert_eq!(value["current"], 50);
        assert_eq!(value["status"], "Generating PDF...");
        assert_eq!(value["task"], "generate_cv_pdf_download");

        let back: TaskRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_task_visibility() {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4(),
            owner_id: Some(3),
            job: Job::GenerateCvPdf { cv_id: 9 },
        };
        let record = TaskRecord::pending(&envelope, Utc::now());
        assert!(record.visible_to(3, false));
        assert!(!record.visible_to(4, false));
        assert!(record.visible_to(4, true));
    }
}
