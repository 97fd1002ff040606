use chrono::NaiveDate;
use thiserror::Error;

use crate::tasks::model::Job;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("task '{task}' expects arguments: {usage}")]
    BadArguments { task: String, usage: &'static str },
}

/// Task names accepted by `run-task` and the admin enqueue endpoint.
pub const TASK_NAMES: [&str; 11] = [
    "generate_cv_pdf",
    "generate_cv_pdf_download",
    "email_cv_pdf",
    "analyze_cv",
    "send_notification",
    "cv_created_notification",
    "cv_updated_notification",
    "cleanup_old_logs",
    "cleanup_old_pdf_files",
    "generate_daily_stats",
    "generate_weekly_report",
];

/// Builds a job from its name and positional string arguments.
pub fn job_from_args(name: &str, args: &[String]) -> Result<Job, RegistryError> {
    let bad = |usage: &'static str| RegistryError::BadArguments {
        task: name.to_string(),
        usage,
    };

    let job = match (name, args) {
        ("generate_cv_pdf", [cv_id]) => Job::GenerateCvPdf {
            cv_id: cv_id.parse().map_err(|_| bad("<cv_id>"))?,
        },
        ("generate_cv_pdf", _) => return Err(bad("<cv_id>")),
        ("generate_cv_pdf_download", [cv_id]) => Job::GenerateCvPdfDownload {
            cv_id: cv_id.parse().map_err(|_| bad("<cv_id>"))?,
        },
        ("generate_cv_pdf_download", _) => return Err(bad("<cv_id>")),
        ("email_cv_pdf", [cv_id, recipient]) => Job::EmailCvPdf {
            cv_id: cv_id.parse().map_err(|_| bad("<cv_id> <recipient>"))?,
            recipient: recipient.clone(),
        },
        ("email_cv_pdf", _) => return Err(bad("<cv_id> <recipient>")),
        ("analyze_cv", [cv_id, question @ ..]) if !question.is_empty() => Job::AnalyzeCv {
            cv_id: cv_id.parse().map_err(|_| bad("<cv_id> <question...>"))?,
            question: question.join(" "),
        },
        ("analyze_cv", _) => return Err(bad("<cv_id> <question...>")),
        ("send_notification", [recipient, subject, message]) => Job::SendNotification {
            recipient: recipient.clone(),
            subject: subject.clone(),
            message: message.clone(),
        },
        ("send_notification", _) => return Err(bad("<recipient> <subject> <message>")),
        ("cv_created_notification" | "send_cv_created_notification", [cv_id, email]) => {
            Job::CvCreatedNotification {
                cv_id: cv_id.parse().map_err(|_| bad("<cv_id> <user_email>"))?,
                user_email: email.clone(),
            }
        }
        ("cv_updated_notification" | "send_cv_updated_notification", [cv_id, email]) => {
            Job::CvUpdatedNotification {
                cv_id: cv_id.parse().map_err(|_| bad("<cv_id> <user_email>"))?,
                user_email: email.clone(),
            }
        }
        (
            "cv_created_notification"
            | "send_cv_created_notification"
            | "cv_updated_notification"
            | "send_cv_updated_notification",
            _,
        ) => return Err(bad("<cv_id> <user_email>")),
        ("cleanup_old_logs", []) => Job::CleanupOldLogs { days: 30 },
        ("cleanup_old_logs", [days]) => Job::CleanupOldLogs {
            days: parse_days(days).ok_or_else(|| bad("[days]"))?,
        },
        ("cleanup_old_logs", _) => return Err(bad("[days]")),
        ("cleanup_old_pdf_files", []) => Job::CleanupOldPdfFiles { days: 7 },
        ("cleanup_old_pdf_files", [days]) => Job::CleanupOldPdfFiles {
            days: parse_days(days).ok_or_else(|| bad("[days]"))?,
        },
        ("cleanup_old_pdf_files", _) => return Err(bad("[days]")),
        ("generate_daily_stats", []) => Job::GenerateDailyStats { date: None },
        ("generate_daily_stats", [date]) => Job::GenerateDailyStats {
            date: Some(parse_date(date).ok_or_else(|| bad("[YYYY-MM-DD]"))?),
        },
        ("generate_daily_stats", _) => return Err(bad("[YYYY-MM-DD]")),
        ("generate_weekly_report", []) => Job::GenerateWeeklyReport { week_start: None },
        ("generate_weekly_report", [date]) => Job::GenerateWeeklyReport {
            week_start: Some(parse_date(date).ok_or_else(|| bad("[YYYY-MM-DD]"))?),
        },
        ("generate_weekly_report", _) => return Err(bad("[YYYY-MM-DD]")),
        _ => return Err(RegistryError::UnknownTask(name.to_string())),
    };
    Ok(job)
}

/// Retention periods beyond this are rejected.
const MAX_RETENTION_DAYS: i64 = 36_500;

fn parse_days(raw: &str) -> Option<i64> {
    raw.parse()
        .ok()
        .filter(|days| (0..=MAX_RETENTION_DAYS).contains(days))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
