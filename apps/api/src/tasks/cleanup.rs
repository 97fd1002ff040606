use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;

use crate::logs::repository::delete_logs_before;
use crate::pdf::storage::PdfStore;
use crate::tasks::jobs::{JobError, DOWNLOADS_PREFIX};

/// Object prefixes swept by the PDF cleanup.
const PDF_PREFIXES: [&str; 2] = ["pdf/", DOWNLOADS_PREFIX];

/// Deletes request logs older than `days`.
pub async fn cleanup_old_logs(db: &PgPool, days: i64) -> Result<Value, JobError> {
    let cutoff = retention_cutoff(Utc::now(), days)?;
    let deleted = delete_logs_before(db, cutoff).await?;

    info!(deleted, %cutoff, "Old request logs removed");
    Ok(json!({
        "deleted_count": deleted,
        "cutoff_date": cutoff.to_rfc3339(),
    }))
}

/// Deletes stored PDFs last modified before `now - days`.
pub async fn cleanup_old_pdf_files(
    store: &dyn PdfStore,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Value, JobError> {
    let cutoff = retention_cutoff(now, days)?;
    let mut deleted_files = 0u64;
    let mut total_bytes = 0u64;

    for prefix in PDF_PREFIXES {
        for object in store.list(prefix).await? {
            if object.last_modified < cutoff {
                store.delete(&object.key).await?;
                deleted_files += 1;
                total_bytes += object.size;
            }
        }
    }

    info!(deleted_files, total_bytes, "Old PDF files removed");
    Ok(json!({
        "deleted_files": deleted_files,
        "total_size_mb": megabytes(total_bytes),
    }))
}

/// `now - days`, rejecting negative or unrepresentable periods.
fn retention_cutoff(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, JobError> {
    if days < 0 {
        return Err(JobError::InvalidRetention(days));
    }
    Duration::try_days(days)
        .and_then(|period| now.checked_sub_signed(period))
        .ok_or(JobError::InvalidRetention(days))
}

/// Size in MiB rounded to two decimals.
fn megabytes(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
