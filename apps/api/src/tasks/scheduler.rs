use std::time::Duration;

use tracing::{info, warn};

use crate::tasks::model::Job;
use crate::tasks::queue::TaskQueue;

/// A job enqueued on a fixed interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub name: &'static str,
    pub every: Duration,
    pub job: Job,
}

const DAY: Duration = Duration::from_secs(86_400);
const WEEK: Duration = Duration::from_secs(604_800);

pub fn beat_schedule() -> Vec<ScheduleEntry> {
    vec![
        ScheduleEntry {
            name: "cleanup-old-logs",
            every: DAY,
            job: Job::CleanupOldLogs { days: 30 },
        },
        ScheduleEntry {
            name: "cleanup-old-pdf-files",
            every: WEEK,
            job: Job::CleanupOldPdfFiles { days: 7 },
        },
        ScheduleEntry {
            name: "generate-daily-stats",
            every: DAY,
            job: Job::GenerateDailyStats { date: None },
        },
        ScheduleEntry {
            name: "generate-weekly-report",
            every: WEEK,
            job: Job::GenerateWeeklyReport { week_start: None },
        },
    ]
}

/// Runs one timer per schedule entry. The first tick of each fires one full interval after start.
pub async fn run_beat(queue: std::sync::Arc<dyn TaskQueue>) {
    let handles: Vec<_> = beat_schedule()
        .into_iter()
        .map(|entry| {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move {
                let start = tokio::time::Instant::now() + entry.every;
                let mut ticker = tokio::time::interval_at(start, entry.every);
                loop {
                    ticker.tick().await;
                    match queue.enqueue(entry.job.clone(), None).await {
                        Ok(id) => info!(schedule = entry.name, task_id = %id, "Scheduled task queued"),
                        Err(e) => warn!(schedule = entry.name, "Failed to queue scheduled task: {e}"),
                    }
                }
            })
        })
        .collect();

    info!(entries = handles.len(), "Beat scheduler started");
    for handle in handles {
        let _ = handle.await;
    }
}
