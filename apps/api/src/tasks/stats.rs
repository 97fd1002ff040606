use std::collections::HashMap;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;

use crate::tasks::jobs::JobError;

const DAILY_POPULAR_LIMIT: usize = 5;
const WEEKLY_ACTIVE_LIMIT: usize = 10;

/// `/cv/<id>/...` and `/api/cv/<id>/...` count as a visit to CV `<id>`.
static CV_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(?:api/)?cv/([0-9]{1,18})(?:/|$)").expect("valid CV path pattern"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvHits {
    pub id: i64,
    pub name: String,
    pub request_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRequests {
    pub date: NaiveDate,
    pub requests: i64,
}

pub fn cv_id_from_path(path: &str) -> Option<i64> {
    CV_PATH
        .captures(path)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Sums per-path request counts into per-CV counts, busiest first, ties by id.
pub fn rank_cv_hits(path_counts: &[(String, i64)]) -> Vec<(i64, i64)> {
    let mut totals: HashMap<i64, i64> = HashMap::new();
    for (path, count) in path_counts {
        if let Some(id) = cv_id_from_path(path) {
            *totals.entry(id).or_default() += count;
        }
    }
    let mut ranked: Vec<(i64, i64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

pub fn yesterday(today: NaiveDate) -> NaiveDate {
    today - Days::new(1)
}

pub fn monday_of(day: NaiveDate) -> NaiveDate {
    day - Days::new(u64::from(day.weekday().num_days_from_monday()))
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Seven consecutive days from `week_start`, zero-filled where no requests were logged.
pub fn fill_week(week_start: NaiveDate, counts: &[(NaiveDate, i64)]) -> Vec<DailyRequests> {
    (0..7)
        .map(|offset| {
            let date = week_start + Days::new(offset);
            let requests = counts
                .iter()
                .find(|(day, _)| *day == date)
                .map(|(_, n)| *n)
                .unwrap_or(0);
            DailyRequests { date, requests }
        })
        .collect()
}

struct RangeTotals {
    cvs_created: i64,
    requests: i64,
    unique_users: i64,
}

async fn range_totals(db: &PgPool, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<RangeTotals, sqlx::Error> {
    let cvs_created: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM cvs WHERE created_at >= $1 AND created_at < $2")
            .bind(from)
            .bind(to)
            .fetch_one(db)
            .await?;

    let (requests, unique_users): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(DISTINCT user_id)
        FROM request_logs
        WHERE timestamp >= $1 AND timestamp < $2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(db)
    .await?;

    Ok(RangeTotals {
        cvs_created,
        requests,
        unique_users,
    })
}

/// Most requested CVs in the range. CVs deleted since are skipped.
async fn busiest_cvs(
    db: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<CvHits>, sqlx::Error> {
    let path_counts: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT path, COUNT(*)
        FROM request_logs
        WHERE timestamp >= $1 AND timestamp < $2
          AND (path LIKE '/cv/%' OR path LIKE '/api/cv/%')
        GROUP BY path
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await?;

    let ranked = rank_cv_hits(&path_counts);
    if ranked.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = ranked.iter().map(|(id, _)| *id).collect();
    let names: HashMap<i64, String> = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, TRIM(firstname || ' ' || lastname) FROM cvs WHERE id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(db)
    .await?
    .into_iter()
    .collect();

    Ok(ranked
        .into_iter()
        .filter_map(|(id, request_count)| {
            names.get(&id).map(|name| CvHits {
                id,
                name: name.clone(),
                request_count,
            })
        })
        .take(limit)
        .collect())
}

/// Totals for one UTC day, `[date, date + 1d)`. Defaults to yesterday.
pub async fn generate_daily_stats(db: &PgPool, date: Option<NaiveDate>) -> Result<Value, JobError> {
    let date = date.unwrap_or_else(|| yesterday(Utc::now().date_naive()));
    let from = start_of(date);
    let to = start_of(date + Days::new(1));

    let totals = range_totals(db, from, to).await?;
    let popular_cvs = busiest_cvs(db, from, to, DAILY_POPULAR_LIMIT).await?;

    info!(%date, requests = totals.requests, "Daily stats generated");
    Ok(json!({
        "date": date,
        "cvs_created": totals.cvs_created,
        "requests_count": totals.requests,
        "unique_users": totals.unique_users,
        "popular_cvs": popular_cvs,
    }))
}

/// Report for the seven days starting `week_start`. Defaults to the current week's Monday.
pub async fn generate_weekly_report(db: &PgPool, week_start: Option<NaiveDate>) -> Result<Value, JobError> {
    let week_start = week_start.unwrap_or_else(|| monday_of(Utc::now().date_naive()));
    let from = start_of(week_start);
    let to = start_of(week_start + Days::new(7));

    let totals = range_totals(db, from, to).await?;

    let per_day: Vec<(NaiveDate, i64)> = sqlx::query_as(
        r#"
        SELECT (timestamp AT TIME ZONE 'UTC')::date AS day, COUNT(*)
        FROM request_logs
        WHERE timestamp >= $1 AND timestamp < $2
        GROUP BY day
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await?;

    let active_cvs = busiest_cvs(db, from, to, WEEKLY_ACTIVE_LIMIT).await?;

    info!(%week_start, requests = totals.requests, "Weekly report generated");
    Ok(json!({
        "week_start": week_start,
        "week_end": week_start + Days::new(6),
        "cvs_created": totals.cvs_created,
        "total_requests": totals.requests,
        "unique_users": totals.unique_users,
        "daily_stats": fill_week(week_start, &per_day),
        "active_cvs": active_cvs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cv_id_from_path() {
        assert_eq!(cv_id_from_path("/cv/12/"), Some(12));
        assert_eq!(cv_id_from_path("/cv/12/edit/"), Some(12));
        assert_eq!(cv_id_from_path("/api/cv/7"), Some(7));
        assert_eq!(cv_id_from_path("/cv/create/"), None);
        assert_eq!(cv_id_from_path("/cvs/"), None);
        assert_eq!(cv_id_from_path("/cv/12abc/"), None);
    }

    #[test]
    fn test_rank_cv_hits_sums_paths_per_cv() {
        let rows = vec![
            ("/cv/1/".to_string(), 3),
            ("/cv/1/pdf/".to_string(), 2),
            ("/api/cv/2/".to_string(), 5),
            ("/cv/3/".to_string(), 1),
            ("/cvs/".to_string(), 40),
        ];
        assert_eq!(rank_cv_hits(&rows), vec![(1, 5), (2, 5), (3, 1)]);
    }

    #[test]
    fn test_default_dates() {
        assert_eq!(yesterday(date(2024, 3, 1)), date(2024, 2, 29));
        // 2024-05-16 is a Thursday.
        assert_eq!(monday_of(date(2024, 5, 16)), date(2024, 5, 13));
        assert_eq!(monday_of(date(2024, 5, 13)), date(2024, 5, 13));
    }

    #[test]
    fn test_fill_week_zero_fills_missing_days() {
        let start = date(2024, 5, 13);
        let week = fill_week(start, &[(date(2024, 5, 15), 9)]);
        assert_eq!(week.len(), 7);
        assert_eq!(week[0], DailyRequests { date: start, requests: 0 });
        assert_eq!(week[2].requests, 9);
        assert_eq!(week[6].date, date(2024, 5, 19));
    }
}
