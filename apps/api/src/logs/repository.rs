use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::logs::filter::TimeFilter;
use crate::models::request_log::{NewRequestLog, RequestLog};
use crate::pagination::PageRequest;

const SELECT_LOGS: &str = r#"
    SELECT l.id, l.timestamp, l.method, l.path, l.query_string, l.remote_ip, l.user_id,
           u.username
    FROM request_logs l
    LEFT JOIN users u ON u.id = l.user_id
"#;

pub async fn insert_log(db: &PgPool, entry: &NewRequestLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO request_logs (method, path, query_string, remote_ip, user_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&entry.method)
    .bind(&entry.path)
    .bind(&entry.query_string)
    .bind(&entry.remote_ip)
    .bind(entry.user_id)
    .execute(db)
    .await?;
    Ok(())
}

fn push_bounds(builder: &mut QueryBuilder<'_, Postgres>, filter: &TimeFilter) {
    builder.push(" WHERE TRUE");
    if let Some(since) = filter.since {
        builder.push(" AND l.timestamp >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND l.timestamp <= ").push_bind(until);
    }
}

pub async fn count_logs(db: &PgPool, filter: &TimeFilter) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM request_logs l");
    push_bounds(&mut builder, filter);
    builder.build_query_scalar().fetch_one(db).await
}

pub async fn list_logs(
    db: &PgPool,
    filter: &TimeFilter,
    page: PageRequest,
) -> Result<Vec<RequestLog>, sqlx::Error> {
    let mut builder = QueryBuilder::new(SELECT_LOGS);
    push_bounds(&mut builder, filter);
    let order = filter.order.as_sql();
    builder.push(format!(" ORDER BY l.timestamp {order}, l.id {order}"));
    builder.push(" LIMIT ").push_bind(page.limit());
    builder.push(" OFFSET ").push_bind(page.offset());
    builder.build_query_as().fetch_all(db).await
}

pub async fn get_log(db: &PgPool, id: i64) -> Result<Option<RequestLog>, sqlx::Error> {
    sqlx::query_as::<_, RequestLog>(&format!("{SELECT_LOGS} WHERE l.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Removes entries strictly older than `cutoff`. Returns the number deleted.
pub async fn delete_logs_before(db: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM request_logs WHERE timestamp < $1")
        .bind(cutoff)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
