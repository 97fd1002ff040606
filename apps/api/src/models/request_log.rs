use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

pub const PATH_MAX_LEN: usize = 512;
pub const QUERY_MAX_LEN: usize = 1024;

/// One audited HTTP request, joined with the username when the user still exists.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RequestLog {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub remote_ip: Option<String>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

/// Row about to be written by the audit middleware.
#[derive(Debug, Clone)]
pub struct NewRequestLog {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub remote_ip: Option<String>,
    pub user_id: Option<i64>,
}
