use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, Uri},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::logs::repository::insert_log;
use crate::models::request_log::{NewRequestLog, PATH_MAX_LEN, QUERY_MAX_LEN};
use crate::state::AppState;

/// Filled by the auth extractors once a request has authenticated,
/// so the audit row can carry the user id.
#[derive(Debug, Clone, Default)]
pub struct RequestUserSlot(Arc<OnceLock<i64>>);

impl RequestUserSlot {
    pub fn set(&self, user_id: i64) {
        let _ = self.0.set(user_id);
    }

    pub fn get(&self) -> Option<i64> {
        self.0.get().copied()
    }
}

/// Audits every request after the response has been produced.
/// The insert runs in the background and can never fail the request.
pub async fn record_request(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if !state.config.request_logging {
        return next.run(req).await;
    }

    let slot = RequestUserSlot::default();
    req.extensions_mut().insert(slot.clone());

    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let response = next.run(req).await;

    let entry = build_log_entry(&method, &uri, &headers, peer, slot.get());
    let db = state.db.clone();
    tokio::spawn(async move {
        if let Err(e) = insert_log(&db, &entry).await {
            debug!("Failed to record request log: {e}");
        }
    });

    response
}

pub fn build_log_entry(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    user_id: Option<i64>,
) -> NewRequestLog {
    NewRequestLog {
        method: method.as_str().to_string(),
        path: truncate(uri.path(), PATH_MAX_LEN),
        query_string: truncate(uri.query().unwrap_or(""), QUERY_MAX_LEN),
        remote_ip: client_ip(headers, peer).map(|ip| ip.to_string()),
        user_id,
    }
}

/// First `X-Forwarded-For` hop when the header is present, otherwise the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    match headers.get("x-forwarded-for") {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse().ok()),
        None => peer,
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<IpAddr> {
        Some("10.0.0.9".parse().unwrap())
    }

    #[test]
    fn test_entry_captures_request_line() {
        let uri: Uri = "/api/logs/?preset=last_hour".parse().unwrap();
        let entry = build_log_entry(&Method::GET, &uri, &HeaderMap::new(), peer(), Some(4));
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/api/logs/");
        assert_eq!(entry.query_string, "preset=last_hour");
        assert_eq!(entry.remote_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(entry.user_id, Some(4));
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let uri: Uri = "/".parse().unwrap();
        let entry = build_log_entry(&Method::GET, &uri, &headers, peer(), None);
        assert_eq!(entry.remote_ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_unparsable_forwarded_for_is_null() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        let uri: Uri = "/".parse().unwrap();
        let entry = build_log_entry(&Method::GET, &uri, &headers, peer(), None);
        assert_eq!(entry.remote_ip, None);
    }

    #[test]
    fn test_long_path_and_query_are_truncated() {
        let long_path = format!("/{}", "a".repeat(600));
        let long_query = format!("q={}", "b".repeat(2000));
        let uri: Uri = format!("{long_path}?{long_query}").parse().unwrap();
        let entry = build_log_entry(&Method::POST, &uri, &HeaderMap::new(), None, None);
        assert_eq!(entry.path.chars().count(), PATH_MAX_LEN);
        assert_eq!(entry.query_string.chars().count(), QUERY_MAX_LEN);
        assert_eq!(entry.remote_ip, None);
    }

    #[test]
    fn test_user_slot_keeps_first_value() {
        let slot = RequestUserSlot::default();
        assert_eq!(slot.get(), None);
        let clone = slot.clone();
        clone.set(7);
        clone.set(8);
        assert_eq!(slot.get(), Some(7));
    }
}
