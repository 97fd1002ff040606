use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::TranslatedCv;

pub const SESSION_COOKIE: &str = "cv_session";
const TOKEN_LEN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedAnalysis {
    pub question: String,
    pub analysis: String,
    pub is_enabled: bool,
}

/// Server-side per-user state, stored as JSON in Redis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Option<i64>,
    #[serde(default)]
    pub pdf_task_id: Option<Uuid>,
    #[serde(default)]
    pub analysis_task_id: Option<Uuid>,
    #[serde(default)]
    pub analysis_question: Option<String>,
    #[serde(default)]
    pub analysis_processing: bool,
    #[serde(default)]
    pub analysis_complete: Option<CompletedAnalysis>,
    #[serde(default)]
    pub analysis_last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub translation: Option<TranslatedCv>,
    #[serde(default)]
    pub flashes: Vec<Flash>,
}

impl SessionData {
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.flashes.push(Flash {
            level,
            message: message.into(),
        });
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.flashes)
    }

    pub fn clear_analysis(&mut self) {
        self.analysis_task_id = None;
        self.analysis_question = None;
        self.analysis_processing = false;
        self.analysis_complete = None;
        self.analysis_last_check = None;
    }
}

/// A loaded session and the token it lives under.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub data: SessionData,
}

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

/// Redis-backed session store with a sliding expiry.
#[derive(Clone)]
pub struct SessionStore {
    client: redis::Client,
    ttl_secs: u64,
    secure_cookies: bool,
}

impl SessionStore {
    pub fn new(client: redis::Client, ttl_secs: u64, secure_cookies: bool) -> Self {
        Self {
            client,
            ttl_secs,
            secure_cookies,
        }
    }

    pub async fn create(&self, data: SessionData) -> Result<Session, redis::RedisError> {
        let session = Session {
            token: generate_token(),
            data,
        };
        self.save(&session).await?;
        Ok(session)
    }

    /// Loads a session and pushes its expiry forward.
    pub async fn load(&self, token: &str) -> Result<Option<Session>, redis::RedisError> {
        if !is_well_formed_token(token) {
            return Ok(None);
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = session_key(token);
        let raw: Option<String> = conn.get(&key).await?;
        let Some(raw) = raw else { return Ok(None) };

        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;

        match serde_json::from_str::<SessionData>(&raw) {
            Ok(data) => Ok(Some(Session {
                token: token.to_string(),
                data,
            })),
            Err(e) => {
                tracing::warn!("Discarding unreadable session: {e}");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, session: &Session) -> Result<(), redis::RedisError> {
        let payload = serde_json::to_string(&session.data).map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "session serialization failed",
                e.to_string(),
            ))
        })?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(session_key(&session.token))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
    }

    pub async fn destroy(&self, token: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(session_key(token)).await
    }

    pub fn cookie(&self, token: &str) -> HeaderValue {
        let mut cookie = format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl_secs
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    pub fn expired_cookie(&self) -> HeaderValue {
        HeaderValue::from_static("cv_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

fn is_well_formed_token(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Session token from the `cv_session` cookie, or from `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}
