use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub openai: OpenAiConfig,
    pub email: EmailConfig,
    pub port: u16,
    pub rust_log: String,
    pub session_ttl_secs: u64,
    pub secure_cookies: bool,
    pub request_logging: bool,
    pub worker_concurrency: usize,
    pub embedded_worker: bool,
    pub admin: Option<AdminBootstrap>,
}

/// OpenAI settings. A missing API key disables translation and analysis.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub project: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: String,
    pub sendgrid_base_url: String,
    /// No host means outgoing mail is written to the log instead.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub default_from_email: String,
}

/// Admin account created (or promoted) at startup.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let admin = match (optional_env("ADMIN_USERNAME"), optional_env("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminBootstrap {
                username,
                password,
                email: optional_env("ADMIN_EMAIL").unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: env_or("S3_REGION", "us-east-1"),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            openai: OpenAiConfig {
                api_key: optional_env("OPENAI_API_KEY"),
                model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
                project: optional_env("OPENAI_PROJECT"),
                base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            },
            email: EmailConfig {
                sendgrid_api_key: optional_env("SENDGRID_API_KEY"),
                sendgrid_from_email: env_or("SENDGRID_FROM_EMAIL", "noreply@example.com"),
                sendgrid_base_url: env_or("SENDGRID_BASE_URL", "https://api.sendgrid.com"),
                smtp_host: optional_env("SMTP_HOST"),
                smtp_port: parse_env("SMTP_PORT", 25)?,
                smtp_username: env_or("SMTP_USERNAME", ""),
                smtp_password: env_or("SMTP_PASSWORD", ""),
                smtp_use_tls: parse_bool_env("SMTP_USE_TLS", false)?,
                default_from_email: env_or("DEFAULT_FROM_EMAIL", "noreply@example.com"),
            },
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 60 * 60 * 24 * 14)?,
            secure_cookies: parse_bool_env("SECURE_COOKIES", false)?,
            request_logging: parse_bool_env("REQUEST_LOGGING", true)?,
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 2)?,
            embedded_worker: parse_bool_env("EMBEDDED_WORKER", true)?,
            admin,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable if set and non-empty.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    match optional_env(key) {
        Some(raw) => parse_bool(&raw).with_context(|| format!("{key} must be a boolean, got '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by router and service tests. Nothing here is dialled eagerly.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/cv_test".to_string(),
            redis_url: "redis://127.0.0.1:6390".to_string(),
            s3_bucket: "cv-test".to_string(),
            s3_endpoint: "http://127.0.0.1:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            openai: OpenAiConfig {
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                project: None,
                base_url: "http://127.0.0.1:1/v1".to_string(),
            },
            email: EmailConfig {
                sendgrid_api_key: None,
                sendgrid_from_email: "noreply@example.com".to_string(),
                sendgrid_base_url: "http://127.0.0.1:1".to_string(),
                smtp_host: None,
                smtp_port: 25,
                smtp_username: String::new(),
                smtp_password: String::new(),
                smtp_use_tls: false,
                default_from_email: "noreply@example.com".to_string(),
            },
            port: 0,
            rust_log: "debug".to_string(),
            session_ttl_secs: 3600,
            secure_cookies: false,
            request_logging: false,
            worker_concurrency: 1,
            embedded_worker: false,
            admin: None,
        }
    }
}
