//! Outgoing email. Every transport implements [`EmailSender`]; the
//! [`EmailDispatcher`] walks them in order until one accepts the message.

pub mod console;
pub mod dispatcher;
pub mod messages;
pub mod sendgrid;
pub mod smtp;

use async_trait::async_trait;
use thiserror::Error;

pub use dispatcher::EmailDispatcher;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} rejected the message (status {status}): {message}")]
    Rejected {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("no email transport is configured")]
    NoTransport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Short provider name recorded in task results and logs.
    fn provider(&self) -> &'static str;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// Loose sanity check used before queueing: something before an `@` and a dotted domain after it.
pub fn is_valid_email(address: &str) -> bool {
    let address = address.trim();
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    match address.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_addresses() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email(" first.last+cv@mail.example.org "));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("ada@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@example."));
        assert!(!is_valid_email("ada lovelace@example.com"));
    }
}
