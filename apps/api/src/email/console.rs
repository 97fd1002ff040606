use async_trait::async_trait;
use tracing::info;

use crate::email::{EmailError, EmailSender, OutgoingEmail};

/// Development transport used when no SMTP host is configured: logs instead of sending.
pub struct ConsoleSender;

#[async_trait]
impl EmailSender for ConsoleSender {
    fn provider(&self) -> &'static str {
        "console"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            attachment = email.attachment.as_ref().map(|a| a.filename.as_str()).unwrap_or("-"),
            "Email (console transport)\n{}",
            email.html_body
        );
        Ok(())
    }
}
