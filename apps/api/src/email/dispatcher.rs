use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EmailConfig;
use crate::email::console::ConsoleSender;
use crate::email::sendgrid::SendGridSender;
use crate::email::smtp::SmtpSender;
use crate::email::{EmailError, EmailSender, OutgoingEmail};

/// Ordered chain of transports. SendGrid goes first when configured, then SMTP
/// (or the console transport when no SMTP host is set).
#[derive(Clone)]
pub struct EmailDispatcher {
    senders: Vec<Arc<dyn EmailSender>>,
}

impl EmailDispatcher {
    pub fn new(senders: Vec<Arc<dyn EmailSender>>) -> Self {
        Self { senders }
    }

    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        let mut senders: Vec<Arc<dyn EmailSender>> = Vec::new();

        if let Some(api_key) = &config.sendgrid_api_key {
            senders.push(Arc::new(SendGridSender::new(
                api_key,
                &config.sendgrid_from_email,
                &config.sendgrid_base_url,
            )));
        }

        match &config.smtp_host {
            Some(host) => senders.push(Arc::new(SmtpSender::from_config(config, host)?)),
            None => senders.push(Arc::new(ConsoleSender)),
        }

        Ok(Self::new(senders))
    }

    pub fn providers(&self) -> Vec<&'static str> {
        self.senders.iter().map(|s| s.provider()).collect()
    }

    /// Sends through the first transport that accepts the message and returns its name.
    /// When every transport fails the last error is returned.
    pub async fn deliver(&self, email: &OutgoingEmail) -> Result<&'static str, EmailError> {
        let mut last_error = EmailError::NoTransport;

        for sender in &self.senders {
            match sender.send(email).await {
                Ok(()) => {
                    info!(provider = sender.provider(), to = %email.to, "Email delivered");
                    return Ok(sender.provider());
                }
                Err(e) => {
                    warn!(provider = sender.provider(), "Email delivery failed: {e}");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
