use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;
use crate::email::{EmailError, EmailSender, OutgoingEmail};

/// Transport seam so message building can be tested without a server.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Message) -> Result<(), String>;
}

#[async_trait]
impl Mailer for AsyncSmtpTransport<Tokio1Executor> {
    async fn send(&self, email: Message) -> Result<(), String> {
        AsyncTransport::send(self, email)
            .await
            .map(|_resp| ())
            .map_err(|e| e.to_string())
    }
}

pub struct SmtpSender {
    mailer: Box<dyn Mailer>,
    from_email: String,
}

impl SmtpSender {
    pub fn new_with_mailer(mailer: Box<dyn Mailer>, from_email: &str) -> Self {
        Self {
            mailer,
            from_email: from_email.to_string(),
        }
    }

    /// STARTTLS relay when `use_tls` is set, plain SMTP otherwise (Mailpit, MailHog).
    pub fn from_config(config: &EmailConfig, host: &str) -> Result<Self, EmailError> {
        let builder = if config.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| EmailError::Smtp(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let mut builder = builder.port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self::new_with_mailer(
            Box::new(builder.build()),
            &config.default_from_email,
        ))
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, EmailError> {
        let from: Mailbox = self
            .from_email
            .parse()
            .map_err(|_| EmailError::InvalidAddress(self.from_email.clone()))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?;

        let builder = Message::builder().from(from).to(to).subject(&email.subject);

        let message = match &email.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| EmailError::Build(e.to_string()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::html(email.html_body.clone()))
                        .singlepart(
                            Attachment::new(attachment.filename.clone())
                                .body(attachment.data.clone(), content_type),
                        ),
                )
            }
            None => builder
                .header(ContentType::TEXT_HTML)
                .body(email.html_body.clone()),
        };

        message.map_err(|e| EmailError::Build(e.to_string()))
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    fn provider(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let message = self.build_message(email)?;
        self.mailer.send(message).await.map_err(EmailError::Smtp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailAttachment;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingMailer {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: Message) -> Result<(), String> {
            self.sent.lock().unwrap().push(email.formatted());
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _: Message) -> Result<(), String> {
            Err("connection refused".to_string())
        }
    }

    fn email(to: &str, with_attachment: bool) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: "CV: Ada Lovelace".to_string(),
            html_body: "<p>Please find attached</p>".to_string(),
            attachment: with_attachment.then(|| EmailAttachment {
                filename: "cv_1_Ada_Lovelace.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: b"%PDF-1.3".to_vec(),
            }),
        }
    }

    #[tokio::test]
    async fn test_message_with_attachment_is_multipart() {
        let mailer = RecordingMailer::default();
        let sender = SmtpSender::new_with_mailer(Box::new(mailer.clone()), "cv@example.com");

        sender.send(&email("hr@example.com", true)).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let raw = String::from_utf8_lossy(&sent[0]);
        assert!(raw.contains("multipart/mixed"), "missing multipart: {raw}");
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("cv_1_Ada_Lovelace.pdf"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_never_reaches_mailer() {
        let mailer = RecordingMailer::default();
        let sender = SmtpSender::new_with_mailer(Box::new(mailer.clone()), "cv@example.com");

        let result = sender.send(&email("not-an-email", false)).await;

        assert!(matches!(result, Err(EmailError::InvalidAddress(_))));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let sender = SmtpSender::new_with_mailer(Box::new(FailingMailer), "cv@example.com");
        let result = sender.send(&email("hr@example.com", false)).await;
        match result {
            Err(EmailError::Smtp(msg)) => assert_eq!(msg, "connection refused"),
            other => panic!("expected SMTP error, got {other:?}"),
        }
    }
}
