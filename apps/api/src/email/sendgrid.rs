use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::email::{EmailError, EmailSender, OutgoingEmail};

/// SendGrid v3 Mail Send API.
pub struct SendGridSender {
    client: Client,
    api_key: String,
    from_email: String,
    base_url: String,
}

impl SendGridSender {
    pub fn new(api_key: &str, from_email: &str, base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn payload(&self, email: &OutgoingEmail) -> Value {
        let mut payload = json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.from_email },
            "subject": email.subject,
            "content": [{ "type": "text/html", "value": email.html_body }],
        });
        if let Some(attachment) = &email.attachment {
            payload["attachments"] = json!([{
                "content": BASE64.encode(&attachment.data),
                "filename": attachment.filename,
                "type": attachment.content_type,
                "disposition": "attachment",
            }]);
        }
        payload
    }
}

#[async_trait]
impl EmailSender for SendGridSender {
    fn provider(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(EmailError::Rejected {
            provider: self.provider(),
            status: status.as_u16(),
            message,
        })
    }
}
