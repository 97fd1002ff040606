use crate::email::{EmailAttachment, OutgoingEmail};
use crate::models::cv::Cv;
use crate::web::templates::escape_html;

/// Attachment name used for emailed and base64-exported PDFs.
pub fn cv_pdf_filename(cv: &Cv) -> String {
    format!(
        "cv_{}_{}_{}.pdf",
        cv.id,
        filename_part(&cv.firstname),
        filename_part(&cv.lastname)
    )
}

pub fn cv_pdf_email(cv: &Cv, recipient: &str, pdf: Vec<u8>) -> OutgoingEmail {
    let name = format!("{} {}", cv.firstname, cv.lastname);
    OutgoingEmail {
        to: recipient.trim().to_string(),
        subject: format!("CV: {name}"),
        html_body: format!(
            "<p>Please find attached the CV for <strong>{}</strong>.</p>",
            escape_html(&name)
        ),
        attachment: Some(EmailAttachment {
            filename: cv_pdf_filename(cv),
            content_type: "application/pdf".to_string(),
            data: pdf,
        }),
    }
}

pub fn notification_email(recipient: &str, subject: &str, message: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: recipient.trim().to_string(),
        subject: subject.to_string(),
        html_body: format!("<p>{}</p>", escape_html(message)),
        attachment: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvEvent {
    Created,
    Updated,
}

impl CvEvent {
    fn verb(self) -> &'static str {
        match self {
            CvEvent::Created => "created",
            CvEvent::Updated => "updated",
        }
    }
}

/// Subject and text of the "your CV was saved" notice.
pub fn cv_event_notice(cv: &Cv, event: CvEvent) -> (String, String) {
    let subject = match event {
        CvEvent::Created => "CV Created Successfully",
        CvEvent::Updated => "CV Updated Successfully",
    };
    let message = format!(
        "Your CV for {} {} has been {} successfully.",
        cv.firstname,
        cv.lastname,
        event.verb()
    );
    (subject.to_string(), message)
}

/// Keeps filenames header-safe: ASCII alphanumerics, `-` and `_` only.
fn filename_part(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "cv".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::sample_cv;

    #[test]
    fn test_cv_pdf_email_subject_body_and_attachment() {
        let cv = sample_cv(12, None);
        let email = cv_pdf_email(&cv, " hr@example.com ", vec![1, 2, 3]);
        assert_eq!(email.to, "hr@example.com");
        assert_eq!(email.subject, "CV: Ada Lovelace");
        assert_eq!(
            email.html_body,
            "<p>Please find attached the CV for <strong>Ada Lovelace</strong>.</p>"
        );
        let attachment = email.attachment.unwrap();
        assert_eq!(attachment.filename, "cv_12_Ada_Lovelace.pdf");
        assert_eq!(attachment.content_type, "application/pdf");
    }

    #[test]
    fn test_filename_sanitises_names() {
        let mut cv = sample_cv(4, None);
        cv.firstname = "Jean Luc".to_string();
        cv.lastname = "Pic/ard".to_string();
        assert_eq!(cv_pdf_filename(&cv), "cv_4_Jean_Luc_Pic_ard.pdf");
    }

    #[test]
    fn test_event_notice_wording() {
        let cv = sample_cv(4, None);
        let (subject, message) = cv_event_notice(&cv, CvEvent::Updated);
        assert_eq!(subject, "CV Updated Successfully");
        assert_eq!(message, "Your CV for Ada Lovelace has been updated successfully.");
    }

    #[test]
    fn test_notification_body_is_escaped() {
        let email = notification_email("a@b.co", "Hi", "<script>");
        assert_eq!(email.html_body, "<p>&lt;script&gt;</p>");
    }
}
