use serde::Deserialize;

use crate::models::cv::{CvFields, NAME_MAX_LEN};

/// JSON body for create / replace / partial update. Absent fields are left alone.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CvPayload {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub skills: Option<String>,
    pub projects: Option<String>,
    pub bio: Option<String>,
    pub contacts: Option<String>,
}

impl CvPayload {
    pub fn apply_to(self, mut fields: CvFields) -> CvFields {
        if let Some(v) = self.firstname {
            fields.firstname = v;
        }
        if let Some(v) = self.lastname {
            fields.lastname = v;
        }
        if let Some(v) = self.skills {
            fields.skills = v;
        }
        if let Some(v) = self.projects {
            fields.projects = v;
        }
        if let Some(v) = self.bio {
            fields.bio = v;
        }
        if let Some(v) = self.contacts {
            fields.contacts = v;
        }
        fields
    }
}

/// Trims names and checks their length. The API additionally insists on non-blank names;
/// the HTML form lets them through.
pub fn validate_fields(mut fields: CvFields, require_names: bool) -> Result<CvFields, Vec<String>> {
    fields.firstname = fields.firstname.trim().to_string();
    fields.lastname = fields.lastname.trim().to_string();

    let mut errors = Vec::new();
    for (label, value) in [("firstname", &fields.firstname), ("lastname", &fields.lastname)] {
        if require_names && value.is_empty() {
            errors.push(format!("{label}: This field may not be blank."));
        }
        if value.chars().count() > NAME_MAX_LEN {
            errors.push(format!(
                "{label}: Ensure this field has no more than {NAME_MAX_LEN} characters."
            ));
        }
    }

    if errors.is_empty() {
        Ok(fields)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(first: &str, last: &str) -> CvFields {
        CvFields {
            firstname: first.to_string(),
            lastname: last.to_string(),
            ..CvFields::default()
        }
    }

    #[test]
    fn test_names_are_trimmed() {
        let cleaned = validate_fields(fields("  Ada ", "Lovelace "), true).unwrap();
        assert_eq!(cleaned.firstname, "Ada");
        assert_eq!(cleaned.lastname, "Lovelace");
    }

    #[test]
    fn test_blank_names_rejected_only_when_required() {
        let errors = validate_fields(fields(" ", ""), true).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(validate_fields(fields("", ""), false).is_ok());
    }

    #[test]
    fn test_long_name_rejected() {
        let errors = validate_fields(fields(&"x".repeat(101), "Ok"), false).unwrap_err();
        assert_eq!(errors, vec!["firstname: Ensure this field has no more than 100 characters."]);
        assert!(validate_fields(fields(&"x".repeat(100), "Ok"), true).is_ok());
    }

    #[test]
    fn test_partial_payload_keeps_existing_values() {
        let base = CvFields {
            bio: "old bio".to_string(),
            ..fields("Ada", "Lovelace")
        };
        let payload = CvPayload {
            bio: Some("new bio".to_string()),
            ..CvPayload::default()
        };
        let merged = payload.apply_to(base);
        assert_eq!(merged.firstname, "Ada");
        assert_eq!(merged.bio, "new bio");
    }
}
