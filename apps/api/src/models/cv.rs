use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

pub const NAME_MAX_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cv {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub skills: String,
    pub projects: String,
    pub bio: String,
    pub contacts: String,
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cv {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
            .trim()
            .to_string()
    }

    /// Owners and admins may modify; everyone else is read-only.
    pub fn can_modify(&self, user_id: i64, is_admin: bool) -> bool {
        is_admin || self.owner_id == Some(user_id)
    }
}

/// Editable CV fields, shared by the JSON API and the HTML form.
#[derive(Debug, Clone, Default)]
pub struct CvFields {
    pub firstname: String,
    pub lastname: String,
    pub skills: String,
    pub projects: String,
    pub bio: String,
    pub contacts: String,
}

impl From<&Cv> for CvFields {
    fn from(cv: &Cv) -> Self {
        Self {
            firstname: cv.firstname.clone(),
            lastname: cv.lastname.clone(),
            skills: cv.skills.clone(),
            projects: cv.projects.clone(),
            bio: cv.bio.clone(),
            contacts: cv.contacts.clone(),
        }
    }
}

#[cfg(test)]
pub fn sample_cv(id: i64, owner_id: Option<i64>) -> Cv {
    let now = Utc::now();
    Cv {
        id,
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        skills: "Mathematics, analytical engines".to_string(),
        projects: "Notes on the Analytical Engine".to_string(),
        bio: "First programmer.".to_string(),
        contacts: "ada@example.com".to_string(),
        owner_id,
        created_at: now,
        updated_at: now,
    }
}
