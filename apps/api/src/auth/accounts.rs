use sqlx::PgPool;
use tracing::info;

use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::config::AdminBootstrap;
use crate::email::is_valid_email;
use crate::errors::AppError;
use crate::models::user::User;

pub const USERNAME_MAX_LEN: usize = 150;

/// Checks a registration form. Returns the cleaned username and email.
pub fn validate_registration(
    username: &str,
    email: Option<&str>,
    password: &str,
) -> Result<(String, String), AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at most {USERNAME_MAX_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(AppError::Validation(
            "Username may contain only letters, digits and @/./+/-/_".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let email = email.map(str::trim).unwrap_or_default();
    if !email.is_empty() && !is_valid_email(email) {
        return Err(AppError::Validation("Enter a valid email address".to_string()));
    }

    Ok((username.to_string(), email.to_string()))
}

pub async fn find_user(db: &PgPool, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

async fn find_by_username(db: &PgPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn register(
    db: &PgPool,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> Result<User, AppError> {
    let (username, email) = validate_registration(username, email, password)?;

    if find_by_username(db, &username).await?.is_some() {
        return Err(AppError::Validation(
            "A user with that username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(password).await?;

    // The unique index still guards against a concurrent registration.
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::Validation("A user with that username already exists".to_string()))?;

    info!(user_id = user.id, "User registered");
    Ok(user)
}

/// Verifies a username/password pair. Unknown users and wrong passwords are indistinguishable.
pub async fn authenticate(db: &PgPool, username: &str, password: &str) -> Result<User, AppError> {
    let Some(user) = find_by_username(db, username.trim()).await? else {
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash).await? {
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

/// Creates the configured admin account, or promotes and re-keys it if it already exists.
pub async fn bootstrap_admin(db: &PgPool, admin: &AdminBootstrap) -> Result<(), AppError> {
    let password_hash = hash_password(&admin.password).await?;

    sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_staff, is_superuser)
        VALUES ($1, $2, $3, TRUE, TRUE)
        ON CONFLICT (username) DO UPDATE
            SET is_staff = TRUE,
                is_superuser = TRUE,
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash
        "#,
    )
    .bind(&admin.username)
    .bind(&admin.email)
    .bind(&password_hash)
    .execute(db)
    .await?;

    info!(username = %admin.username, "Admin account ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_trims_and_accepts_blank_email() {
        let (username, email) = validate_registration("  ada ", None, "longenough").unwrap();
        assert_eq!(username, "ada");
        assert_eq!(email, "");
    }

    #[test]
    fn test_registration_rejects_short_password() {
        let err = validate_registration("ada", None, "short").unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("at least 8")));
    }

    #[test]
    fn test_registration_rejects_bad_username() {
        assert!(validate_registration("   ", None, "longenough").is_err());
        assert!(validate_registration("ada lovelace", None, "longenough").is_err());
        assert!(validate_registration(&"a".repeat(151), None, "longenough").is_err());
        assert!(validate_registration("ada.l+cv@home", None, "longenough").is_ok());
    }

    #[test]
    fn test_registration_validates_email_when_given() {
        assert!(validate_registration("ada", Some("not-an-email"), "longenough").is_err());
        assert!(validate_registration("ada", Some("ada@example.com"), "longenough").is_ok());
    }
}
