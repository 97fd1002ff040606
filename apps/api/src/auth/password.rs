use argon2::{
    password_hash::{
        rand_core::OsRng, Error as PasswordHashError, PasswordHash, PasswordHasher,
        PasswordVerifier, SaltString,
    },
    Argon2,
};
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password hashing failed")]
    HashFailed,

    #[error("stored password hash is malformed")]
    VerifyFailed,

    #[error("hashing task failed to complete")]
    TaskFailed,
}

/// Argon2id hash in PHC string format. Runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, HashError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| HashError::HashFailed)
    })
    .await
    .map_err(|_| HashError::TaskFailed)?
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, HashError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&hash).map_err(|_| HashError::VerifyFailed)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(_) => Err(HashError::VerifyFailed),
        }
    })
    .await
    .map_err(|_| HashError::TaskFailed)?
}
