//! Password hashing
//!
//! Argon2id PHC strings. Hashing runs on the blocking pool.

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::{Rng, distributions::Alphanumeric};

use crate::error::AppError;

const RANDOM_SECRET_LEN: usize = 32;

/// Hash a password into a PHC string
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Encryption(e.to_string()))
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?
}

/// Check a password against a stored PHC string
///
/// Malformed hashes never verify.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&password_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))
}

/// Random alphanumeric string
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Hash of a freshly generated secret that is never shown to anyone
///
/// Used for accounts created through GitHub so the column is always set.
pub async fn hash_random_secret() -> Result<String, AppError> {
    hash_password(random_token(RANDOM_SECRET_LEN)).await
}
