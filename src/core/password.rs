//! Password hashing (argon2, PHC string format)

use crate::core::service::ServiceError;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a plaintext password
pub fn hash_password(plain: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a plaintext password against a stored PHC hash
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hash on the blocking pool; argon2 is deliberately slow
pub async fn hash_password_blocking(plain: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| ServiceError::Internal(format!("Password hashing task failed: {}", e)))?
}

pub async fn verify_password_blocking(plain: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .unwrap_or(false)
}
